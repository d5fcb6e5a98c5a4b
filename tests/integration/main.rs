//! End-to-end tests: stub marketplace → poller → pipeline → submission
//! worker → stub node, with every event captured from the reporter channel.

mod stub_chain;
mod stub_marketplace;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use mercury::chain::{GasSchedule, SubmitResponse};
use mercury::engine::pipeline::TransactionPipeline;
use mercury::engine::poller::{ListingPoller, PollTiming, PollerState};
use mercury::engine::reporter::{self, AttemptOutcome, SnipeEvent};
use mercury::engine::sequencer::SubmissionWorker;
use mercury::marketplaces::MarketplaceAdapter;
use mercury::types::Octas;
use mercury::wallet::{AccountState, Wallet};

use stub_chain::{executed, StubNode, STALE_SEQUENCE_MESSAGE};
use stub_marketplace::{collection, listing, Page, StubMarketplace};

const THRESHOLD: Octas = Octas(50);
const START_SEQUENCE: u64 = 7;

struct Harness {
    market: Arc<StubMarketplace>,
    node: Arc<StubNode>,
    events: mpsc::UnboundedReceiver<SnipeEvent>,
    seen: Vec<SnipeEvent>,
    stop: watch::Sender<bool>,
    poller: JoinHandle<ListingPoller>,
    worker: JoinHandle<AccountState>,
}

/// Everything observable once a session has fully wound down.
struct Outcome {
    events: Vec<SnipeEvent>,
    account: AccountState,
    poller_state: PollerState,
    keys_seen: usize,
}

impl Outcome {
    fn finished(&self) -> Vec<&AttemptOutcome> {
        finished(&self.events)
    }

    fn found(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SnipeEvent::ListingFound { listing } => Some(listing.token_id.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Harness {
    fn start(market: StubMarketplace, node: StubNode) -> Self {
        let market = Arc::new(market);
        let node = Arc::new(node);

        let account = AccountState::new(Wallet::from_seed([42u8; 32]), Octas(1_000), START_SEQUENCE);
        let (submitter, worker) =
            SubmissionWorker::spawn(account, node.clone(), GasSchedule::default(), 4);

        let (events_tx, events) = mpsc::unbounded_channel();
        let pipeline = Arc::new(TransactionPipeline::new(
            submitter,
            node.clone(),
            events_tx.clone(),
            Duration::ZERO,
        ));
        let timing = PollTiming {
            poll_interval: Duration::from_millis(5),
            error_backoff: Duration::from_millis(5),
            dispatch_pacing: Duration::ZERO,
        };
        let poller = ListingPoller::new(
            market.clone(),
            collection(),
            THRESHOLD,
            pipeline,
            events_tx,
            timing,
            1_000,
        );

        let (stop, stop_rx) = watch::channel(false);
        let poller = tokio::spawn(poller.run(stop_rx));

        Self {
            market,
            node,
            events,
            seen: Vec::new(),
            stop,
            poller,
            worker,
        }
    }

    /// Wait until `count` attempts have reached a terminal outcome.
    async fn wait_for_finished(&mut self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while finished(&self.seen).len() < count {
                match self.events.recv().await {
                    Some(event) => self.seen.push(event),
                    None => panic!("event channel closed early"),
                }
            }
        })
        .await
        .expect("attempts did not finish in time");
    }

    /// Wait until the poller has fetched at least `count` pages.
    async fn wait_for_fetches(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.market.fetches() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("poller stalled");
    }

    /// Stop the poller, let in-flight attempts drain, and collect every event.
    async fn shutdown(self) -> Outcome {
        self.stop.send(true).unwrap();

        let poller = tokio_test::assert_ok!(self.poller.await);
        let poller_state = poller.state();
        let keys_seen = poller.dedup().len();
        // Releases the dispatcher and the poller's event sender.
        drop(poller);

        let account = tokio_test::assert_ok!(self.worker.await);

        let mut events = self.seen;
        let mut receiver = self.events;
        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = receiver.recv().await {
                events.push(event);
            }
        })
        .await
        .expect("event channel never closed");

        Outcome {
            events,
            account,
            poller_state,
            keys_seen,
        }
    }
}

fn finished(events: &[SnipeEvent]) -> Vec<&AttemptOutcome> {
    events
        .iter()
        .filter_map(|e| match e {
            SnipeEvent::Finished { outcome, .. } => Some(outcome),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_only_listings_under_threshold_are_bought() {
    let market = StubMarketplace::new(vec![Page::Listings(vec![
        listing("bear-40", "t1", 40),
        listing("bear-60", "t1", 60),
    ])]);
    let mut harness = Harness::start(market, StubNode::new());

    harness.wait_for_finished(1).await;
    harness.wait_for_fetches(3).await;
    let node = harness.node.clone();
    let outcome = harness.shutdown().await;

    assert_eq!(outcome.found(), vec!["bear-40"]);
    assert_eq!(outcome.finished().len(), 1);
    assert!(outcome.finished()[0].is_purchase());

    let submitted = node.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].payload.arguments[1], serde_json::json!("Bruh Bear bear-40"));
    assert_eq!(outcome.keys_seen, 1);
}

#[tokio::test]
async fn test_price_at_threshold_is_bought() {
    let market = StubMarketplace::new(vec![Page::Listings(vec![
        listing("at", "t1", 50),
        listing("over", "t1", 51),
    ])]);
    let mut harness = Harness::start(market, StubNode::new());

    harness.wait_for_finished(1).await;
    let outcome = harness.shutdown().await;

    assert_eq!(outcome.found(), vec!["at"]);
}

#[tokio::test]
async fn test_repeated_listing_dispatches_once() {
    let market = StubMarketplace::new(vec![
        Page::Listings(vec![listing("bear-1", "t1", 40)]),
        Page::Listings(vec![listing("bear-1", "t1", 40)]),
        Page::Listings(vec![listing("bear-1", "t1", 40)]),
    ]);
    let mut harness = Harness::start(market, StubNode::new());

    harness.wait_for_finished(1).await;
    harness.wait_for_fetches(4).await;
    let node = harness.node.clone();
    let outcome = harness.shutdown().await;

    assert_eq!(outcome.found(), vec!["bear-1"]);
    assert_eq!(node.submitted().len(), 1);
    assert_eq!(outcome.account.sequence_number(), START_SEQUENCE + 1);
}

#[tokio::test]
async fn test_relisted_token_is_bought_again() {
    let market = StubMarketplace::new(vec![
        Page::Listings(vec![listing("bear-1", "t1", 40)]),
        Page::Listings(vec![listing("bear-1", "t2", 45)]),
    ]);
    let mut harness = Harness::start(market, StubNode::new());

    harness.wait_for_finished(2).await;
    let outcome = harness.shutdown().await;

    assert_eq!(outcome.found(), vec!["bear-1", "bear-1"]);
    assert_eq!(outcome.keys_seen, 2);
}

#[tokio::test]
async fn test_malformed_envelope_reports_encode_failure() {
    let market = StubMarketplace::new(vec![Page::Listings(vec![listing("bear-1", "t1", 40)])]);
    let node = StubNode::new().with_encode_body("{\"message\":\"invalid payload\"}");
    let mut harness = Harness::start(market, node);

    harness.wait_for_finished(1).await;
    let node = harness.node.clone();
    let outcome = harness.shutdown().await;

    assert!(matches!(outcome.finished()[0], AttemptOutcome::EncodeFailed { .. }));
    assert_eq!(node.encode_calls(), 1);
    assert!(node.submitted().is_empty());
    assert_eq!(outcome.account.sequence_number(), START_SEQUENCE);
}

#[tokio::test]
async fn test_accepted_and_confirmed_purchase() {
    let market = StubMarketplace::new(vec![Page::Listings(vec![listing("bear-1", "t1", 40)])]);
    let node = StubNode::new()
        .with_response(SubmitResponse::Accepted { hash: Some("0xabc".into()) })
        .with_status("0xabc", executed(true, "Executed successfully"));
    let mut harness = Harness::start(market, node);

    harness.wait_for_finished(1).await;
    let outcome = harness.shutdown().await;

    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, SnipeEvent::Submitted { hash, .. } if hash == "0xabc")));
    assert_eq!(
        outcome.finished(),
        vec![&AttemptOutcome::Purchased { hash: "0xabc".into() }]
    );
    assert_eq!(outcome.account.sequence_number(), START_SEQUENCE + 1);
}

#[tokio::test]
async fn test_failed_execution_still_consumes_sequence() {
    let market = StubMarketplace::new(vec![Page::Listings(vec![listing("bear-1", "t1", 40)])]);
    let node = StubNode::new()
        .with_response(SubmitResponse::Accepted { hash: Some("0xdead".into()) })
        .with_status("0xdead", executed(false, "Move abort in 0x1::coin: EINSUFFICIENT_BALANCE"));
    let mut harness = Harness::start(market, node);

    harness.wait_for_finished(1).await;
    let outcome = harness.shutdown().await;

    assert!(matches!(
        outcome.finished()[0],
        AttemptOutcome::PurchaseFailed { vm_status, .. } if vm_status.contains("EINSUFFICIENT_BALANCE")
    ));
    assert_eq!(outcome.account.sequence_number(), START_SEQUENCE + 1);
}

#[tokio::test]
async fn test_stale_sequence_resyncs_without_purchase() {
    let market = StubMarketplace::new(vec![Page::Listings(vec![listing("bear-1", "t1", 40)])]);
    let node = StubNode::new().with_response(SubmitResponse::BadRequest {
        message: STALE_SEQUENCE_MESSAGE.into(),
    });
    let mut harness = Harness::start(market, node);

    harness.wait_for_finished(1).await;
    let outcome = harness.shutdown().await;

    assert_eq!(outcome.account.sequence_number(), START_SEQUENCE + 1);
    assert!(matches!(
        outcome.finished()[0],
        AttemptOutcome::SubmissionRejected { resynced: true, .. }
    ));
    assert!(!outcome.finished().iter().any(|o| o.is_purchase()));
}

#[tokio::test]
async fn test_other_rejection_keeps_sequence() {
    let market = StubMarketplace::new(vec![Page::Listings(vec![listing("bear-1", "t1", 40)])]);
    let node = StubNode::new().with_response(SubmitResponse::BadRequest {
        message: "Invalid transaction: Type: Validation Code: INSUFFICIENT_BALANCE_FOR_TRANSACTION_FEE".into(),
    });
    let mut harness = Harness::start(market, node);

    harness.wait_for_finished(1).await;
    let outcome = harness.shutdown().await;

    assert_eq!(outcome.account.sequence_number(), START_SEQUENCE);
    assert!(matches!(
        outcome.finished()[0],
        AttemptOutcome::SubmissionRejected { resynced: false, .. }
    ));
}

#[tokio::test]
async fn test_page_of_listings_gets_consecutive_sequence_numbers() {
    let market = StubMarketplace::new(vec![Page::Listings(vec![
        listing("a", "t1", 10),
        listing("b", "t1", 20),
        listing("c", "t1", 30),
    ])]);
    let mut harness = Harness::start(market, StubNode::new());

    harness.wait_for_finished(3).await;
    let node = harness.node.clone();
    let outcome = harness.shutdown().await;

    let mut numbers: Vec<u64> = node
        .submitted()
        .iter()
        .map(|t| t.sequence_number.parse().unwrap())
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, vec![START_SEQUENCE, START_SEQUENCE + 1, START_SEQUENCE + 2]);
    assert_eq!(outcome.account.sequence_number(), START_SEQUENCE + 3);
    assert!(outcome.finished().iter().all(|o| o.is_purchase()));

    let sender = outcome.account.wallet.address().to_string();
    assert!(node.submitted().iter().all(|t| t.sender == sender));
}

#[tokio::test]
async fn test_fetch_failure_backs_off_and_recovers() {
    let market = StubMarketplace::new(vec![
        Page::RateLimited,
        Page::RateLimited,
        Page::Listings(vec![listing("bear-1", "t1", 40)]),
    ]);
    let mut harness = Harness::start(market, StubNode::new());

    harness.wait_for_finished(1).await;
    let outcome = harness.shutdown().await;

    let failures = outcome
        .events
        .iter()
        .filter(|e| matches!(e, SnipeEvent::FetchFailed { .. }))
        .count();
    assert_eq!(failures, 2);
    assert!(outcome.finished()[0].is_purchase());
    assert_eq!(outcome.poller_state, PollerState::Stopped);
}

#[tokio::test]
async fn test_session_events_are_bracketed() {
    let market = StubMarketplace::new(Vec::new());
    let harness = Harness::start(market, StubNode::new());

    harness.wait_for_fetches(2).await;
    let outcome = harness.shutdown().await;

    assert!(matches!(outcome.events.first(), Some(SnipeEvent::Started { threshold, .. }) if *threshold == THRESHOLD));
    assert!(matches!(outcome.events.last(), Some(SnipeEvent::Stopped { .. })));
    assert!(outcome.finished().is_empty());
    assert_eq!(outcome.account.sequence_number(), START_SEQUENCE);
}

#[tokio::test]
async fn test_reporter_consumes_a_full_session() {
    let market = StubMarketplace::new(vec![Page::Listings(vec![listing("bear-1", "t1", 40)])]);
    let mut harness = Harness::start(market, StubNode::new());

    harness.wait_for_finished(1).await;
    let outcome = harness.shutdown().await;

    let (tx, rx) = mpsc::unbounded_channel();
    for event in outcome.events {
        tx.send(event).unwrap();
    }
    drop(tx);
    tokio::time::timeout(Duration::from_secs(1), reporter::run(rx))
        .await
        .expect("reporter did not drain");
}

#[tokio::test]
async fn test_stub_resolves_collection() {
    let market = StubMarketplace::new(Vec::new());
    assert_eq!(market.resolve_collection("bruh-bears").await.unwrap(), collection());
    assert!(market.resolve_collection("unknown").await.is_err());
}
