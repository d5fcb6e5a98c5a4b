//! Per-listing purchase pipeline.
//!
//! Each accepted listing becomes an independent task: hand the payload to the
//! submission worker, and if the node accepted it, wait out the confirmation
//! delay and look the transaction up by hash. Attempts never block the
//! poller or each other; only the submission step is serialized.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::chain::{ChainClient, EntryFunctionPayload};
use crate::engine::reporter::{AttemptOutcome, EventSender, SnipeEvent};
use crate::engine::sequencer::{SubmissionHandle, SubmitResult};
use crate::types::Listing;

/// Where the poller sends listings it has accepted.
pub trait Dispatch: Send + Sync {
    /// Start an attempt for `listing`. Must return without waiting for it.
    fn dispatch(&self, listing: Listing, payload: EntryFunctionPayload);
}

#[derive(Clone)]
pub struct TransactionPipeline {
    submitter: SubmissionHandle,
    chain: Arc<dyn ChainClient>,
    events: EventSender,
    confirmation_delay: Duration,
}

impl TransactionPipeline {
    pub fn new(
        submitter: SubmissionHandle,
        chain: Arc<dyn ChainClient>,
        events: EventSender,
        confirmation_delay: Duration,
    ) -> Self {
        Self {
            submitter,
            chain,
            events,
            confirmation_delay,
        }
    }

    /// Drive one attempt to its terminal outcome and report it.
    pub async fn run(&self, listing: Listing, payload: EntryFunctionPayload) -> AttemptOutcome {
        let attempt = Uuid::new_v4();
        debug!(%attempt, key = %listing.key, "Attempt started");

        let outcome = match self.submitter.submit(attempt, payload).await {
            SubmitResult::Accepted { hash } => {
                self.emit(SnipeEvent::Submitted {
                    listing: listing.clone(),
                    hash: hash.clone(),
                });
                tokio::time::sleep(self.confirmation_delay).await;
                self.confirm(hash).await
            }
            SubmitResult::Terminal(outcome) => outcome,
        };

        self.emit(SnipeEvent::Finished {
            listing,
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn confirm(&self, hash: String) -> AttemptOutcome {
        match self.chain.transaction_by_hash(&hash).await {
            Err(e) => {
                debug!(%hash, error = %e, "Transaction lookup failed");
                AttemptOutcome::ConfirmationUnknown {
                    hash,
                    reason: e.to_string(),
                }
            }
            Ok(status) if status.is_pending() => AttemptOutcome::ConfirmationUnknown {
                hash,
                reason: "transaction still pending".into(),
            },
            // A populated `message` means the node never executed it.
            Ok(status) if !status.message.is_empty() => AttemptOutcome::PurchaseFailed {
                hash,
                vm_status: status.message,
            },
            Ok(status) if status.success => AttemptOutcome::Purchased { hash },
            Ok(status) => AttemptOutcome::PurchaseFailed {
                hash,
                vm_status: status.vm_status,
            },
        }
    }

    fn emit(&self, event: SnipeEvent) {
        // Reporter gone means we are shutting down.
        let _ = self.events.send(event);
    }
}

impl Dispatch for TransactionPipeline {
    fn dispatch(&self, listing: Listing, payload: EntryFunctionPayload) {
        let span = info_span!(
            "attempt",
            marketplace = %listing.marketplace,
            token = %listing.token_name
        );
        let pipeline = self.clone();
        tokio::spawn(
            async move {
                pipeline.run(listing, payload).await;
            }
            .instrument(span),
        );
    }
}
