//! Listing poller.
//!
//! Repeatedly fetches one page of listings for the target collection, picks
//! out the ones at or under the price ceiling that have not been seen this
//! session, and hands each to the dispatcher. Fetch failures (network, 429,
//! bad body) are reported and followed by a longer back-off; they never end
//! the session. Only the stop signal does.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::engine::dedup::DedupCache;
use crate::engine::pipeline::Dispatch;
use crate::engine::reporter::{EventSender, SnipeEvent};
use crate::marketplaces::MarketplaceAdapter;
use crate::types::{CollectionInfo, MarketplaceError, Octas};

/// Sleep schedule of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub dispatch_pacing: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1_000),
            error_backoff: Duration::from_millis(10_000),
            dispatch_pacing: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Running,
    Stopped,
}

pub struct ListingPoller {
    adapter: Arc<dyn MarketplaceAdapter>,
    collection: CollectionInfo,
    threshold: Octas,
    dedup: DedupCache,
    dispatcher: Arc<dyn Dispatch>,
    events: EventSender,
    timing: PollTiming,
    state: PollerState,
}

impl ListingPoller {
    pub fn new(
        adapter: Arc<dyn MarketplaceAdapter>,
        collection: CollectionInfo,
        threshold: Octas,
        dispatcher: Arc<dyn Dispatch>,
        events: EventSender,
        timing: PollTiming,
        dedup_capacity: usize,
    ) -> Self {
        Self {
            adapter,
            collection,
            threshold,
            dedup: DedupCache::new(dedup_capacity),
            dispatcher,
            events,
            timing,
            state: PollerState::Running,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    /// One fetch-filter-dispatch pass. Returns how many listings were
    /// dispatched.
    pub async fn poll_once(&mut self) -> Result<usize, MarketplaceError> {
        let listings = self
            .adapter
            .fetch_listings(&self.collection, self.threshold)
            .await?;

        let mut dispatched = 0;
        for listing in listings {
            if !listing.is_under(self.threshold) {
                continue;
            }
            if !self.dedup.insert(&listing.key) {
                continue;
            }

            let payload = self.adapter.build_payload(&listing, &self.collection);
            self.emit(SnipeEvent::ListingFound {
                listing: listing.clone(),
            });
            self.dispatcher.dispatch(listing, payload);
            dispatched += 1;

            if !self.timing.dispatch_pacing.is_zero() {
                tokio::time::sleep(self.timing.dispatch_pacing).await;
            }
        }

        Ok(dispatched)
    }

    /// Poll until `stop` flips to `true` (or its sender is dropped).
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> Self {
        let marketplace = self.adapter.marketplace();
        self.emit(SnipeEvent::Started {
            marketplace,
            collection: self.collection.name.clone(),
            threshold: self.threshold,
        });

        while !*stop.borrow() {
            let polled = tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                result = self.poll_once() => result,
            };

            let delay = match polled {
                Ok(dispatched) => {
                    debug!(dispatched, seen = self.dedup.len(), "Poll complete");
                    self.timing.poll_interval
                }
                Err(e) => {
                    debug!(
                        %marketplace,
                        error = %e,
                        backoff = ?self.timing.error_backoff,
                        "Poll failed, backing off"
                    );
                    self.emit(SnipeEvent::FetchFailed {
                        marketplace,
                        reason: e.to_string(),
                    });
                    self.timing.error_backoff
                }
            };

            tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.state = PollerState::Stopped;
        self.emit(SnipeEvent::Stopped { marketplace });
        self
    }

    fn emit(&self, event: SnipeEvent) {
        let _ = self.events.send(event);
    }
}

/// Resolves once the stop flag is set or its sender is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
