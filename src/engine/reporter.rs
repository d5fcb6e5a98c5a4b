//! Result reporter.
//!
//! Poller and pipeline runs emit `SnipeEvent`s over an unbounded channel;
//! the reporter turns each one into exactly one timestamped log line. It
//! holds no state.

use std::fmt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::types::{Listing, Marketplace, Octas};

pub type EventSender = mpsc::UnboundedSender<SnipeEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SnipeEvent>;

/// Terminal outcome of one purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Confirmed on chain with `success = true`.
    Purchased { hash: String },
    /// Landed but failed, or rejected before the VM ran.
    PurchaseFailed { hash: String, vm_status: String },
    /// Accepted, but the by-hash lookup failed. The purchase may or may not
    /// have happened.
    ConfirmationUnknown { hash: String, reason: String },
    /// The node would not encode the envelope.
    EncodeFailed { reason: String },
    /// 400 from the submit endpoint. `resynced` is set when the message was
    /// the stale-sequence error and the local counter was advanced.
    SubmissionRejected { message: String, resynced: bool },
    /// Transport error, unexpected status, or a 202 without a hash.
    SubmissionFailed { reason: String },
}

impl AttemptOutcome {
    pub fn is_purchase(&self) -> bool {
        matches!(self, AttemptOutcome::Purchased { .. })
    }

    /// Transaction hash, for outcomes that got as far as submission.
    pub fn hash(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Purchased { hash }
            | AttemptOutcome::PurchaseFailed { hash, .. }
            | AttemptOutcome::ConfirmationUnknown { hash, .. } => Some(hash),
            _ => None,
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Purchased { hash } => write!(f, "purchased ({hash})"),
            AttemptOutcome::PurchaseFailed { vm_status, .. } => write!(f, "failed purchase: {vm_status}"),
            AttemptOutcome::ConfirmationUnknown { reason, .. } => write!(f, "confirmation unknown: {reason}"),
            AttemptOutcome::EncodeFailed { reason } => write!(f, "error encode submission: {reason}"),
            AttemptOutcome::SubmissionRejected { message, .. } => write!(f, "rejected: {message}"),
            AttemptOutcome::SubmissionFailed { reason } => write!(f, "error send transaction: {reason}"),
        }
    }
}

/// Everything the operator is told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnipeEvent {
    Started { marketplace: Marketplace, collection: String, threshold: Octas },
    ListingFound { listing: Listing },
    FetchFailed { marketplace: Marketplace, reason: String },
    Submitted { listing: Listing, hash: String },
    Finished { listing: Listing, outcome: AttemptOutcome },
    Stopped { marketplace: Marketplace },
}

/// Write one status line for `event`.
pub fn log_event(event: &SnipeEvent) {
    match event {
        SnipeEvent::Started { marketplace, collection, threshold } => {
            info!(%marketplace, %collection, max_price = %threshold, "Start sniper");
        }
        SnipeEvent::ListingFound { listing } => {
            info!(
                marketplace = %listing.marketplace,
                token = %listing.token_name,
                price = %listing.price,
                rank = ?listing.rank,
                "New item found for {}", listing.price
            );
        }
        SnipeEvent::FetchFailed { marketplace, reason } => {
            error!(%marketplace, %reason, "Poll failed");
        }
        SnipeEvent::Submitted { listing, hash } => {
            info!(token = %listing.token_name, %hash, "Transaction send successfully");
        }
        SnipeEvent::Finished { listing, outcome } => match outcome {
            AttemptOutcome::Purchased { hash } => {
                info!(
                    status = "SUCCESS",
                    token = %listing.token_name,
                    price = %listing.price,
                    %hash,
                    "Successfully purchased {} for {}", listing.token_name, listing.price
                );
            }
            AttemptOutcome::SubmissionRejected { message, resynced } => {
                warn!(token = %listing.token_name, %message, resynced, "Transaction rejected");
            }
            other => {
                error!(token = %listing.token_name, hash = ?other.hash(), "{other}");
            }
        },
        SnipeEvent::Stopped { marketplace } => {
            info!(%marketplace, "Sniper stopped");
        }
    }
}

/// Drain the event channel until every sender is gone.
pub async fn run(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        log_event(&event);
    }
}
