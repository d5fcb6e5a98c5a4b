//! Core engine: poll listings, dispatch purchases, report outcomes.
//!
//! ```text
//! ListingPoller ──dispatch──▶ TransactionPipeline (one task per listing)
//!                                   │ submit        ▲ reply
//!                                   ▼               │
//!                             SubmissionWorker (owns the sequence number)
//!
//! poller + pipeline ──SnipeEvent──▶ reporter
//! ```

pub mod dedup;
pub mod pipeline;
pub mod poller;
pub mod reporter;
pub mod sequencer;
