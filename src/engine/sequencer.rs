//! Submission worker.
//!
//! One task owns the `AccountState` and therefore the sequence counter. Every
//! purchase attempt sends its payload over a bounded queue and waits on a
//! oneshot reply. The worker handles jobs strictly one at a time:
//! snapshot sequence number, build envelope, encode, sign, submit, then apply
//! the sequence rules below before picking up the next job.
//!
//! | submit result             | sequence number |
//! |---------------------------|-----------------|
//! | 202 Accepted              | +1              |
//! | 400 `SEQUENCE_NUMBER_TOO_OLD` | +1          |
//! | any other 400             | unchanged       |
//! | encode failure            | unchanged       |
//! | other status / transport  | unchanged       |

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::chain::{
    is_stale_sequence, ChainClient, EntryFunctionPayload, GasSchedule, SubmitResponse,
    TransactionRequest,
};
use crate::engine::reporter::AttemptOutcome;
use crate::wallet::AccountState;

/// One purchase waiting for a sequence number.
#[derive(Debug)]
pub struct SubmitJob {
    pub attempt: Uuid,
    pub payload: EntryFunctionPayload,
    pub reply: oneshot::Sender<SubmitResult>,
}

/// What the worker tells the waiting attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    /// 202 with a hash; the attempt goes on to confirmation.
    Accepted { hash: String },
    /// Nothing further to do for this attempt.
    Terminal(AttemptOutcome),
}

/// Cloneable front door to the worker.
#[derive(Debug, Clone)]
pub struct SubmissionHandle {
    jobs: mpsc::Sender<SubmitJob>,
    sequence: watch::Receiver<u64>,
}

impl SubmissionHandle {
    /// Queue `payload` and wait for the worker's verdict.
    pub async fn submit(&self, attempt: Uuid, payload: EntryFunctionPayload) -> SubmitResult {
        let (reply, response) = oneshot::channel();
        let job = SubmitJob { attempt, payload, reply };

        if self.jobs.send(job).await.is_err() {
            return SubmitResult::Terminal(AttemptOutcome::SubmissionFailed {
                reason: "submission worker stopped".into(),
            });
        }

        response.await.unwrap_or_else(|_| {
            SubmitResult::Terminal(AttemptOutcome::SubmissionFailed {
                reason: "submission worker dropped the job".into(),
            })
        })
    }

    /// The next sequence number the worker will use.
    pub fn sequence_number(&self) -> u64 {
        *self.sequence.borrow()
    }
}

pub struct SubmissionWorker {
    account: AccountState,
    chain: Arc<dyn ChainClient>,
    gas: GasSchedule,
    jobs: mpsc::Receiver<SubmitJob>,
    sequence: watch::Sender<u64>,
}

impl SubmissionWorker {
    /// Start the worker. It runs until every `SubmissionHandle` is dropped,
    /// then hands the account state back through the join handle.
    pub fn spawn(
        account: AccountState,
        chain: Arc<dyn ChainClient>,
        gas: GasSchedule,
        queue_capacity: usize,
    ) -> (SubmissionHandle, JoinHandle<AccountState>) {
        let (jobs_tx, jobs_rx) = mpsc::channel(queue_capacity.max(1));
        let (sequence_tx, sequence_rx) = watch::channel(account.sequence_number());

        let worker = Self {
            account,
            chain,
            gas,
            jobs: jobs_rx,
            sequence: sequence_tx,
        };
        let handle = tokio::spawn(worker.run());

        (
            SubmissionHandle {
                jobs: jobs_tx,
                sequence: sequence_rx,
            },
            handle,
        )
    }

    async fn run(mut self) -> AccountState {
        debug!(sequence_number = self.account.sequence_number(), "Submission worker started");

        while let Some(job) = self.jobs.recv().await {
            let result = self.process(job.attempt, job.payload).await;
            // The attempt may have been cancelled; the sequence rules are
            // already applied either way.
            let _ = job.reply.send(result);
        }

        debug!(sequence_number = self.account.sequence_number(), "Submission worker stopped");
        self.account
    }

    async fn process(&mut self, attempt: Uuid, payload: EntryFunctionPayload) -> SubmitResult {
        let sequence_number = self.account.sequence_number();
        let now = chrono::Utc::now().timestamp();
        let unsigned = TransactionRequest::unsigned(
            self.account.wallet.address(),
            sequence_number,
            self.gas,
            now,
            payload,
        );

        let message = match self.chain.encode_submission(&unsigned).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(%attempt, sequence_number, error = %e, "Encode submission failed");
                return SubmitResult::Terminal(AttemptOutcome::EncodeFailed {
                    reason: e.to_string(),
                });
            }
        };

        let signed = unsigned.with_signature(self.account.wallet.sign(&message));

        match self.chain.submit_transaction(&signed).await {
            Ok(SubmitResponse::Accepted { hash }) => {
                self.advance();
                match hash {
                    Some(hash) => {
                        debug!(%attempt, sequence_number, %hash, "Transaction accepted");
                        SubmitResult::Accepted { hash }
                    }
                    None => SubmitResult::Terminal(AttemptOutcome::SubmissionFailed {
                        reason: "accepted without a transaction hash".into(),
                    }),
                }
            }
            Ok(SubmitResponse::BadRequest { message }) => {
                let resynced = is_stale_sequence(&message);
                if resynced {
                    self.advance();
                }
                debug!(%attempt, sequence_number, resynced, %message, "Transaction rejected");
                SubmitResult::Terminal(AttemptOutcome::SubmissionRejected { message, resynced })
            }
            Ok(SubmitResponse::Other { status }) => {
                SubmitResult::Terminal(AttemptOutcome::SubmissionFailed {
                    reason: format!("unexpected status {status}"),
                })
            }
            Err(e) => SubmitResult::Terminal(AttemptOutcome::SubmissionFailed {
                reason: e.to_string(),
            }),
        }
    }

    fn advance(&mut self) {
        let next = self.account.advance_sequence();
        self.sequence.send_replace(next);
    }
}
