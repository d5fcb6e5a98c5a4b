//! In-memory Aptos node for end-to-end tests.
//!
//! Encode answers with a configurable raw body that goes through the same
//! envelope unwrapping as the real client. Submissions are recorded and
//! answered from a script, falling back to 202 with a hash derived from the
//! sequence number.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use mercury::chain::{
    unwrap_signing_message, ChainClient, SubmitResponse, TransactionRequest, TransactionStatus,
};
use mercury::types::{ChainError, Octas};

pub const STALE_SEQUENCE_MESSAGE: &str =
    "Invalid transaction: Type: Validation Code: SEQUENCE_NUMBER_TOO_OLD";

pub struct StubNode {
    encode_body: Mutex<String>,
    responses: Mutex<VecDeque<SubmitResponse>>,
    statuses: Mutex<HashMap<String, TransactionStatus>>,
    submitted: Mutex<Vec<TransactionRequest>>,
    encoded: Mutex<usize>,
}

impl StubNode {
    pub fn new() -> Self {
        Self {
            encode_body: Mutex::new("\"0xdeadbeef\"".to_string()),
            responses: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            encoded: Mutex::new(0),
        }
    }

    pub fn with_encode_body(self, body: &str) -> Self {
        *self.encode_body.lock().unwrap() = body.to_string();
        self
    }

    pub fn with_response(self, response: SubmitResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_status(self, hash: &str, status: TransactionStatus) -> Self {
        self.statuses.lock().unwrap().insert(hash.to_string(), status);
        self
    }

    pub fn submitted(&self) -> Vec<TransactionRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn encode_calls(&self) -> usize {
        *self.encoded.lock().unwrap()
    }
}

pub fn executed(success: bool, vm_status: &str) -> TransactionStatus {
    TransactionStatus {
        kind: "user_transaction".into(),
        success,
        message: String::new(),
        vm_status: vm_status.into(),
    }
}

#[async_trait]
impl ChainClient for StubNode {
    async fn encode_submission(&self, txn: &TransactionRequest) -> Result<Vec<u8>, ChainError> {
        assert!(txn.signature.is_none(), "encode must see an unsigned envelope");
        *self.encoded.lock().unwrap() += 1;
        let body = self.encode_body.lock().unwrap().clone();
        unwrap_signing_message(&body)
    }

    async fn submit_transaction(&self, txn: &TransactionRequest) -> Result<SubmitResponse, ChainError> {
        assert!(txn.signature.is_some(), "submit must see a signed envelope");
        self.submitted.lock().unwrap().push(txn.clone());
        let scripted = self.responses.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| SubmitResponse::Accepted {
            hash: Some(format!("0xhash{}", txn.sequence_number)),
        }))
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<TransactionStatus, ChainError> {
        let status = self.statuses.lock().unwrap().get(hash).cloned();
        Ok(status.unwrap_or_else(|| executed(true, "Executed successfully")))
    }

    async fn sequence_number(&self, _address: &str) -> Result<u64, ChainError> {
        Ok(0)
    }

    async fn balance(&self, _address: &str) -> Result<Octas, ChainError> {
        Ok(Octas(1_000_000_000))
    }
}
