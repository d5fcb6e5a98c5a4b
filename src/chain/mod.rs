//! Aptos full-node integration.
//!
//! Defines the `ChainClient` trait used by the submission pipeline and the
//! wire types of the three transaction calls (encode, submit, confirm) plus
//! the two account reads done at startup.

pub mod node;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ChainError, Octas};

/// Payload type tag for entry function calls.
pub const ENTRY_FUNCTION_PAYLOAD: &str = "entry_function_payload";

/// Signature scheme tag expected by the node.
pub const ED25519_SIGNATURE: &str = "ed25519_signature";

/// Message fragment the node uses when a submission's sequence number has
/// already been consumed.
pub const STALE_SEQUENCE_CODE: &str = "SEQUENCE_NUMBER_TOO_OLD";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// An entry function call. Arguments are marketplace-specific JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFunctionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<serde_json::Value>,
}

impl EntryFunctionPayload {
    pub fn new(
        function: impl Into<String>,
        type_arguments: Vec<String>,
        arguments: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            kind: ENTRY_FUNCTION_PAYLOAD.to_string(),
            function: function.into(),
            type_arguments,
            arguments,
        }
    }
}

/// `{type, public_key, signature}` block attached after signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub public_key: String,
    pub signature: String,
}

/// Gas and expiry settings applied to every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSchedule {
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    pub expiration_secs: i64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            max_gas_amount: 100_000,
            gas_unit_price: 100,
            expiration_secs: 600,
        }
    }
}

/// A user transaction envelope. Numeric fields travel as decimal strings;
/// `signature` serializes as `null` until signed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRequest {
    pub sender: String,
    pub sequence_number: String,
    pub max_gas_amount: String,
    pub gas_unit_price: String,
    pub expiration_timestamp_secs: String,
    pub payload: EntryFunctionPayload,
    pub signature: Option<SignatureBlock>,
}

impl TransactionRequest {
    /// Build an unsigned envelope expiring `gas.expiration_secs` after `now_secs`.
    pub fn unsigned(
        sender: &str,
        sequence_number: u64,
        gas: GasSchedule,
        now_secs: i64,
        payload: EntryFunctionPayload,
    ) -> Self {
        Self {
            sender: sender.to_string(),
            sequence_number: sequence_number.to_string(),
            max_gas_amount: gas.max_gas_amount.to_string(),
            gas_unit_price: gas.gas_unit_price.to_string(),
            expiration_timestamp_secs: (now_secs + gas.expiration_secs).to_string(),
            payload,
            signature: None,
        }
    }

    pub fn with_signature(mut self, signature: SignatureBlock) -> Self {
        self.signature = Some(signature);
        self
    }
}

/// How the node answered a signed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResponse {
    /// 202 Accepted. `hash` is `None` when the body carried no usable hash.
    Accepted { hash: Option<String> },
    /// 400 Bad Request with the node's message.
    BadRequest { message: String },
    /// Any other status.
    Other { status: u16 },
}

/// Result of `GET /transactions/by_hash/{hash}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransactionStatus {
    /// `user_transaction` once committed, `pending_transaction` before.
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub vm_status: String,
}

impl TransactionStatus {
    pub fn is_pending(&self) -> bool {
        self.kind == "pending_transaction"
    }
}

/// Whether a 400 message reports a stale sequence number.
pub fn is_stale_sequence(message: &str) -> bool {
    message.contains(STALE_SEQUENCE_CODE)
}

/// Unwrap the encode-submission body into the bytes to sign.
///
/// The node returns a JSON string holding `0x`-prefixed hex, i.e. the body is
/// `"0x…"` including the quotes: three framing characters in front, one behind.
pub fn unwrap_signing_message(body: &str) -> Result<Vec<u8>, ChainError> {
    let body = body.trim();
    let hex_body = body
        .strip_prefix("\"0x")
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| ChainError::MalformedEnvelope(truncate(body, 64)))?;
    if hex_body.is_empty() {
        return Err(ChainError::MalformedEnvelope("empty signing message".into()));
    }
    hex::decode(hex_body).map_err(|e| ChainError::MalformedEnvelope(e.to_string()))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Client abstraction
// ---------------------------------------------------------------------------

/// Abstraction over an Aptos full node.
///
/// Implementations perform no retries; retry policy, where any exists, lives
/// with the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Ask the node for the canonical bytes to sign for an unsigned envelope.
    async fn encode_submission(&self, txn: &TransactionRequest) -> Result<Vec<u8>, ChainError>;

    /// Submit a signed transaction.
    async fn submit_transaction(&self, txn: &TransactionRequest)
        -> Result<SubmitResponse, ChainError>;

    /// Fetch the execution result of a submitted transaction.
    async fn transaction_by_hash(&self, hash: &str) -> Result<TransactionStatus, ChainError>;

    /// The account's next expected sequence number.
    async fn sequence_number(&self, address: &str) -> Result<u64, ChainError>;

    /// The account's APT balance.
    async fn balance(&self, address: &str) -> Result<Octas, ChainError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
