//! REST client for an Aptos full node.
//!
//! Base URL: `{aptos_node_url}` from the settings file, e.g.
//! `https://fullnode.mainnet.aptoslabs.com/v1`.
//!
//! Endpoints used:
//! - `POST /transactions/encode_submission`
//! - `POST /transactions`
//! - `GET  /transactions/by_hash/{hash}`
//! - `GET  /accounts/{address}`
//! - `GET  /accounts/{address}/resource/{coin_store}`

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{unwrap_signing_message, ChainClient, SubmitResponse, TransactionRequest, TransactionStatus};
use crate::types::{ChainError, Octas};

/// Coin store resource holding the APT balance.
const APT_COIN_STORE: &str = "0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AccountResponse {
    sequence_number: String,
}

#[derive(Debug, Deserialize)]
struct CoinStoreResponse {
    data: CoinStoreData,
}

#[derive(Debug, Deserialize)]
struct CoinStoreData {
    coin: CoinValue,
}

#[derive(Debug, Deserialize)]
struct CoinValue {
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct HashResponse {
    #[serde(default)]
    hash: String,
}

#[derive(Debug, Default, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Aptos node REST client.
pub struct NodeClient {
    http: Client,
    base_url: String,
}

impl NodeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("MERCURY/0.1.0 (aptos-sniper)")
            .build()
            .context("Failed to build HTTP client for Aptos node")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check that the node answers at all. Any HTTP response counts.
    pub async fn ping(&self) -> Result<(), ChainError> {
        self.http.get(&self.base_url).send().await?;
        Ok(())
    }

    /// Classify a `POST /transactions` response by status code.
    fn classify_submit(status: StatusCode, body: &str) -> SubmitResponse {
        match status {
            StatusCode::ACCEPTED => {
                let parsed: HashResponse = serde_json::from_str(body).unwrap_or_default();
                let hash = Some(parsed.hash).filter(|h| !h.is_empty());
                SubmitResponse::Accepted { hash }
            }
            StatusCode::BAD_REQUEST => {
                let parsed: MessageResponse = serde_json::from_str(body).unwrap_or_default();
                SubmitResponse::BadRequest { message: parsed.message }
            }
            other => SubmitResponse::Other { status: other.as_u16() },
        }
    }

    async fn get_ok(&self, url: &str) -> Result<String, ChainError> {
        let resp = self
            .http
            .get(url)
            .header("Content-Type", "application/json")
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ChainError::Status { status: status.as_u16(), body });
        }
        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// ChainClient trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ChainClient for NodeClient {
    async fn encode_submission(&self, txn: &TransactionRequest) -> Result<Vec<u8>, ChainError> {
        let resp = self
            .http
            .post(self.url("transactions/encode_submission"))
            .json(txn)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if status != StatusCode::OK {
            return Err(ChainError::Status { status: status.as_u16(), body });
        }

        unwrap_signing_message(&body)
    }

    async fn submit_transaction(
        &self,
        txn: &TransactionRequest,
    ) -> Result<SubmitResponse, ChainError> {
        let resp = self
            .http
            .post(self.url("transactions"))
            .json(txn)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), sequence_number = %txn.sequence_number, "Submission answered");

        Ok(Self::classify_submit(status, &body))
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<TransactionStatus, ChainError> {
        let url = self.url(&format!("transactions/by_hash/{}", urlencoding::encode(hash)));
        let body = self.get_ok(&url).await?;
        serde_json::from_str(&body).map_err(|e| ChainError::Decode(e.to_string()))
    }

    async fn sequence_number(&self, address: &str) -> Result<u64, ChainError> {
        let body = self.get_ok(&self.url(&format!("accounts/{address}"))).await?;
        let account: AccountResponse =
            serde_json::from_str(&body).map_err(|e| ChainError::Decode(e.to_string()))?;
        account
            .sequence_number
            .parse()
            .map_err(|_| ChainError::Decode(format!("bad sequence_number: {}", account.sequence_number)))
    }

    async fn balance(&self, address: &str) -> Result<Octas, ChainError> {
        let url = self.url(&format!(
            "accounts/{address}/resource/{}",
            urlencoding::encode(APT_COIN_STORE)
        ));
        let body = self.get_ok(&url).await?;
        let store: CoinStoreResponse =
            serde_json::from_str(&body).map_err(|e| ChainError::Decode(e.to_string()))?;
        store
            .data
            .coin
            .value
            .parse()
            .map(Octas)
            .map_err(|_| ChainError::Decode(format!("bad coin value: {}", store.data.coin.value)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
