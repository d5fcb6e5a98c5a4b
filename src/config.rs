//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! field has a default, so a partial file (or none at all) is valid. Wallet
//! and node settings live in the persisted settings document, not here.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::chain::GasSchedule;
use crate::engine::poller::PollTiming;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub sniper: SniperConfig,
    pub chain: ChainConfig,
    pub marketplaces: MarketplacesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SniperConfig {
    /// Cool-down between successful polls.
    pub poll_interval_ms: u64,
    /// Sleep after a failed poll (network error, 429, bad body).
    pub error_backoff_ms: u64,
    /// Delay after each dispatched listing.
    pub dispatch_pacing_ms: u64,
    /// Listing keys remembered per session before the oldest are evicted.
    pub dedup_capacity: usize,
}

impl Default for SniperConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            error_backoff_ms: 10_000,
            dispatch_pacing_ms: 100,
            dedup_capacity: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChainConfig {
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    /// Transaction expiry horizon from build time.
    pub expiration_secs: i64,
    /// Wait between a 202 and the by-hash lookup.
    pub confirmation_delay_secs: u64,
    /// Capacity of the queue feeding the submission worker.
    pub submission_queue: usize,
    pub request_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_gas_amount: 100_000,
            gas_unit_price: 100,
            expiration_secs: 600,
            confirmation_delay_secs: 10,
            submission_queue: 32,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketplacesConfig {
    #[serde(deserialize_with = "topaz_endpoint")]
    pub topaz: MarketplaceEndpoint,
    #[serde(deserialize_with = "bluemove_endpoint")]
    pub bluemove: MarketplaceEndpoint,
}

impl Default for MarketplacesConfig {
    fn default() -> Self {
        Self {
            topaz: MarketplaceEndpoint::topaz(),
            bluemove: MarketplaceEndpoint::bluemove(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceEndpoint {
    pub api_url: String,
    pub page_size: u32,
}

impl MarketplaceEndpoint {
    fn topaz() -> Self {
        Self {
            api_url: "https://api-v1.topaz.so/api".to_string(),
            page_size: 50,
        }
    }

    fn bluemove() -> Self {
        Self {
            api_url: "https://aptos-mainnet-api.bluemove.net/api".to_string(),
            page_size: 5,
        }
    }
}

/// A `[marketplaces.*]` section as written; absent keys keep that
/// marketplace's defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct EndpointOverride {
    api_url: Option<String>,
    page_size: Option<u32>,
}

impl EndpointOverride {
    fn apply(self, base: MarketplaceEndpoint) -> MarketplaceEndpoint {
        MarketplaceEndpoint {
            api_url: self.api_url.unwrap_or(base.api_url),
            page_size: self.page_size.unwrap_or(base.page_size),
        }
    }
}

fn topaz_endpoint<'de, D>(deserializer: D) -> Result<MarketplaceEndpoint, D::Error>
where
    D: Deserializer<'de>,
{
    EndpointOverride::deserialize(deserializer).map(|o| o.apply(MarketplaceEndpoint::topaz()))
}

fn bluemove_endpoint<'de, D>(deserializer: D) -> Result<MarketplaceEndpoint, D::Error>
where
    D: Deserializer<'de>,
{
    EndpointOverride::deserialize(deserializer).map(|o| o.apply(MarketplaceEndpoint::bluemove()))
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            info!(path, "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn poll_timing(&self) -> PollTiming {
        PollTiming {
            poll_interval: Duration::from_millis(self.sniper.poll_interval_ms),
            error_backoff: Duration::from_millis(self.sniper.error_backoff_ms),
            dispatch_pacing: Duration::from_millis(self.sniper.dispatch_pacing_ms),
        }
    }

    pub fn gas_schedule(&self) -> GasSchedule {
        GasSchedule {
            max_gas_amount: self.chain.max_gas_amount,
            gas_unit_price: self.chain.gas_unit_price,
            expiration_secs: self.chain.expiration_secs,
        }
    }

    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_secs(self.chain.confirmation_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.chain.request_timeout_secs)
    }
}
