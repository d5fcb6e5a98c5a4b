//! Shared types for the MERCURY sniper.
//!
//! These types form the data model used across all modules: prices in
//! octas, marketplace identifiers, collection metadata, listings, and the
//! typed errors returned at the marketplace/chain/wallet seams.

use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// Octas per APT (the coin has 8 decimal places).
pub const OCTAS_PER_APT: u64 = 100_000_000;

/// An amount in octas, the smallest APT unit.
///
/// All price comparisons and payload arguments use this integer type;
/// decimal input is converted once, at the edge, with fixed-point arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Octas(pub u64);

impl Octas {
    pub const ZERO: Octas = Octas(0);

    /// Parse a decimal APT amount such as `"0.5"` into octas.
    ///
    /// Digits beyond the eighth decimal place are truncated toward zero.
    pub fn from_apt_str(input: &str) -> Result<Self, PriceError> {
        let trimmed = input.trim();
        let apt = Decimal::from_str(trimmed)
            .map_err(|_| PriceError::Invalid(trimmed.to_string()))?;
        if apt.is_sign_negative() && !apt.is_zero() {
            return Err(PriceError::Negative(trimmed.to_string()));
        }
        let octas = apt
            .checked_mul(Decimal::from(OCTAS_PER_APT))
            .ok_or_else(|| PriceError::Overflow(trimmed.to_string()))?
            .trunc();
        octas
            .to_u64()
            .map(Octas)
            .ok_or_else(|| PriceError::Overflow(trimmed.to_string()))
    }

    /// Interpret a marketplace JSON price (integer, decimal, or string-encoded)
    /// as octas without going through floating point.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let decimal = match value {
            serde_json::Value::Number(n) => {
                if let Some(exact) = n.as_u64() {
                    return Some(Octas(exact));
                }
                parse_decimal(&n.to_string())?
            }
            serde_json::Value::String(s) => parse_decimal(s.trim())?,
            _ => return None,
        };
        if decimal.is_sign_negative() && !decimal.is_zero() {
            return None;
        }
        decimal.trunc().to_u64().map(Octas)
    }

    /// The amount in whole APT, as an exact decimal.
    pub fn to_apt(self) -> Decimal {
        (Decimal::from(self.0) / Decimal::from(OCTAS_PER_APT)).normalize()
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Octas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} APT", self.to_apt())
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Serde helper for price fields that arrive as numbers or numeric strings.
///
/// A missing, null or unparseable price decodes to `None` so one bad row
/// does not reject the rest of the page.
pub fn deserialize_price<'de, D>(deserializer: D) -> Result<Option<Octas>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Octas::from_json))
}

/// Serde helper for rank fields that are sometimes strings, sometimes
/// numbers, and sometimes absent or null.
pub fn deserialize_rank<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|r| u32::try_from(r).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Marketplace & collection
// ---------------------------------------------------------------------------

/// The integrated marketplaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Topaz,
    #[value(name = "bluemove")]
    BlueMove,
}

impl Marketplace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Marketplace::Topaz => "topaz",
            Marketplace::BlueMove => "bluemove",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collection metadata needed to build buy payloads.
///
/// `id` is the marketplace's own collection key: the Topaz collection id or
/// the BlueMove slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub creator: String,
}

impl CollectionInfo {
    /// Whether every field needed for sniping has been resolved.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.id.is_empty() && !self.creator.is_empty()
    }
}

impl fmt::Display for CollectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// One marketplace offer, created fresh from every poll response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Dedup key: distinguishes a new offer from one already attempted.
    pub key: String,
    pub marketplace: Marketplace,
    pub token_id: String,
    pub token_name: String,
    /// Seller address. BlueMove does not report one.
    pub seller: Option<String>,
    pub price: Octas,
    pub preview_uri: String,
    pub rank: Option<u32>,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} for {}", self.marketplace, self.token_name, self.price)?;
        if let Some(rank) = self.rank {
            write!(f, " (rank {rank})")?;
        }
        Ok(())
    }
}

impl Listing {
    /// Whether this listing is at or below the operator's threshold.
    pub fn is_under(&self, threshold: Octas) -> bool {
        self.price <= threshold
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Operator price input errors.
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("Invalid price: {0}")]
    Invalid(String),

    #[error("Price must not be negative: {0}")]
    Negative(String),

    #[error("Price out of range: {0}")]
    Overflow(String),
}

/// Marketplace adapter failures. Every variant is a `FetchFailed` condition
/// from the poller's point of view.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("{marketplace}: request failed: {source}")]
    Request {
        marketplace: Marketplace,
        #[source]
        source: reqwest::Error,
    },

    #[error("{marketplace}: 429 Too many requests")]
    RateLimited { marketplace: Marketplace },

    #[error("{marketplace} status: {status}")]
    Status { marketplace: Marketplace, status: u16 },

    #[error("{marketplace}: error decoding response body: {message}")]
    Decode { marketplace: Marketplace, message: String },

    #[error("{marketplace}: api error: {message}")]
    Api { marketplace: Marketplace, message: String },

    #[error("{marketplace}: collection not found: {slug}")]
    CollectionNotFound { marketplace: Marketplace, slug: String },
}

/// Chain node failures.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("node request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("node returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("error decoding node response: {0}")]
    Decode(String),

    #[error("malformed signing envelope: {0}")]
    MalformedEnvelope(String),
}

/// Wallet key material errors (fatal at startup).
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("wrong private key: expected 64 hex characters (optionally 0x-prefixed), got {0}")]
    Length(usize),

    #[error("wrong private key: {0}")]
    Hex(#[from] hex::FromHexError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
