//! Marketplace integrations.
//!
//! Defines the `MarketplaceAdapter` trait and provides implementations for:
//! - Topaz: listing view sorted by price, `marketplace_v2::buy`
//! - BlueMove: Strapi-style market-items API, `marketplaceV2::batch_buy_script`

pub mod bluemove;
pub mod topaz;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::EntryFunctionPayload;
use crate::config::MarketplacesConfig;
use crate::types::{CollectionInfo, Listing, Marketplace, MarketplaceError, Octas};

/// Coin type argument for APT-denominated purchases.
pub const APTOS_COIN: &str = "0x1::aptos_coin::AptosCoin";

/// Abstraction over an NFT marketplace.
///
/// Adapters fetch a single page per call and never retry; the poller owns
/// the retry policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketplaceAdapter: Send + Sync {
    /// Which marketplace this adapter talks to.
    fn marketplace(&self) -> Marketplace;

    /// Resolve a user-supplied collection slug into payload metadata.
    async fn resolve_collection(&self, slug: &str) -> Result<CollectionInfo, MarketplaceError>;

    /// Fetch one page of current listings, cheapest first where supported.
    /// `threshold` is a hint; callers still filter.
    async fn fetch_listings(
        &self,
        collection: &CollectionInfo,
        threshold: Octas,
    ) -> Result<Vec<Listing>, MarketplaceError>;

    /// Translate an accepted listing into the marketplace's buy call.
    fn build_payload(&self, listing: &Listing, collection: &CollectionInfo) -> EntryFunctionPayload;
}

/// Build the adapter for `marketplace` from config.
pub fn adapter_for(
    marketplace: Marketplace,
    config: &MarketplacesConfig,
    timeout: Duration,
) -> Result<Arc<dyn MarketplaceAdapter>> {
    Ok(match marketplace {
        Marketplace::Topaz => Arc::new(topaz::TopazClient::new(
            &config.topaz.api_url,
            config.topaz.page_size,
            timeout,
        )?),
        Marketplace::BlueMove => Arc::new(bluemove::BlueMoveClient::new(
            &config.bluemove.api_url,
            config.bluemove.page_size,
            timeout,
        )?),
    })
}

/// Send a GET and decode its JSON body, mapping every failure onto
/// `MarketplaceError`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    marketplace: Marketplace,
    request: RequestBuilder,
) -> Result<T, MarketplaceError> {
    let resp = request
        .send()
        .await
        .map_err(|source| MarketplaceError::Request { marketplace, source })?;

    match resp.status() {
        StatusCode::TOO_MANY_REQUESTS => return Err(MarketplaceError::RateLimited { marketplace }),
        status if !status.is_success() => {
            return Err(MarketplaceError::Status { marketplace, status: status.as_u16() })
        }
        _ => {}
    }

    let body = resp
        .bytes()
        .await
        .map_err(|source| MarketplaceError::Request { marketplace, source })?;

    serde_json::from_slice(&body).map_err(|e| MarketplaceError::Decode {
        marketplace,
        message: e.to_string(),
    })
}
