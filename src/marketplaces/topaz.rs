//! Topaz marketplace integration.
//!
//! Base URL: https://api-v1.topaz.so/api
//! Listings: `GET /listing-view-p` (price ascending, paged by from/to)
//! Collection lookup: `GET /collection?slug={slug}`
//! Buy entry point: `marketplace_v2::buy`, one token per call.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{get_json, MarketplaceAdapter, APTOS_COIN};
use crate::chain::EntryFunctionPayload;
use crate::types::{
    deserialize_price, deserialize_rank, CollectionInfo, Listing, Marketplace, MarketplaceError,
    Octas,
};

const MARKETPLACE: Marketplace = Marketplace::Topaz;

const BUY_FUNCTION: &str =
    "0x2c7bccf7b31baf770fdbcc768d9e9cb3d87805e255355df5db32ac9a669010a2::marketplace_v2::buy";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TopazListingResponse {
    #[serde(default)]
    error: bool,
    #[serde(default, rename = "statusText")]
    status_text: Option<String>,
    #[serde(default)]
    data: Vec<TopazListing>,
}

#[derive(Debug, Deserialize)]
struct TopazListing {
    token_id: String,
    token_name: String,
    #[serde(default = "listed_by_default")]
    is_listed: bool,
    #[serde(default)]
    seller: Option<String>,
    #[serde(default, deserialize_with = "deserialize_price")]
    price: Option<Octas>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    preview_uri: Option<String>,
    #[serde(default, deserialize_with = "deserialize_rank")]
    rank: Option<u32>,
}

fn listed_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TopazCollectionResponse {
    #[serde(default)]
    data: Option<TopazCollectionData>,
}

#[derive(Debug, Deserialize)]
struct TopazCollectionData {
    collection: TopazCollection,
}

#[derive(Debug, Deserialize)]
struct TopazCollection {
    #[serde(default)]
    collection_id: String,
    #[serde(default)]
    creator: String,
    #[serde(default)]
    name: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct TopazClient {
    http: Client,
    api_url: String,
    page_size: u32,
}

impl TopazClient {
    pub fn new(api_url: &str, page_size: u32, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for Topaz")?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
        })
    }

    /// `None` when the row has no buyable offer behind it. The buy call
    /// needs both a price and a seller address.
    fn to_listing(raw: TopazListing) -> Option<Listing> {
        if !raw.is_listed {
            return None;
        }
        let (Some(price), Some(seller)) = (raw.price, raw.seller.filter(|s| !s.is_empty())) else {
            debug!(token = %raw.token_name, "Skipping Topaz row without price or seller");
            return None;
        };
        let updated_at = raw.updated_at.unwrap_or_default();
        Some(Listing {
            key: format!("{}@{}", raw.token_id, updated_at),
            marketplace: MARKETPLACE,
            token_id: raw.token_id,
            token_name: raw.token_name,
            seller: Some(seller),
            price,
            preview_uri: raw.preview_uri.unwrap_or_default(),
            rank: raw.rank,
        })
    }

    fn parse_listings(resp: TopazListingResponse) -> Result<Vec<Listing>, MarketplaceError> {
        if resp.error {
            return Err(MarketplaceError::Api {
                marketplace: MARKETPLACE,
                message: resp.status_text.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        Ok(resp.data.into_iter().filter_map(Self::to_listing).collect())
    }

    fn parse_collection(
        resp: TopazCollectionResponse,
        slug: &str,
    ) -> Result<CollectionInfo, MarketplaceError> {
        match resp.data.map(|d| d.collection) {
            Some(c) if !c.collection_id.is_empty() => Ok(CollectionInfo {
                name: c.name,
                id: c.collection_id,
                creator: c.creator,
            }),
            _ => Err(MarketplaceError::CollectionNotFound {
                marketplace: MARKETPLACE,
                slug: slug.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MarketplaceAdapter trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl MarketplaceAdapter for TopazClient {
    fn marketplace(&self) -> Marketplace {
        MARKETPLACE
    }

    async fn resolve_collection(&self, slug: &str) -> Result<CollectionInfo, MarketplaceError> {
        let url = format!("{}/collection?slug={}", self.api_url, urlencoding::encode(slug));
        let resp: TopazCollectionResponse = get_json(MARKETPLACE, self.http.get(&url)).await?;
        Self::parse_collection(resp, slug)
    }

    /// Topaz has no server-side price ceiling; the whole cheapest page comes back.
    async fn fetch_listings(
        &self,
        collection: &CollectionInfo,
        _threshold: Octas,
    ) -> Result<Vec<Listing>, MarketplaceError> {
        let to = (self.page_size - 1).to_string();
        let request = self
            .http
            .get(format!("{}/listing-view-p", self.api_url))
            .query(&[
                ("collection_id", collection.id.as_str()),
                ("from", "0"),
                ("to", to.as_str()),
                ("sort_mode", "PRICE_LOW_TO_HIGH"),
                ("buy_now", "false"),
                ("page", "0"),
                ("min_price", "undefined"),
                ("max_price", "null"),
                ("filters", "{}"),
                ("search", "null"),
            ]);

        let resp: TopazListingResponse = get_json(MARKETPLACE, request).await?;
        let listings = Self::parse_listings(resp)?;
        debug!(count = listings.len(), collection = %collection.name, "Topaz page fetched");
        Ok(listings)
    }

    fn build_payload(&self, listing: &Listing, collection: &CollectionInfo) -> EntryFunctionPayload {
        EntryFunctionPayload::new(
            BUY_FUNCTION,
            vec![APTOS_COIN.to_string()],
            vec![
                json!(listing.seller.clone().unwrap_or_default()),
                json!(listing.price.as_u64().to_string()),
                json!("1"),
                json!(collection.creator),
                json!(collection.name),
                json!(listing.token_name),
                json!("0"),
            ],
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
