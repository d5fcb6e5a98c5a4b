//! BlueMove marketplace integration.
//!
//! Base URL: https://aptos-mainnet-api.bluemove.net/api
//! Listings: `GET /market-items` with Strapi filters (slug, status, price range)
//! Collection lookup: `GET /collections` (one large page, matched by slug locally)
//! Buy entry point: `marketplaceV2::batch_buy_script`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{get_json, MarketplaceAdapter};
use crate::chain::EntryFunctionPayload;
use crate::types::{
    deserialize_price, deserialize_rank, CollectionInfo, Listing, Marketplace, MarketplaceError,
    Octas,
};

const MARKETPLACE: Marketplace = Marketplace::BlueMove;

const BUY_FUNCTION: &str =
    "0xd1fd99c1944b84d1670a2536417e997864ad12303d19eac725891691b04d614e::marketplaceV2::batch_buy_script";

/// The batch-buy entry point expects prices with one more decimal digit
/// than the listing API reports.
const BATCH_BUY_PRICE_SCALE: u128 = 10;

/// Page size used for the one-shot collection lookup.
const COLLECTION_PAGE_SIZE: &str = "10000";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MarketItemsResponse {
    #[serde(default)]
    data: Vec<MarketItem>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct MarketItem {
    id: u64,
    attributes: MarketItemAttributes,
}

#[derive(Debug, Deserialize)]
struct MarketItemAttributes {
    #[serde(default, deserialize_with = "deserialize_price")]
    price: Option<Octas>,
    name: String,
    #[serde(default, rename = "updatedAt")]
    updated_at: Option<String>,
    #[serde(default)]
    uri_media: Option<String>,
    #[serde(default, deserialize_with = "deserialize_rank")]
    rank: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(default)]
    page_size: u32,
    #[serde(default)]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct CollectionsResponse {
    #[serde(default)]
    data: Vec<CollectionEntry>,
}

#[derive(Debug, Deserialize)]
struct CollectionEntry {
    attributes: CollectionAttributes,
}

#[derive(Debug, Deserialize)]
struct CollectionAttributes {
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    creator: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct BlueMoveClient {
    http: Client,
    api_url: String,
    page_size: u32,
}

impl BlueMoveClient {
    pub fn new(api_url: &str, page_size: u32, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for BlueMove")?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
        })
    }

    fn to_listing(item: MarketItem) -> Option<Listing> {
        let attrs = item.attributes;
        let Some(price) = attrs.price else {
            debug!(id = item.id, token = %attrs.name, "Skipping BlueMove item without a usable price");
            return None;
        };
        let updated_at = attrs.updated_at.unwrap_or_default();
        Some(Listing {
            key: format!("{}@{}", item.id, updated_at),
            marketplace: MARKETPLACE,
            token_id: item.id.to_string(),
            token_name: attrs.name,
            seller: None,
            price,
            preview_uri: attrs.uri_media.unwrap_or_default(),
            rank: attrs.rank,
        })
    }

    fn parse_items(resp: MarketItemsResponse) -> Vec<Listing> {
        resp.data.into_iter().filter_map(Self::to_listing).collect()
    }

    fn find_collection(
        resp: CollectionsResponse,
        slug: &str,
    ) -> Result<CollectionInfo, MarketplaceError> {
        resp.data
            .into_iter()
            .map(|c| c.attributes)
            .find(|c| c.slug == slug)
            .map(|c| CollectionInfo {
                name: c.name,
                id: c.slug,
                creator: c.creator,
            })
            .ok_or_else(|| MarketplaceError::CollectionNotFound {
                marketplace: MARKETPLACE,
                slug: slug.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// MarketplaceAdapter trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl MarketplaceAdapter for BlueMoveClient {
    fn marketplace(&self) -> Marketplace {
        MARKETPLACE
    }

    async fn resolve_collection(&self, slug: &str) -> Result<CollectionInfo, MarketplaceError> {
        let request = self.http.get(format!("{}/collections", self.api_url)).query(&[
            ("sort[0]", "total_volume:desc"),
            ("pagination[page]", "1"),
            ("pagination[pageSize]", COLLECTION_PAGE_SIZE),
        ]);

        let resp: CollectionsResponse = get_json(MARKETPLACE, request).await?;
        debug!(collections = resp.data.len(), "BlueMove collections fetched");
        Self::find_collection(resp, slug)
    }

    async fn fetch_listings(
        &self,
        collection: &CollectionInfo,
        threshold: Octas,
    ) -> Result<Vec<Listing>, MarketplaceError> {
        let max_price = threshold.as_u64().to_string();
        let page_size = self.page_size.to_string();
        let request = self
            .http
            .get(format!("{}/market-items", self.api_url))
            .query(&[
                ("filters[collection][slug][$eq]", collection.id.as_str()),
                ("filters[status][$eq]", "1"),
                ("filters[price][$gte]", "0"),
                ("filters[price][$lte]", max_price.as_str()),
                ("sort[0]", "price:asc"),
                ("pagination[page]", "1"),
                ("pagination[pageSize]", page_size.as_str()),
            ]);

        let resp: MarketItemsResponse = get_json(MARKETPLACE, request).await?;
        if let Some(meta) = &resp.meta {
            debug!(
                page_size = meta.pagination.page_size,
                total = meta.pagination.total,
                "BlueMove page fetched"
            );
        }

        Ok(Self::parse_items(resp))
    }

    fn build_payload(&self, listing: &Listing, collection: &CollectionInfo) -> EntryFunctionPayload {
        let price = u128::from(listing.price.as_u64()) * BATCH_BUY_PRICE_SCALE;
        EntryFunctionPayload::new(
            BUY_FUNCTION,
            Vec::new(),
            vec![
                json!([collection.creator]),
                json!([collection.name]),
                json!([listing.token_name]),
                json!([price.to_string()]),
            ],
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
