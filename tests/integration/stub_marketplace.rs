//! In-memory marketplace for end-to-end tests.
//!
//! Each `fetch_listings` call pops the next scripted page; once the script
//! runs out every poll sees an empty page.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use mercury::chain::EntryFunctionPayload;
use mercury::marketplaces::MarketplaceAdapter;
use mercury::types::{CollectionInfo, Listing, Marketplace, MarketplaceError, Octas};

pub const STUB_BUY_FUNCTION: &str = "0x1::stub_market::buy";

/// One scripted answer to a listings fetch.
pub enum Page {
    Listings(Vec<Listing>),
    RateLimited,
}

pub struct StubMarketplace {
    pages: Mutex<VecDeque<Page>>,
    fetches: AtomicUsize,
}

impl StubMarketplace {
    pub fn new(pages: Vec<Page>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

pub fn collection() -> CollectionInfo {
    CollectionInfo {
        name: "Bruh Bears".into(),
        id: "bruh-bears".into(),
        creator: "0xc0ffee".into(),
    }
}

/// A listing priced in whole octas with dedup key `{token}@{updated}`.
pub fn listing(token: &str, updated: &str, price: u64) -> Listing {
    Listing {
        key: format!("{token}@{updated}"),
        marketplace: Marketplace::Topaz,
        token_id: token.to_string(),
        token_name: format!("Bruh Bear {token}"),
        seller: Some("0xseller".into()),
        price: Octas(price),
        preview_uri: String::new(),
        rank: None,
    }
}

#[async_trait]
impl MarketplaceAdapter for StubMarketplace {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Topaz
    }

    async fn resolve_collection(&self, slug: &str) -> Result<CollectionInfo, MarketplaceError> {
        if slug == collection().id {
            Ok(collection())
        } else {
            Err(MarketplaceError::CollectionNotFound {
                marketplace: Marketplace::Topaz,
                slug: slug.to_string(),
            })
        }
    }

    async fn fetch_listings(
        &self,
        _collection: &CollectionInfo,
        _threshold: Octas,
    ) -> Result<Vec<Listing>, MarketplaceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.pages.lock().unwrap().pop_front();
        match next {
            Some(Page::Listings(listings)) => Ok(listings),
            Some(Page::RateLimited) => Err(MarketplaceError::RateLimited {
                marketplace: Marketplace::Topaz,
            }),
            None => Ok(Vec::new()),
        }
    }

    fn build_payload(&self, listing: &Listing, collection: &CollectionInfo) -> EntryFunctionPayload {
        EntryFunctionPayload::new(
            STUB_BUY_FUNCTION,
            Vec::new(),
            vec![
                json!(collection.creator),
                json!(listing.token_name),
                json!(listing.price.as_u64().to_string()),
            ],
        )
    }
}
