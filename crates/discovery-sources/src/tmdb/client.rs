use crate::error::{ApiErrorKind, ApiResult};
use crate::tmdb::api;
use crate::traits::PageFetcher;
use async_trait::async_trait;
use discovery_config::TmdbConfig;
use discovery_models::{FilterSet, Item, Page};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Create the shared HTTP client used for catalog requests
pub fn create_tmdb_client(timeout: Duration) -> Client {
    Client::builder()
        .user_agent(concat!("reelswipe/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[derive(Clone)]
pub struct TmdbClient {
    client: Arc<Client>,
    base_url: String,
    access_token: String,
    language: String,
    watch_region: String,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig, access_token: String) -> Self {
        Self {
            client: Arc::new(create_tmdb_client(Duration::from_secs(config.timeout_seconds))),
            base_url: config.base_url.clone(),
            access_token,
            language: config.language.clone(),
            watch_region: config.watch_region.clone(),
        }
    }
}

#[async_trait]
impl PageFetcher for TmdbClient {
    fn source_name(&self) -> &str {
        "tmdb"
    }

    async fn fetch_page(&self, filters: &FilterSet, page: u32) -> ApiResult<Page<Item>> {
        if page == 0 {
            return Err(ApiErrorKind::InvalidPage);
        }

        let query = api::build_discover_query(filters, page, &self.language, &self.watch_region);
        debug!("Fetching {} page {}", filters.content_type.as_str(), page);

        api::discover(
            &self.client,
            &self.base_url,
            &self.access_token,
            filters.content_type,
            &query,
        )
        .await
    }
}
