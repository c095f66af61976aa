use async_trait::async_trait;
use discovery_models::{FilterSet, Item, Page};

use crate::error::ApiResult;

/// Remote, page-numbered catalog listing.
///
/// Implementations must be idempotent for the same `(filters, page)` pair and
/// treat page numbers as 1-based. Every expected failure comes back as an
/// `ApiErrorKind`; nothing panics on network or payload problems.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    // Source metadata
    fn source_name(&self) -> &str;

    async fn fetch_page(&self, filters: &FilterSet, page: u32) -> ApiResult<Page<Item>>;
}
