use anyhow::Result;
use async_trait::async_trait;
use discovery_config::{Config, CredentialStore, DiscoveryOptions, PathManager, ResumeMode};
use discovery_models::{CurrentUser, FilterSet, Fingerprint, InterestStatus, Item, Watermark};
use discovery_sources::{PageFetcher, TmdbClient};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::StoreResult;
use crate::filter::retain_unvisited;
use crate::fingerprint::fingerprint;
use crate::ledger::{FileLedger, VisitedLedger};
use crate::pager::{Cursor, LoadParams, LoadResult, LoadedPage, PagerConfig, PagingSource, PagingState};
use crate::watermark::{FileWatermarkStore, WatermarkStore};

/// Page source for one discover session: fetch, hide swiped items, record progress.
///
/// The fingerprint is computed once and reused for every page of the session.
pub struct DiscoverySource {
    fetcher: Arc<dyn PageFetcher>,
    watermarks: Arc<dyn WatermarkStore>,
    ledger: Arc<dyn VisitedLedger>,
    filters: FilterSet,
    fingerprint: Fingerprint,
    resume_mode: ResumeMode,
    hide_visited: bool,
}

impl DiscoverySource {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }
}

#[async_trait]
impl PagingSource<Item> for DiscoverySource {
    async fn load(&self, params: LoadParams) -> LoadResult<Item> {
        let page = self.fetcher.fetch_page(&self.filters, params.key).await?;
        let mut loaded = LoadedPage::from_page(page);
        if self.hide_visited {
            loaded.items = retain_unvisited(self.ledger.as_ref(), loaded.items).await;
        }
        Ok(loaded)
    }

    async fn refresh_key(&self, state: &PagingState<Item>) -> Option<u32> {
        if let Some(key) = state
            .anchor_position
            .and_then(|anchor| state.page_key_for_position(anchor))
        {
            return Some(key);
        }

        if self.resume_mode != ResumeMode::Watermark {
            return None;
        }
        match self.watermarks.get_max_page(&self.fingerprint).await {
            Ok(page) => {
                if let Some(page) = page {
                    debug!("Resuming {} at page {}", self.fingerprint.short(), page);
                }
                page
            }
            Err(e) => {
                warn!("Could not read watermark for {}: {}", self.fingerprint.short(), e);
                None
            }
        }
    }

    async fn on_page_loaded(&self, page: &LoadedPage<Item>) {
        if let Err(e) = self
            .watermarks
            .upsert_if_higher(&self.fingerprint, page.page_number)
            .await
        {
            warn!(
                "Failed to record page {} for {}: {}",
                page.page_number,
                self.fingerprint.short(),
                e
            );
        }
    }
}

/// Entry point for discovery: hands out cursors and records swipes.
///
/// Collaborators are injected; [`DiscoveryRepository::from_config`] is the
/// composition boundary that builds the production ones.
pub struct DiscoveryRepository {
    fetcher: Arc<dyn PageFetcher>,
    watermarks: Arc<dyn WatermarkStore>,
    ledger: Arc<dyn VisitedLedger>,
    options: DiscoveryOptions,
}

impl DiscoveryRepository {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        watermarks: Arc<dyn WatermarkStore>,
        ledger: Arc<dyn VisitedLedger>,
        options: DiscoveryOptions,
    ) -> Self {
        Self {
            fetcher,
            watermarks,
            ledger,
            options,
        }
    }

    /// Build the TMDB client and file-backed stores described by `config`.
    ///
    /// Without an explicit `user`, the ledger is scoped to the uid last stored
    /// in the credentials file, if any.
    pub fn from_config(config: &Config, paths: &PathManager, user: Option<&CurrentUser>) -> Result<Self> {
        config.validate()?;
        paths.ensure_directories()?;

        let mut credentials = CredentialStore::new(paths.credentials_file());
        credentials.load()?;
        let token = config.tmdb.resolve_access_token(&credentials).ok_or_else(|| {
            anyhow::anyhow!(
                "No TMDB access token configured. Set {} or add tmdb_access_token to {:?}",
                discovery_config::TOKEN_ENV_VAR,
                paths.credentials_file()
            )
        })?;

        let stored_user = match user {
            Some(_) => None,
            None => credentials.get_current_user_id().map(|uid| CurrentUser::new(uid.as_str())),
        };
        let user = user.or(stored_user.as_ref());

        let fetcher = TmdbClient::new(&config.tmdb, token);
        let watermarks = FileWatermarkStore::open(&paths.watermarks_file())?;
        let ledger = FileLedger::open(&paths.ledger_file(user))?;

        info!(
            "Discovery repository ready (source: {}, ledger: {:?})",
            fetcher.source_name(),
            ledger.path()
        );
        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(watermarks),
            Arc::new(ledger),
            config.discovery.clone(),
        ))
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Start a discover session. Nothing is fetched until the cursor is
    /// refreshed, read, or streamed.
    pub fn discover(&self, filters: FilterSet) -> Cursor<Item> {
        let fingerprint = fingerprint(&filters);
        debug!(
            "Discover {} with fingerprint {}",
            filters.content_type.as_str(),
            fingerprint.short()
        );

        let source = DiscoverySource {
            fetcher: Arc::clone(&self.fetcher),
            watermarks: Arc::clone(&self.watermarks),
            ledger: Arc::clone(&self.ledger),
            filters,
            fingerprint,
            resume_mode: self.options.resume_mode,
            hide_visited: self.options.hide_visited,
        };
        Cursor::new(Arc::new(source), PagerConfig::from(&self.options))
    }

    #[instrument(skip(self, item), fields(item_id = item.id(), item_type = item.item_type().as_str()))]
    pub async fn mark_interest(&self, item: &Item, status: InterestStatus) -> StoreResult<()> {
        self.ledger
            .record_interest(item.id(), item.item_type(), status)
            .await?;
        debug!("Recorded {:?}", status);
        Ok(())
    }

    pub async fn interest_of(&self, item: &Item) -> StoreResult<Option<InterestStatus>> {
        self.ledger.get_interest(item.id(), item.item_type()).await
    }

    pub async fn watermark_for(&self, filters: &FilterSet) -> StoreResult<Option<Watermark>> {
        self.watermarks.get_watermark(&fingerprint(filters)).await
    }

    /// Forget how far these filters were paged, so the next refresh starts at page 1
    pub async fn forget_progress(&self, filters: &FilterSet) -> StoreResult<()> {
        self.watermarks.delete_watermark(&fingerprint(filters)).await
    }

    pub async fn reset_ledger(&self) -> StoreResult<()> {
        self.ledger.reset().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::ledger::InMemoryLedger;
    use crate::pager::{CursorPhase, LoadOutcome};
    use crate::watermark::InMemoryWatermarkStore;
    use discovery_models::{ItemBase, MovieItem, Page};
    use discovery_sources::{ApiErrorKind, ApiResult};
    use std::sync::Mutex;

    /// 50 movies over 3 pages (20, 20, 10), ids starting at 1
    struct CatalogFetcher {
        calls: Mutex<Vec<u32>>,
        failure: Option<ApiErrorKind>,
    }

    impl CatalogFetcher {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failure: None,
            }
        }

        fn failing(kind: ApiErrorKind) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failure: Some(kind),
            }
        }

        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn movie(id: u64) -> Item {
        let base: ItemBase = serde_json::from_value(serde_json::json!({ "id": id })).unwrap();
        Item::Movie(MovieItem {
            base,
            original_title: Some(format!("Movie {}", id)),
            title: Some(format!("Movie {}", id)),
            release_date: None,
            is_video: Some(false),
        })
    }

    #[async_trait]
    impl PageFetcher for CatalogFetcher {
        fn source_name(&self) -> &str {
            "catalog"
        }

        async fn fetch_page(&self, _filters: &FilterSet, page: u32) -> ApiResult<Page<Item>> {
            self.calls.lock().unwrap().push(page);
            if let Some(kind) = self.failure {
                return Err(kind);
            }
            let first = (page as u64 - 1) * 20 + 1;
            let last = (page as u64 * 20).min(50);
            let items = if first > 50 { Vec::new() } else { (first..=last).map(movie).collect() };
            Ok(Page {
                items,
                page_number: page,
                total_items: 50,
                total_pages: 3,
            })
        }
    }

    struct BrokenWatermarks;

    fn broken() -> StoreError {
        StoreError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"))
    }

    #[async_trait]
    impl WatermarkStore for BrokenWatermarks {
        async fn get_watermark(&self, _: &Fingerprint) -> StoreResult<Option<Watermark>> {
            Err(broken())
        }

        async fn upsert_if_higher(&self, _: &Fingerprint, _: u32) -> StoreResult<bool> {
            Err(broken())
        }

        async fn delete_watermark(&self, _: &Fingerprint) -> StoreResult<()> {
            Err(broken())
        }
    }

    fn options(resume_mode: ResumeMode) -> DiscoveryOptions {
        DiscoveryOptions {
            retry_delay_ms: 0,
            resume_mode,
            ..DiscoveryOptions::default()
        }
    }

    fn repository(fetcher: Arc<CatalogFetcher>, resume_mode: ResumeMode) -> DiscoveryRepository {
        DiscoveryRepository::new(
            fetcher,
            Arc::new(InMemoryWatermarkStore::new()),
            Arc::new(InMemoryLedger::new()),
            options(resume_mode),
        )
    }

    fn filters() -> FilterSet {
        FilterSet::movies().with_genres([28, 12])
    }

    #[tokio::test]
    async fn test_first_page_records_watermark() {
        let fetcher = Arc::new(CatalogFetcher::new());
        let repo = repository(fetcher.clone(), ResumeMode::FirstPage);

        let cursor = repo.discover(filters());
        assert_eq!(cursor.refresh().await, LoadOutcome::Loaded { page: 1 });
        assert_eq!(cursor.len().await, 20);

        let watermark = repo.watermark_for(&filters()).await.unwrap().unwrap();
        assert_eq!(watermark.max_page_seen, 1);
        assert_eq!(watermark.fingerprint, fingerprint(&filters()));
        // Same filters in another order share the watermark
        let reordered = FilterSet::movies().with_genres([12, 28]);
        assert!(repo.watermark_for(&reordered).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_first_page_mode_restarts_at_page_one() {
        let fetcher = Arc::new(CatalogFetcher::new());
        let repo = repository(fetcher.clone(), ResumeMode::FirstPage);

        let cursor = repo.discover(filters());
        cursor.refresh().await;
        cursor.append().await;
        drop(cursor);

        let cursor = repo.discover(filters());
        assert_eq!(cursor.refresh().await, LoadOutcome::Loaded { page: 1 });
        assert_eq!(fetcher.calls(), vec![1, 2, 1]);
        assert_eq!(repo.watermark_for(&filters()).await.unwrap().unwrap().max_page_seen, 2);
    }

    #[tokio::test]
    async fn test_watermark_mode_resumes_at_highest_page() {
        let fetcher = Arc::new(CatalogFetcher::new());
        let repo = repository(fetcher.clone(), ResumeMode::Watermark);

        let cursor = repo.discover(filters());
        cursor.refresh().await;
        cursor.append().await;
        drop(cursor);

        let cursor = repo.discover(filters());
        assert_eq!(cursor.refresh().await, LoadOutcome::Loaded { page: 2 });
        assert_eq!(fetcher.calls(), vec![1, 2, 2]);

        // Other filters have no watermark yet
        let other = repo.discover(FilterSet::shows());
        assert_eq!(other.refresh().await, LoadOutcome::Loaded { page: 1 });

        repo.forget_progress(&filters()).await.unwrap();
        let cursor = repo.discover(filters());
        assert_eq!(cursor.refresh().await, LoadOutcome::Loaded { page: 1 });
    }

    #[tokio::test]
    async fn test_swiped_item_is_hidden_on_next_discover() {
        let fetcher = Arc::new(CatalogFetcher::new());
        let repo = repository(fetcher.clone(), ResumeMode::FirstPage);

        let cursor = repo.discover(filters());
        cursor.refresh().await;
        let seventh = cursor.get(6).await.unwrap();
        assert_eq!(seventh.id(), 7);

        repo.mark_interest(&seventh, InterestStatus::NotInterested).await.unwrap();
        assert_eq!(
            repo.interest_of(&seventh).await.unwrap(),
            Some(InterestStatus::NotInterested)
        );

        let cursor = repo.discover(filters());
        cursor.refresh().await;
        let ids: Vec<u64> = cursor.items().await.iter().map(|i| i.id()).collect();
        assert_eq!(ids.len(), 19);
        assert!(!ids.contains(&7));
        // Filtering a page does not end pagination
        assert_eq!(cursor.append().await, LoadOutcome::Loaded { page: 2 });

        repo.reset_ledger().await.unwrap();
        let cursor = repo.discover(filters());
        cursor.refresh().await;
        assert_eq!(cursor.len().await, 20);
    }

    #[tokio::test]
    async fn test_cleared_interest_shows_item_again() {
        let fetcher = Arc::new(CatalogFetcher::new());
        let repo = repository(fetcher, ResumeMode::FirstPage);

        repo.mark_interest(&movie(3), InterestStatus::Watched).await.unwrap();
        repo.mark_interest(&movie(3), InterestStatus::None).await.unwrap();

        let cursor = repo.discover(filters());
        cursor.refresh().await;
        assert_eq!(cursor.len().await, 20);
    }

    #[tokio::test]
    async fn test_failure_kind_reaches_the_consumer() {
        let fetcher = Arc::new(CatalogFetcher::failing(ApiErrorKind::InvalidApiKey));
        let repo = repository(fetcher.clone(), ResumeMode::FirstPage);

        let cursor = repo.discover(filters());
        assert_eq!(
            cursor.refresh().await,
            LoadOutcome::Failed(ApiErrorKind::InvalidApiKey)
        );
        assert_eq!(cursor.phase().await, CursorPhase::Failed(ApiErrorKind::InvalidApiKey));
        assert_eq!(fetcher.calls(), vec![1, 1, 1]);
        assert!(repo.watermark_for(&filters()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_failures_do_not_block_pages() {
        let fetcher = Arc::new(CatalogFetcher::new());
        let repo = DiscoveryRepository::new(
            fetcher,
            Arc::new(BrokenWatermarks),
            Arc::new(InMemoryLedger::new()),
            options(ResumeMode::Watermark),
        );

        let cursor = repo.discover(filters());
        assert_eq!(cursor.refresh().await, LoadOutcome::Loaded { page: 1 });
        assert!(repo.watermark_for(&filters()).await.is_err());
    }

    #[test]
    fn test_from_config_builds_file_stores() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::with_base(dir.path());
        let mut config = Config::default();
        config.tmdb.access_token = Some("token".to_string());

        let user = CurrentUser::new("user-1");
        let repo = DiscoveryRepository::from_config(&config, &paths, Some(&user)).unwrap();
        assert_eq!(repo.options().page_size, 20);
    }

    #[tokio::test]
    async fn test_from_config_uses_stored_user() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::with_base(dir.path());
        let mut credentials = CredentialStore::new(paths.credentials_file());
        credentials.set_tmdb_access_token("token".to_string());
        credentials.set_current_user_id("uid-7".to_string());
        credentials.save().unwrap();

        let repo = DiscoveryRepository::from_config(&Config::default(), &paths, None).unwrap();
        assert!(paths.cache_dir().is_dir());
        repo.mark_interest(&movie(3), InterestStatus::Interested).await.unwrap();

        let scoped = paths.ledger_file(Some(&CurrentUser::new("uid-7")));
        assert!(scoped.exists());
        assert!(!paths.ledger_file(None).exists());
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::with_base(dir.path());
        let mut config = Config::default();
        config.tmdb.access_token = Some("token".to_string());
        config.discovery.page_size = 0;

        assert!(DiscoveryRepository::from_config(&config, &paths, None).is_err());
    }
}
