//! Cursor pagination over a page-numbered remote list.
//!
//! A [`Cursor`] keeps a window of loaded pages and extends it forward
//! (append) or backward (prepend) as the consumer reads. Each load runs as
//! its own tokio task; at most one task exists per direction and later
//! requests for that direction await the same shared result.
//!
//! `refresh()` and `close()` bump or end the cursor's generation. A load
//! that finishes for an old generation is dropped without touching the
//! window and without calling [`PagingSource::on_page_loaded`].

use async_trait::async_trait;
use discovery_config::DiscoveryOptions;
use discovery_models::Page;
use discovery_sources::{ApiErrorKind, ApiResult};
use futures::future::{join_all, BoxFuture, Shared};
use futures::{FutureExt, Stream};
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_PREFETCH_DISTANCE: usize = 5;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct PagerConfig {
    pub page_size: u32,
    /// Start loading a neighbour page once a read is this close to the window edge
    pub prefetch_distance: usize,
    /// Total calls per page, first attempt included
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// When false, kinds classified as permanent fail on the first attempt
    pub retry_permanent_errors: bool,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            prefetch_distance: DEFAULT_PREFETCH_DISTANCE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(500),
            retry_permanent_errors: true,
        }
    }
}

impl From<&DiscoveryOptions> for PagerConfig {
    fn from(options: &DiscoveryOptions) -> Self {
        Self {
            page_size: options.page_size.max(1),
            prefetch_distance: options.prefetch_distance as usize,
            max_attempts: options.max_attempts.max(1),
            retry_delay: Duration::from_millis(options.retry_delay_ms),
            retry_permanent_errors: options.retry_permanent_errors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadDirection {
    Refresh,
    Append,
    Prepend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadParams {
    pub key: u32,
    pub page_size: u32,
    pub direction: LoadDirection,
}

/// A page inside the cursor window, with the keys of its neighbours
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub prev_key: Option<u32>,
    pub next_key: Option<u32>,
    pub total_items: u32,
    pub total_pages: u32,
}

impl<T> LoadedPage<T> {
    /// Derive neighbour keys from the raw remote page.
    ///
    /// Keys come from the page as fetched, so items removed afterwards
    /// (already-visited filtering) never end pagination early.
    pub fn from_page(page: Page<T>) -> Self {
        let prev_key = prev_key_for(page.page_number);
        let next_key = next_key_for(&page);
        Self {
            items: page.items,
            page_number: page.page_number,
            prev_key,
            next_key,
            total_items: page.total_items,
            total_pages: page.total_pages,
        }
    }
}

pub fn prev_key_for(page_number: u32) -> Option<u32> {
    if page_number <= 1 {
        None
    } else {
        Some(page_number - 1)
    }
}

pub fn next_key_for<T>(page: &Page<T>) -> Option<u32> {
    if page.is_last() {
        None
    } else {
        Some(page.page_number + 1)
    }
}

pub type LoadResult<T> = ApiResult<LoadedPage<T>>;

/// Snapshot handed to [`PagingSource::refresh_key`]
#[derive(Debug, Clone)]
pub struct PagingState<T> {
    pub pages: Vec<LoadedPage<T>>,
    pub anchor_position: Option<usize>,
    pub page_size: u32,
}

impl<T> PagingState<T> {
    /// Page number holding the item at `position` (flattened window index).
    ///
    /// Positions past the loaded window are projected with the fixed page size;
    /// a projection past `u32::MAX` yields `None`.
    pub fn page_key_for_position(&self, position: usize) -> Option<u32> {
        let first = self.pages.first()?;
        let mut offset = 0;
        for page in &self.pages {
            if position < offset + page.items.len() {
                return Some(page.page_number);
            }
            offset += page.items.len();
        }
        let page_size = self.page_size.max(1) as usize;
        let pages_ahead = u32::try_from(position / page_size).ok()?;
        first.page_number.checked_add(pages_ahead)
    }
}

/// Where a cursor gets its pages from
#[async_trait]
pub trait PagingSource<T>: Send + Sync + 'static {
    async fn load(&self, params: LoadParams) -> LoadResult<T>;

    /// Key to restart from on refresh; `None` means page 1
    async fn refresh_key(&self, state: &PagingState<T>) -> Option<u32>;

    /// Called once per page accepted into the window, before it becomes visible
    async fn on_page_loaded(&self, page: &LoadedPage<T>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPhase {
    Idle,
    Loading(u32),
    Loaded(u32),
    Failed(ApiErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoading { end_reached: bool },
    Loading,
    Error(ApiErrorKind),
}

impl Default for LoadState {
    fn default() -> Self {
        LoadState::NotLoading { end_reached: false }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStates {
    pub refresh: LoadState,
    pub append: LoadState,
    pub prepend: LoadState,
}

impl LoadStates {
    fn get(&self, direction: LoadDirection) -> LoadState {
        match direction {
            LoadDirection::Refresh => self.refresh,
            LoadDirection::Append => self.append,
            LoadDirection::Prepend => self.prepend,
        }
    }

    fn set(&mut self, direction: LoadDirection, state: LoadState) {
        match direction {
            LoadDirection::Refresh => self.refresh = state,
            LoadDirection::Append => self.append = state,
            LoadDirection::Prepend => self.prepend = state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { page: u32 },
    /// Nothing left in the requested direction
    EndReached,
    Failed(ApiErrorKind),
    /// The cursor was refreshed or closed while the load ran
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CursorEvent<T> {
    Page(LoadedPage<T>),
    Failed(ApiErrorKind),
}

type SharedLoad = Shared<BoxFuture<'static, LoadOutcome>>;

struct InFlight {
    id: u64,
    key: u32,
    future: SharedLoad,
    abort: AbortHandle,
}

type InFlightMap = HashMap<LoadDirection, InFlight>;

fn lock_in_flight(map: &std::sync::Mutex<InFlightMap>) -> std::sync::MutexGuard<'_, InFlightMap> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn abort_all(map: &mut InFlightMap) {
    for (direction, load) in map.drain() {
        debug!("Aborting {:?} load of page {}", direction, load.key);
        load.abort.abort();
    }
}

struct Window<T> {
    pages: VecDeque<LoadedPage<T>>,
    generation: u64,
    closed: bool,
    anchor: Option<usize>,
    phase: CursorPhase,
    states: LoadStates,
    failed_keys: HashMap<LoadDirection, u32>,
}

impl<T: Clone> Window<T> {
    fn new() -> Self {
        Self {
            pages: VecDeque::new(),
            generation: 0,
            closed: false,
            anchor: None,
            phase: CursorPhase::Idle,
            states: LoadStates::default(),
            failed_keys: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.pages.iter().map(|p| p.items.len()).sum()
    }

    fn item_at(&self, mut index: usize) -> Option<&T> {
        for page in &self.pages {
            if index < page.items.len() {
                return page.items.get(index);
            }
            index -= page.items.len();
        }
        None
    }

    fn borders(&self, direction: LoadDirection, page_number: u32) -> bool {
        match direction {
            LoadDirection::Refresh => true,
            LoadDirection::Append => self.pages.back().and_then(|p| p.next_key) == Some(page_number),
            LoadDirection::Prepend => self.pages.front().and_then(|p| p.prev_key) == Some(page_number),
        }
    }

    fn accept(&mut self, direction: LoadDirection, page: LoadedPage<T>) {
        match direction {
            LoadDirection::Refresh => {
                self.pages.clear();
                self.anchor = None;
                self.pages.push_back(page);
            }
            LoadDirection::Append => self.pages.push_back(page),
            LoadDirection::Prepend => {
                let shift = page.items.len();
                self.anchor = self.anchor.map(|a| a.saturating_add(shift));
                self.pages.push_front(page);
            }
        }
    }

    fn snapshot(&self, page_size: u32) -> PagingState<T> {
        PagingState {
            pages: self.pages.iter().cloned().collect(),
            anchor_position: self.anchor,
            page_size,
        }
    }
}

/// State shared between a cursor and the load tasks it spawns
struct CursorCore<T> {
    source: Arc<dyn PagingSource<T>>,
    config: PagerConfig,
    window: Mutex<Window<T>>,
    in_flight: std::sync::Mutex<InFlightMap>,
    next_load_id: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> CursorCore<T> {
    /// Start (or join) the load for `direction`. Caller holds the window lock.
    fn start_load(self: &Arc<Self>, window: &mut Window<T>, direction: LoadDirection, key: u32) -> SharedLoad {
        let mut in_flight = lock_in_flight(&self.in_flight);
        if let Some(existing) = in_flight.get(&direction) {
            debug!("Joining in-flight {:?} load of page {}", direction, existing.key);
            return existing.future.clone();
        }

        let id = self.next_load_id.fetch_add(1, Ordering::Relaxed);
        let generation = window.generation;
        window.states.set(direction, LoadState::Loading);
        window.phase = CursorPhase::Loading(key);
        window.failed_keys.remove(&direction);

        let core = Arc::clone(self);
        let task = tokio::spawn(async move { core.run_load(direction, key, generation, id).await });
        let abort = task.abort_handle();

        let future = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => LoadOutcome::Cancelled,
                Err(e) => {
                    warn!("Load task for page {} failed: {}", key, e);
                    LoadOutcome::Failed(ApiErrorKind::Unknown)
                }
            }
        }
        .boxed()
        .shared();

        in_flight.insert(
            direction,
            InFlight {
                id,
                key,
                future: future.clone(),
                abort,
            },
        );
        future
    }

    async fn run_load(self: Arc<Self>, direction: LoadDirection, key: u32, generation: u64, id: u64) -> LoadOutcome {
        let params = LoadParams {
            key,
            page_size: self.config.page_size,
            direction,
        };
        let result = load_with_retry(self.source.as_ref(), &self.config, params).await;

        let mut window = self.window.lock().await;
        let outcome = if window.closed || window.generation != generation {
            debug!("Discarding stale {:?} load of page {}", direction, key);
            LoadOutcome::Cancelled
        } else {
            match result {
                Ok(page) if !window.borders(direction, page.page_number) => {
                    warn!("Page {} no longer borders the window, dropping it", page.page_number);
                    window.states.set(direction, LoadState::default());
                    LoadOutcome::Cancelled
                }
                Ok(page) => {
                    self.source.on_page_loaded(&page).await;
                    let page_number = page.page_number;
                    let prev_key = page.prev_key;
                    let next_key = page.next_key;
                    window.accept(direction, page);

                    match direction {
                        LoadDirection::Refresh => {
                            window.states = LoadStates {
                                refresh: LoadState::NotLoading { end_reached: false },
                                append: LoadState::NotLoading { end_reached: next_key.is_none() },
                                prepend: LoadState::NotLoading { end_reached: prev_key.is_none() },
                            };
                        }
                        LoadDirection::Append => {
                            window.states.append = LoadState::NotLoading { end_reached: next_key.is_none() };
                        }
                        LoadDirection::Prepend => {
                            window.states.prepend = LoadState::NotLoading { end_reached: prev_key.is_none() };
                        }
                    }
                    window.phase = CursorPhase::Loaded(page_number);
                    debug!("Loaded page {} ({:?})", page_number, direction);
                    LoadOutcome::Loaded { page: page_number }
                }
                Err(kind) => {
                    warn!("Loading page {} failed: {:?}", key, kind);
                    window.states.set(direction, LoadState::Error(kind));
                    window.phase = CursorPhase::Failed(kind);
                    window.failed_keys.insert(direction, key);
                    LoadOutcome::Failed(kind)
                }
            }
        };

        let mut in_flight = lock_in_flight(&self.in_flight);
        if in_flight.get(&direction).map(|load| load.id) == Some(id) {
            in_flight.remove(&direction);
        }
        outcome
    }
}

/// Call the source until it succeeds or the attempt budget is spent.
///
/// A successful page (empty or not) is never retried, and neither is a
/// payload that failed to decode.
async fn load_with_retry<T: 'static>(source: &dyn PagingSource<T>, config: &PagerConfig, params: LoadParams) -> LoadResult<T> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = match AssertUnwindSafe(source.load(params)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                warn!("Page source panicked while loading page {}", params.key);
                Err(ApiErrorKind::Unknown)
            }
        };

        let kind = match result {
            Ok(page) => return Ok(page),
            Err(kind) => kind,
        };

        let retriable = kind.is_retriable() && (config.retry_permanent_errors || !kind.is_permanent());
        if !retriable || attempt >= max_attempts {
            return Err(kind);
        }

        warn!(
            "Page {} failed with {:?} (attempt {}/{}), retrying",
            params.key, kind, attempt, max_attempts
        );
        tokio::time::sleep(config.retry_delay * attempt).await;
        attempt += 1;
    }
}

struct CursorHandle<T> {
    core: Arc<CursorCore<T>>,
}

impl<T> Drop for CursorHandle<T> {
    fn drop(&mut self) {
        if let Ok(mut window) = self.core.window.try_lock() {
            window.closed = true;
        }
        abort_all(&mut lock_in_flight(&self.core.in_flight));
    }
}

struct StreamState<T> {
    cursor: Cursor<T>,
    /// Lowest page number not yet emitted; `None` before the first page
    next: Option<u32>,
    done: bool,
}

/// Paginated view over a [`PagingSource`]. Clones share one window; dropping
/// the last clone cancels its loads.
pub struct Cursor<T> {
    handle: Arc<CursorHandle<T>>,
}

impl<T> Clone for Cursor<T> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Cursor<T> {
    pub fn new(source: Arc<dyn PagingSource<T>>, config: PagerConfig) -> Self {
        let core = CursorCore {
            source,
            config,
            window: Mutex::new(Window::new()),
            in_flight: std::sync::Mutex::new(HashMap::new()),
            next_load_id: AtomicU64::new(0),
        };
        Self {
            handle: Arc::new(CursorHandle { core: Arc::new(core) }),
        }
    }

    fn core(&self) -> &Arc<CursorCore<T>> {
        &self.handle.core
    }

    pub fn config(&self) -> &PagerConfig {
        &self.core().config
    }

    /// Drop the window and reload around the refresh key.
    pub async fn refresh(&self) -> LoadOutcome {
        let core = self.core();
        let snapshot = {
            let window = core.window.lock().await;
            if window.closed {
                return LoadOutcome::Cancelled;
            }
            window.snapshot(core.config.page_size)
        };
        let key = core.source.refresh_key(&snapshot).await.unwrap_or(1).max(1);

        let load = {
            let mut window = core.window.lock().await;
            if window.closed {
                return LoadOutcome::Cancelled;
            }
            window.generation += 1;
            abort_all(&mut lock_in_flight(&core.in_flight));
            window.pages.clear();
            window.anchor = None;
            window.states = LoadStates::default();
            window.failed_keys.clear();
            info!("Refreshing cursor at page {}", key);
            core.start_load(&mut window, LoadDirection::Refresh, key)
        };
        load.await
    }

    /// First load of an empty window; joins a refresh already running
    async fn load_initial(&self) -> LoadOutcome {
        let joined = {
            let window = self.core().window.lock().await;
            if window.closed {
                return LoadOutcome::Cancelled;
            }
            lock_in_flight(&self.core().in_flight)
                .get(&LoadDirection::Refresh)
                .map(|load| load.future.clone())
        };
        match joined {
            Some(future) => future.await,
            None => self.refresh().await,
        }
    }

    pub async fn append(&self) -> LoadOutcome {
        self.extend(LoadDirection::Append).await
    }

    pub async fn prepend(&self) -> LoadOutcome {
        self.extend(LoadDirection::Prepend).await
    }

    async fn extend(&self, direction: LoadDirection) -> LoadOutcome {
        let core = self.core();
        let load = {
            let mut window = core.window.lock().await;
            if window.closed {
                return LoadOutcome::Cancelled;
            }
            if window.pages.is_empty() {
                drop(window);
                return self.load_initial().await;
            }

            let edge_key = match direction {
                LoadDirection::Prepend => window.pages.front().and_then(|p| p.prev_key),
                _ => window.pages.back().and_then(|p| p.next_key),
            };
            let joined = lock_in_flight(&core.in_flight)
                .get(&direction)
                .map(|load| load.future.clone());
            match (joined, edge_key) {
                (Some(future), _) => future,
                (None, None) => return LoadOutcome::EndReached,
                (None, Some(key)) => core.start_load(&mut window, direction, key),
            }
        };
        load.await
    }

    /// Re-run every direction whose last load failed
    pub async fn retry(&self) -> Vec<(LoadDirection, LoadOutcome)> {
        let core = self.core();
        let loads: Vec<(LoadDirection, SharedLoad)> = {
            let mut window = core.window.lock().await;
            if window.closed {
                return Vec::new();
            }
            let failed: Vec<(LoadDirection, u32)> = [LoadDirection::Refresh, LoadDirection::Append, LoadDirection::Prepend]
                .into_iter()
                .filter(|d| matches!(window.states.get(*d), LoadState::Error(_)))
                .filter_map(|d| window.failed_keys.get(&d).map(|key| (d, *key)))
                .collect();
            failed
                .into_iter()
                .map(|(direction, key)| (direction, core.start_load(&mut window, direction, key)))
                .collect()
        };

        let directions: Vec<LoadDirection> = loads.iter().map(|(d, _)| *d).collect();
        let outcomes = join_all(loads.into_iter().map(|(_, future)| future)).await;
        directions.into_iter().zip(outcomes).collect()
    }

    /// Read the item at `index` and prefetch neighbours near either edge.
    pub async fn get(&self, index: usize) -> Option<T> {
        let core = self.core();
        let mut window = core.window.lock().await;
        if window.closed {
            return None;
        }
        let len = window.len();
        if len > 0 {
            // Reads past the window anchor on its last item
            window.anchor = Some(index.min(len - 1));
        }
        let item = window.item_at(index).cloned();

        let distance = core.config.prefetch_distance;
        if index.saturating_add(distance) >= window.len() {
            let next_key = window.pages.back().and_then(|p| p.next_key);
            if let Some(key) = next_key {
                if !matches!(window.states.append, LoadState::Error(_)) {
                    drop(core.start_load(&mut window, LoadDirection::Append, key));
                }
            }
        }
        if index < distance {
            let prev_key = window.pages.front().and_then(|p| p.prev_key);
            if let Some(key) = prev_key {
                if !matches!(window.states.prepend, LoadState::Error(_)) {
                    drop(core.start_load(&mut window, LoadDirection::Prepend, key));
                }
            }
        }
        item
    }

    pub async fn items(&self) -> Vec<T> {
        let window = self.core().window.lock().await;
        window.pages.iter().flat_map(|p| p.items.iter().cloned()).collect()
    }

    pub async fn pages(&self) -> Vec<LoadedPage<T>> {
        let window = self.core().window.lock().await;
        window.pages.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.core().window.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn phase(&self) -> CursorPhase {
        self.core().window.lock().await.phase
    }

    pub async fn load_states(&self) -> LoadStates {
        self.core().window.lock().await.states
    }

    /// Cancel every in-flight load and stop accepting pages
    pub async fn close(&self) {
        let core = self.core();
        let mut window = core.window.lock().await;
        if window.closed {
            return;
        }
        window.closed = true;
        abort_all(&mut lock_in_flight(&core.in_flight));
        info!("Cursor closed with {} pages loaded", window.pages.len());
    }

    pub async fn is_closed(&self) -> bool {
        self.core().window.lock().await.closed
    }

    /// Pages from the front of the window onward, in increasing page order.
    ///
    /// Loads the first page if the window is empty and appends as needed.
    /// Ends after the last page, on the first failure, or when the cursor
    /// is refreshed away or closed.
    pub fn stream(&self) -> impl Stream<Item = CursorEvent<T>> + Send + 'static {
        let state = StreamState {
            cursor: self.clone(),
            next: None,
            done: false,
        };

        futures::stream::unfold(state, |mut state| async move {
            loop {
                if state.done {
                    return None;
                }

                let (found, empty) = {
                    let window = state.cursor.core().window.lock().await;
                    let found = match state.next {
                        None => window.pages.front().cloned(),
                        Some(next) => window.pages.iter().find(|p| p.page_number >= next).cloned(),
                    };
                    (found, window.pages.is_empty())
                };

                if let Some(page) = found {
                    match page.next_key {
                        Some(next) => state.next = Some(next),
                        None => state.done = true,
                    }
                    return Some((CursorEvent::Page(page), state));
                }

                let outcome = if empty && state.next.is_none() {
                    state.cursor.load_initial().await
                } else {
                    state.cursor.append().await
                };

                match outcome {
                    LoadOutcome::Loaded { .. } => continue,
                    LoadOutcome::Failed(kind) => {
                        state.done = true;
                        return Some((CursorEvent::Failed(kind), state));
                    }
                    LoadOutcome::EndReached | LoadOutcome::Cancelled => return None,
                }
            }
        })
    }
}
