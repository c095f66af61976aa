pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod ledger;
pub mod logging;
pub mod pager;
pub mod repository;
pub mod watermark;

pub use error::{StoreError, StoreResult};
pub use filter::retain_unvisited;
pub use fingerprint::{canonical_form, fingerprint};
pub use ledger::{FileLedger, InMemoryLedger, VisitedLedger};
pub use logging::init_logging;
pub use pager::{
    Cursor, CursorEvent, CursorPhase, LoadDirection, LoadOutcome, LoadParams, LoadResult, LoadState, LoadStates,
    LoadedPage, PagerConfig, PagingSource, PagingState,
};
pub use repository::{DiscoveryRepository, DiscoverySource};
pub use watermark::{FileWatermarkStore, InMemoryWatermarkStore, WatermarkStore};
