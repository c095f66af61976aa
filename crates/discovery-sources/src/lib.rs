pub mod decode;
pub mod error;
pub mod tmdb;
pub mod traits;

pub use decode::{decode_item, decode_page, decode_page_bytes};
pub use error::{ApiErrorKind, ApiResult};
pub use tmdb::TmdbClient;
pub use traits::PageFetcher;
