pub mod filter;
pub mod item;
pub mod page;
pub mod status;
pub mod user;
pub mod watermark;

pub use filter::{ContentType, FilterSet, DEFAULT_SORT_KEY};
pub use item::{Item, ItemBase, ItemType, MovieItem, ShowItem};
pub use page::Page;
pub use status::{InterestStatus, VisitedRecord};
pub use user::CurrentUser;
pub use watermark::{Fingerprint, Watermark};
