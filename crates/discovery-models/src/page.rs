use serde::{Deserialize, Serialize};

/// One page of a remote, page-numbered list. Page numbers are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub total_items: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when nothing can follow this page
    pub fn is_last(&self) -> bool {
        self.items.is_empty() || self.page_number >= self.total_pages
    }
}
