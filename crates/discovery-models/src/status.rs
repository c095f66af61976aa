use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::ItemType;

/// Interest a user expressed for an item by swiping or marking it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InterestStatus {
    /// Swiped right
    Interested,
    /// Swiped up
    SuperInterested,
    /// Swiped left
    NotInterested,
    /// Marked as already seen
    Watched,
    /// Explicitly cleared; the item may be shown again
    None,
}

impl InterestStatus {
    /// Whether an item with this status should be hidden from discovery
    pub fn hides_item(&self) -> bool {
        !matches!(self, InterestStatus::None)
    }
}

/// One row of the visited-item ledger, unique per `(item_id, item_type)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitedRecord {
    pub item_id: u64,
    pub item_type: ItemType,
    pub interest_status: InterestStatus,
    pub updated_at: DateTime<Utc>,
}

impl VisitedRecord {
    pub fn new(item_id: u64, item_type: ItemType, interest_status: InterestStatus) -> Self {
        Self {
            item_id,
            item_type,
            interest_status,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> (u64, ItemType) {
        (self.item_id, self.item_type)
    }
}
