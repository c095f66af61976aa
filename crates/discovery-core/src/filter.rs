use discovery_models::Item;
use tracing::{debug, warn};

use crate::ledger::VisitedLedger;

/// Drop items the user already swiped.
///
/// Ledger lookups are best-effort: an item whose status cannot be read is kept.
pub async fn retain_unvisited(ledger: &dyn VisitedLedger, items: Vec<Item>) -> Vec<Item> {
    let before = items.len();
    let mut kept = Vec::with_capacity(before);

    for item in items {
        match ledger.is_visited(item.id(), item.item_type()).await {
            Ok(true) => {}
            Ok(false) => kept.push(item),
            Err(e) => {
                warn!(
                    "Could not read visited status for {} {}: {}",
                    item.item_type().as_str(),
                    item.id(),
                    e
                );
                kept.push(item);
            }
        }
    }

    if kept.len() < before {
        debug!("Filtered {} visited items", before - kept.len());
    }
    kept
}
