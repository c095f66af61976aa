use async_trait::async_trait;
use bincode::{deserialize, serialize};
use discovery_models::{InterestStatus, ItemType, VisitedRecord};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreResult;

/// Per-item interest recorded from swipes, keyed by `(item_id, item_type)`
#[async_trait]
pub trait VisitedLedger: Send + Sync {
    /// Insert or overwrite the status for an item
    async fn record_interest(&self, item_id: u64, item_type: ItemType, status: InterestStatus) -> StoreResult<()>;

    async fn get_interest(&self, item_id: u64, item_type: ItemType) -> StoreResult<Option<InterestStatus>>;

    /// True when the item was swiped with any status other than `InterestStatus::None`
    async fn is_visited(&self, item_id: u64, item_type: ItemType) -> StoreResult<bool> {
        Ok(self
            .get_interest(item_id, item_type)
            .await?
            .map_or(false, |status| status.hides_item()))
    }

    async fn records(&self) -> StoreResult<Vec<VisitedRecord>>;

    /// Forget every recorded swipe
    async fn reset(&self) -> StoreResult<()>;
}

type Rows = HashMap<(u64, ItemType), VisitedRecord>;

fn lock_rows(rows: &Mutex<Rows>) -> std::sync::MutexGuard<'_, Rows> {
    rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn sorted_records(rows: &Rows) -> Vec<VisitedRecord> {
    let mut records: Vec<VisitedRecord> = rows.values().cloned().collect();
    records.sort_by_key(|r| (r.item_id, r.item_type.as_str()));
    records
}

#[derive(Default)]
pub struct InMemoryLedger {
    rows: Mutex<Rows>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VisitedLedger for InMemoryLedger {
    async fn record_interest(&self, item_id: u64, item_type: ItemType, status: InterestStatus) -> StoreResult<()> {
        let record = VisitedRecord::new(item_id, item_type, status);
        lock_rows(&self.rows).insert(record.key(), record);
        Ok(())
    }

    async fn get_interest(&self, item_id: u64, item_type: ItemType) -> StoreResult<Option<InterestStatus>> {
        Ok(lock_rows(&self.rows)
            .get(&(item_id, item_type))
            .map(|r| r.interest_status))
    }

    async fn records(&self) -> StoreResult<Vec<VisitedRecord>> {
        Ok(sorted_records(&lock_rows(&self.rows)))
    }

    async fn reset(&self) -> StoreResult<()> {
        lock_rows(&self.rows).clear();
        Ok(())
    }
}

/// Ledger persisted as gzip-compressed bincode.
///
/// The whole table is rewritten on each change (temp file + rename); ledgers
/// stay small enough for that to be cheap.
pub struct FileLedger {
    path: PathBuf,
    rows: Mutex<Rows>,
}

impl FileLedger {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let rows = Self::load(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            rows: Mutex::new(rows),
        })
    }

    fn load(path: &Path) -> StoreResult<Rows> {
        if !path.exists() {
            debug!("Ledger file {:?} does not exist, starting empty", path);
            return Ok(Rows::new());
        }

        let start = std::time::Instant::now();
        let data = std::fs::read(path)?;

        let mut decoder = GzDecoder::new(&data[..]);
        let mut decoded = Vec::new();
        if let Err(e) = decoder.read_to_end(&mut decoded) {
            Self::backup_incompatible(path, &e.to_string());
            return Ok(Rows::new());
        }

        let records: Vec<VisitedRecord> = match deserialize(&decoded) {
            Ok(records) => records,
            Err(e) => {
                Self::backup_incompatible(path, &e.to_string());
                return Ok(Rows::new());
            }
        };

        info!("Loaded {} visited records in {:?}", records.len(), start.elapsed());
        Ok(records.into_iter().map(|r| (r.key(), r)).collect())
    }

    fn backup_incompatible(path: &Path, reason: &str) {
        let backup_path = path.with_extension("bin.bak");
        if let Err(backup_err) = std::fs::copy(path, &backup_path) {
            warn!(
                "Failed to back up incompatible ledger file: {}. Starting with empty ledger.",
                backup_err
            );
        } else {
            info!(
                "Ledger format incompatible (error: {}). Backed up old ledger to {:?} and starting empty.",
                reason, backup_path
            );
        }
    }

    fn persist(&self, rows: &Rows) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let serialized = serialize(&sorted_records(rows))?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&serialized)?;
        let encoded = encoder.finish()?;

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, encoded)?;
        std::fs::rename(&temp_path, &self.path)?;
        debug!("Saved ledger: {} records", rows.len());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl VisitedLedger for FileLedger {
    async fn record_interest(&self, item_id: u64, item_type: ItemType, status: InterestStatus) -> StoreResult<()> {
        let record = VisitedRecord::new(item_id, item_type, status);
        let mut rows = lock_rows(&self.rows);
        let previous = rows.insert(record.key(), record);

        if let Err(e) = self.persist(&rows) {
            match previous {
                Some(previous) => rows.insert(previous.key(), previous),
                None => rows.remove(&(item_id, item_type)),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn get_interest(&self, item_id: u64, item_type: ItemType) -> StoreResult<Option<InterestStatus>> {
        Ok(lock_rows(&self.rows)
            .get(&(item_id, item_type))
            .map(|r| r.interest_status))
    }

    async fn records(&self) -> StoreResult<Vec<VisitedRecord>> {
        Ok(sorted_records(&lock_rows(&self.rows)))
    }

    async fn reset(&self) -> StoreResult<()> {
        let mut rows = lock_rows(&self.rows);
        rows.clear();
        self.persist(&rows)?;
        info!("Visited ledger reset");
        Ok(())
    }
}
