use async_trait::async_trait;
use chrono::Utc;
use discovery_models::{Fingerprint, Watermark};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreResult;

/// Resume cache: highest page fetched per filter fingerprint.
///
/// `upsert_if_higher` is a single compare-and-swap; a stored value never
/// regresses, even with concurrent callers for the same fingerprint.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get_watermark(&self, fingerprint: &Fingerprint) -> StoreResult<Option<Watermark>>;

    async fn get_max_page(&self, fingerprint: &Fingerprint) -> StoreResult<Option<u32>> {
        Ok(self.get_watermark(fingerprint).await?.map(|w| w.max_page_seen))
    }

    /// Store `page` unless an equal or higher page is already recorded.
    /// Returns whether the stored value changed.
    async fn upsert_if_higher(&self, fingerprint: &Fingerprint, page: u32) -> StoreResult<bool>;

    async fn delete_watermark(&self, fingerprint: &Fingerprint) -> StoreResult<()>;
}

type Rows = HashMap<Fingerprint, Watermark>;

fn lock_rows(rows: &Mutex<Rows>) -> std::sync::MutexGuard<'_, Rows> {
    rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Apply the conditional upsert; returns the previous row when something changed
fn apply_upsert(rows: &mut Rows, fingerprint: &Fingerprint, page: u32) -> Option<Option<Watermark>> {
    if let Some(existing) = rows.get(fingerprint) {
        if existing.max_page_seen >= page {
            return None;
        }
    }

    let previous = rows.insert(
        fingerprint.clone(),
        Watermark {
            fingerprint: fingerprint.clone(),
            max_page_seen: page,
            updated_at: Utc::now(),
        },
    );
    Some(previous)
}

#[derive(Default)]
pub struct InMemoryWatermarkStore {
    rows: Mutex<Rows>,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn get_watermark(&self, fingerprint: &Fingerprint) -> StoreResult<Option<Watermark>> {
        Ok(lock_rows(&self.rows).get(fingerprint).cloned())
    }

    async fn upsert_if_higher(&self, fingerprint: &Fingerprint, page: u32) -> StoreResult<bool> {
        Ok(apply_upsert(&mut lock_rows(&self.rows), fingerprint, page).is_some())
    }

    async fn delete_watermark(&self, fingerprint: &Fingerprint) -> StoreResult<()> {
        lock_rows(&self.rows).remove(fingerprint);
        Ok(())
    }
}

/// JSON-file backed watermark store.
///
/// Rows live in memory behind one lock; every change is written through with
/// a temp-file + rename so a crash never leaves a half-written file.
pub struct FileWatermarkStore {
    path: PathBuf,
    rows: Mutex<Rows>,
}

impl FileWatermarkStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let rows = Self::load(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            rows: Mutex::new(rows),
        })
    }

    fn load(path: &Path) -> StoreResult<Rows> {
        if !path.exists() {
            debug!("Watermark file {:?} does not exist, starting empty", path);
            return Ok(Rows::new());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Vec<Watermark>>(&content) {
            Ok(entries) => {
                info!("Loaded {} watermarks from {:?}", entries.len(), path);
                Ok(entries.into_iter().map(|w| (w.fingerprint.clone(), w)).collect())
            }
            Err(e) => {
                let backup_path = path.with_extension("json.bak");
                warn!(
                    "Watermark file corrupted ({}). Backing up to {:?} and starting empty.",
                    e, backup_path
                );
                if let Err(backup_err) = std::fs::rename(path, &backup_path) {
                    warn!("Failed to back up corrupted watermark file: {}", backup_err);
                }
                Ok(Rows::new())
            }
        }
    }

    fn persist(&self, rows: &Rows) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries: Vec<&Watermark> = rows.values().collect();
        entries.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        let json = serde_json::to_string_pretty(&entries)?;

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path)?;
        debug!("Saved {} watermarks", entries.len());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn get_watermark(&self, fingerprint: &Fingerprint) -> StoreResult<Option<Watermark>> {
        Ok(lock_rows(&self.rows).get(fingerprint).cloned())
    }

    async fn upsert_if_higher(&self, fingerprint: &Fingerprint, page: u32) -> StoreResult<bool> {
        let mut rows = lock_rows(&self.rows);
        let Some(previous) = apply_upsert(&mut rows, fingerprint, page) else {
            return Ok(false);
        };

        if let Err(e) = self.persist(&rows) {
            // Keep memory and disk in agreement
            match previous {
                Some(previous) => rows.insert(fingerprint.clone(), previous),
                None => rows.remove(fingerprint),
            };
            return Err(e);
        }
        Ok(true)
    }

    async fn delete_watermark(&self, fingerprint: &Fingerprint) -> StoreResult<()> {
        let mut rows = lock_rows(&self.rows);
        if rows.remove(fingerprint).is_some() {
            self.persist(&rows)?;
            info!("Deleted watermark {}", fingerprint.short());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fp(name: &str) -> Fingerprint {
        Fingerprint::new(name)
    }

    #[tokio::test]
    async fn test_upsert_never_regresses() {
        let store = InMemoryWatermarkStore::new();
        assert!(store.upsert_if_higher(&fp("f"), 2).await.unwrap());
        assert!(!store.upsert_if_higher(&fp("f"), 1).await.unwrap());
        assert!(!store.upsert_if_higher(&fp("f"), 2).await.unwrap());
        assert_eq!(store.get_max_page(&fp("f")).await.unwrap(), Some(2));

        assert!(store.upsert_if_higher(&fp("f"), 5).await.unwrap());
        assert_eq!(store.get_max_page(&fp("f")).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_fingerprints_are_independent() {
        let store = InMemoryWatermarkStore::new();
        store.upsert_if_higher(&fp("a"), 3).await.unwrap();
        assert_eq!(store.get_max_page(&fp("b")).await.unwrap(), None);

        store.delete_watermark(&fp("a")).await.unwrap();
        assert_eq!(store.get_max_page(&fp("a")).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_keep_the_maximum() {
        let store = Arc::new(InMemoryWatermarkStore::new());
        let mut handles = Vec::new();
        for page in (1..=50u32).rev() {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.upsert_if_higher(&fp("shared"), page).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get_max_page(&fp("shared")).await.unwrap(), Some(50));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("watermarks.json");

        let store = FileWatermarkStore::open(&path).unwrap();
        store.upsert_if_higher(&fp("f"), 2).await.unwrap();
        store.upsert_if_higher(&fp("f"), 1).await.unwrap();
        store.upsert_if_higher(&fp("g"), 7).await.unwrap();
        drop(store);

        let reopened = FileWatermarkStore::open(&path).unwrap();
        assert_eq!(reopened.get_max_page(&fp("f")).await.unwrap(), Some(2));
        assert_eq!(reopened.get_max_page(&fp("g")).await.unwrap(), Some(7));

        reopened.delete_watermark(&fp("g")).await.unwrap();
        let reopened = FileWatermarkStore::open(&path).unwrap();
        assert_eq!(reopened.get_max_page(&fp("g")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupted_file_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermarks.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FileWatermarkStore::open(&path).unwrap();
        assert_eq!(store.get_max_page(&fp("f")).await.unwrap(), None);
        assert!(dir.path().join("watermarks.json.bak").exists());

        store.upsert_if_higher(&fp("f"), 1).await.unwrap();
        assert_eq!(store.get_max_page(&fp("f")).await.unwrap(), Some(1));
    }
}
