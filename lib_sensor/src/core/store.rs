//! # Durable Store
//!
//! The history of readings lives in a single JSON snapshot on disk. Every
//! mutation rewrites the whole file: it is serialized to `<snapshot>.tmp`,
//! synced, then renamed over the snapshot, so the file on disk is always one
//! complete history or the previous one.
//!
//! ## Concurrency
//! Mutations (`append`, `clear`) hold the write side of a `tokio::sync::RwLock`
//! for their whole read-modify-write cycle, so two appends can never both start
//! from the same base snapshot. `read_all` holds the read side and may run
//! alongside other readers. The tokio lock is fair, so a steady stream of
//! appends does not starve readers.
//!
//! ## Corruption
//! A snapshot that does not deserialize is treated as an empty history. It is
//! logged and healed by the next successful write.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::core::reading::Reading;

/// Failures that reach the caller of `append` or `clear`.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The snapshot (or its temporary sibling) could not be read or written.
    #[error("snapshot I/O failed on {path}: {source}")]
    Io {
        /// File the operation was touching.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The history could not be encoded.
    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of reading the snapshot file.
enum Snapshot {
    Loaded(Vec<Reading>),
    Missing,
    Corrupt(serde_json::Error),
}

/// File-backed, timestamp-ordered history of readings.
#[derive(Debug)]
pub struct DurableStore {
    path: PathBuf,
    tmp_path: PathBuf,
    lock: RwLock<()>,
}

impl DurableStore {
    /// Opens the store at `path`, creating an empty snapshot if none exists.
    ///
    /// An existing snapshot that fails to parse is reset to an empty history
    /// here, so the file is valid before any other operation runs.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let store = Self {
            tmp_path: PathBuf::from(tmp_name),
            path,
            lock: RwLock::new(()),
        };

        if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }

        let _guard = store.lock.write().await;
        match store.load().await? {
            Snapshot::Loaded(history) => {
                log::info!("Opened history at {} ({} readings)", store.path.display(), history.len());
            }
            Snapshot::Missing => {
                log::info!("No history at {}. Creating an empty snapshot.", store.path.display());
                store.persist(&[]).await?;
            }
            Snapshot::Corrupt(e) => {
                log::error!("History at {} is corrupted ({}). Reinitializing.", store.path.display(), e);
                store.persist(&[]).await?;
            }
        }
        drop(_guard);

        Ok(store)
    }

    /// Adds `reading` to the history and rewrites the snapshot in timestamp order.
    pub async fn append(&self, reading: Reading) -> Result<(), StorageError> {
        let _guard = self.lock.write().await;

        let mut history = match self.load().await? {
            Snapshot::Loaded(history) => history,
            Snapshot::Missing => Vec::new(),
            Snapshot::Corrupt(e) => {
                log::error!("Error parsing existing history ({}). Resetting to empty.", e);
                Vec::new()
            }
        };

        history.push(reading);
        // Stable: equal timestamps keep their arrival order within this pass.
        history.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        self.persist(&history).await?;
        log::debug!("History saved ({} readings, sorted)", history.len());
        Ok(())
    }

    /// Returns the full history. Read failures degrade to an empty history.
    pub async fn read_all(&self) -> Vec<Reading> {
        let _guard = self.lock.read().await;

        match self.load().await {
            Ok(Snapshot::Loaded(history)) => history,
            Ok(Snapshot::Missing) => {
                log::warn!("History file {} is missing. Serving empty history.", self.path.display());
                Vec::new()
            }
            Ok(Snapshot::Corrupt(e)) => {
                log::error!("History file {} is corrupted ({}). Serving empty history.", self.path.display(), e);
                Vec::new()
            }
            Err(e) => {
                log::error!("Error reading history: {}. Serving empty history.", e);
                Vec::new()
            }
        }
    }

    /// Number of readings currently persisted.
    pub async fn len(&self) -> usize {
        self.read_all().await.len()
    }

    /// Replaces the history with an empty one.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.write().await;
        self.persist(&[]).await?;
        log::info!("History at {} cleared.", self.path.display());
        Ok(())
    }

    // Caller must hold the lock.
    async fn load(&self) -> Result<Snapshot, StorageError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::Missing),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        Ok(match serde_json::from_slice::<Vec<Reading>>(&bytes) {
            Ok(history) => Snapshot::Loaded(history),
            Err(e) => Snapshot::Corrupt(e),
        })
    }

    // Caller must hold the write lock.
    async fn persist(&self, history: &[Reading]) -> Result<(), StorageError> {
        let body = serde_json::to_vec_pretty(history)?;

        let mut file = fs::File::create(&self.tmp_path)
            .await
            .map_err(|e| StorageError::io(&self.tmp_path, e))?;
        file.write_all(&body)
            .await
            .map_err(|e| StorageError::io(&self.tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::io(&self.tmp_path, e))?;
        drop(file);

        if let Err(e) = fs::rename(&self.tmp_path, &self.path).await {
            let _ = fs::remove_file(&self.tmp_path).await;
            return Err(StorageError::io(&self.path, e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn at(secs: i64) -> Reading {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Reading::new(secs as f64, 100.0 + secs as f64, base + Duration::seconds(secs))
    }

    #[tokio::test]
    async fn open_creates_an_empty_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let store = DurableStore::open(&path).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert!(store.read_all().await.is_empty());
    }

    #[tokio::test]
    async fn open_resets_a_corrupted_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = DurableStore::open(&path).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn open_keeps_an_existing_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, serde_json::to_string(&vec![at(1), at(2)]).unwrap()).unwrap();

        let store = DurableStore::open(&path).await.unwrap();

        assert_eq!(store.read_all().await, vec![at(1), at(2)]);
    }

    #[tokio::test]
    async fn read_all_is_sorted_regardless_of_submission_order() {
        let dir = tempdir().unwrap();
        let store = DurableStore::open(dir.path().join("data.json")).await.unwrap();

        for secs in [5, 1, 4, 2, 3, 0] {
            store.append(at(secs)).await.unwrap();
        }

        let history = store.read_all().await;
        assert_eq!(history.len(), 6);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(history.first(), Some(&at(0)));
        assert_eq!(history.last(), Some(&at(5)));
    }

    #[tokio::test]
    async fn identical_timestamps_are_both_kept() {
        let dir = tempdir().unwrap();
        let store = DurableStore::open(dir.path().join("data.json")).await.unwrap();

        let mut twin = at(1);
        twin.distance = 99.0;
        store.append(at(1)).await.unwrap();
        store.append(twin.clone()).await.unwrap();

        let history = store.read_all().await;
        assert_eq!(history, vec![at(1), twin]);
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_lose_updates() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DurableStore::open(dir.path().join("data.json")).await.unwrap());
        store.append(at(-1)).await.unwrap();
        let initial = store.len().await;

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.append(at(i % 7)).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.len().await, initial + 50);
    }

    #[tokio::test]
    async fn corrupted_snapshot_reads_empty_then_heals_on_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = DurableStore::open(&path).await.unwrap();
        store.append(at(1)).await.unwrap();

        std::fs::write(&path, "]]] definitely not a snapshot").unwrap();
        assert!(store.read_all().await.is_empty());

        store.append(at(2)).await.unwrap();
        let on_disk: Vec<Reading> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, vec![at(2)]);
    }

    #[tokio::test]
    async fn clear_empties_the_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = DurableStore::open(&path).await.unwrap();
        store.append(at(1)).await.unwrap();
        store.append(at(2)).await.unwrap();

        store.clear().await.unwrap();

        assert!(store.read_all().await.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn snapshot_is_pretty_printed_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = DurableStore::open(&path).await.unwrap();
        store.append(at(0)).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  {\n    \"distance\": 0.0,"));
        assert!(text.contains("\"timestamp\": \"2024-05-01T12:00:00.000Z\""));
        assert!(!dir.path().join("data.json.tmp").exists());
    }

    #[tokio::test]
    async fn unwritable_medium_fails_with_storage_error() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("gone");
        let store = DurableStore::open(sub.join("data.json")).await.unwrap();
        std::fs::remove_dir_all(&sub).unwrap();

        assert!(matches!(store.clear().await, Err(StorageError::Io { .. })));
        assert!(matches!(store.append(at(1)).await, Err(StorageError::Io { .. })));
    }

    #[tokio::test]
    async fn latest_four_digit_year_survives_a_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = DurableStore::open(&path).await.unwrap();

        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap() + Duration::milliseconds(999);
        store.append(at(0)).await.unwrap();
        store.append(Reading::new(2.0, 2.0, last)).await.unwrap();

        let reopened = DurableStore::open(&path).await.unwrap();
        let history = reopened.read_all().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].timestamp, last);
    }
}
