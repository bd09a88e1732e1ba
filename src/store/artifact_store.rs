//! In-memory registry of datasets and validation results.
//!
//! Two independent namespaces share the same handle scheme (random v4 UUIDs).
//! Entries are immutable once registered and leave the store only through
//! eviction: idle expiry, or least-recently-accessed displacement when a
//! namespace is full. An evicted handle is indistinguishable from one that
//! was never registered.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tempfile::{NamedTempFile, TempDir};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::ValidationResultDetail;
use super::tabular::{Dataset, TabularError};
use crate::server::metrics;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Dataset handle not found: {0}")]
    DatasetNotFound(String),

    #[error("Validation result not found: {0}")]
    ResultNotFound(String),

    #[error("Failed to materialize dataset {handle}: {source}")]
    Materialize {
        handle: String,
        #[source]
        source: TabularError,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::DatasetNotFound(_) | StoreError::ResultNotFound(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Idle time after which an entry expires. `None` keeps entries until displaced.
    pub handle_ttl: Option<Duration>,
    pub max_datasets: usize,
    pub max_results: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            handle_ttl: Some(Duration::from_secs(3600)),
            max_datasets: 100,
            max_results: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub datasets: usize,
    pub results: usize,
}

struct Entry<T> {
    value: Arc<T>,
    last_accessed: Instant,
}

/// One namespace. Not synchronized on its own; the store wraps it in a mutex.
struct Registry<T> {
    entries: HashMap<String, Entry<T>>,
    capacity: usize,
}

impl<T> Registry<T> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Stores `value` under a fresh handle. Returns the handle and any handles
    /// displaced to make room.
    fn insert(&mut self, value: T, now: Instant) -> (String, Vec<String>) {
        let mut evicted = Vec::new();
        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(handle, _)| handle.clone());
            match oldest {
                Some(handle) => {
                    self.entries.remove(&handle);
                    evicted.push(handle);
                }
                None => break,
            }
        }

        let mut handle = Uuid::new_v4().to_string();
        while self.entries.contains_key(&handle) {
            handle = Uuid::new_v4().to_string();
        }
        self.entries.insert(
            handle.clone(),
            Entry {
                value: Arc::new(value),
                last_accessed: now,
            },
        );
        (handle, evicted)
    }

    /// Looks up `handle`, refreshing its access time. Expired entries are
    /// dropped on the spot and reported as absent.
    fn get(&mut self, handle: &str, ttl: Option<Duration>, now: Instant) -> Option<Arc<T>> {
        let entry = self.entries.get_mut(handle)?;
        if !is_expired(entry.last_accessed, ttl, now) {
            entry.last_accessed = now;
            return Some(entry.value.clone());
        }
        self.entries.remove(handle);
        None
    }

    fn purge_expired(&mut self, ttl: Option<Duration>, now: Instant) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| is_expired(entry.last_accessed, ttl, now))
            .map(|(handle, _)| handle.clone())
            .collect();
        for handle in &expired {
            self.entries.remove(handle);
        }
        expired
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn is_expired(last_accessed: Instant, ttl: Option<Duration>, now: Instant) -> bool {
    match ttl {
        Some(ttl) => now.saturating_duration_since(last_accessed) > ttl,
        None => false,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ArtifactStore {
    settings: StoreSettings,
    datasets: Mutex<Registry<Dataset>>,
    results: Mutex<Registry<ValidationResultDetail>>,
    materialize_dir: TempDir,
}

impl ArtifactStore {
    pub fn new(settings: StoreSettings) -> io::Result<Self> {
        let materialize_dir = tempfile::Builder::new().prefix("gx-mcp-").tempdir()?;
        debug!(
            "Materialized datasets go to {}",
            materialize_dir.path().display()
        );
        Ok(Self {
            datasets: Mutex::new(Registry::new(settings.max_datasets)),
            results: Mutex::new(Registry::new(settings.max_results)),
            settings,
            materialize_dir,
        })
    }

    pub fn register_dataset(&self, dataset: Dataset) -> String {
        let (handle, evicted) = lock(&self.datasets).insert(dataset, Instant::now());
        self.on_datasets_evicted(&evicted);
        self.publish_stats();
        handle
    }

    pub fn get_dataset(&self, handle: &str) -> Result<Arc<Dataset>, StoreError> {
        let ttl = self.settings.handle_ttl;
        let found = lock(&self.datasets).get(handle, ttl, Instant::now());
        match found {
            Some(dataset) => Ok(dataset),
            None => {
                self.remove_materialized(handle);
                Err(StoreError::DatasetNotFound(handle.to_string()))
            }
        }
    }

    /// Writes the dataset to `<handle>.csv` in the store directory and returns
    /// the path. Every call re-serializes; the file is swapped in atomically so
    /// concurrent readers never see a partial write.
    pub fn materialize_path(&self, handle: &str) -> Result<PathBuf, StoreError> {
        let dataset = self.get_dataset(handle)?;
        let target = self.materialized_file(handle);

        let to_store_error = |source: TabularError| StoreError::Materialize {
            handle: handle.to_string(),
            source,
        };

        let mut staging = NamedTempFile::new_in(self.materialize_dir.path())
            .map_err(|e| to_store_error(e.into()))?;
        dataset.write_csv(staging.as_file_mut()).map_err(to_store_error)?;
        staging
            .persist(&target)
            .map_err(|e| to_store_error(e.error.into()))?;

        Ok(target)
    }

    pub fn register_result(&self, detail: ValidationResultDetail) -> String {
        let (handle, evicted) = lock(&self.results).insert(detail, Instant::now());
        if !evicted.is_empty() {
            metrics::record_store_evictions("result", evicted.len());
        }
        self.publish_stats();
        handle
    }

    pub fn get_result(&self, handle: &str) -> Result<Arc<ValidationResultDetail>, StoreError> {
        let ttl = self.settings.handle_ttl;
        lock(&self.results)
            .get(handle, ttl, Instant::now())
            .ok_or_else(|| StoreError::ResultNotFound(handle.to_string()))
    }

    /// Drops every expired entry in both namespaces. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        let ttl = self.settings.handle_ttl;
        if ttl.is_none() {
            return 0;
        }
        let now = Instant::now();

        let datasets = lock(&self.datasets).purge_expired(ttl, now);
        self.on_datasets_evicted(&datasets);

        let results = lock(&self.results).purge_expired(ttl, now);
        if !results.is_empty() {
            metrics::record_store_evictions("result", results.len());
        }

        self.publish_stats();
        datasets.len() + results.len()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            datasets: lock(&self.datasets).len(),
            results: lock(&self.results).len(),
        }
    }

    /// Runs [`ArtifactStore::sweep_expired`] every `interval` until aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired();
                if removed > 0 {
                    info!("Store sweep evicted {} expired entries", removed);
                }
            }
        })
    }

    pub fn materialize_dir(&self) -> &Path {
        self.materialize_dir.path()
    }

    fn materialized_file(&self, handle: &str) -> PathBuf {
        self.materialize_dir.path().join(format!("{}.csv", handle))
    }

    fn on_datasets_evicted(&self, handles: &[String]) {
        if handles.is_empty() {
            return;
        }
        metrics::record_store_evictions("dataset", handles.len());
        for handle in handles {
            debug!("Evicted dataset {}", handle);
            self.remove_materialized(handle);
        }
    }

    fn remove_materialized(&self, handle: &str) {
        // Only store-generated handles ever reach the filesystem.
        if Uuid::parse_str(handle).is_err() {
            return;
        }
        let path = self.materialized_file(handle);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }

    fn publish_stats(&self) {
        let stats = self.stats();
        metrics::set_store_entries("dataset", stats.datasets);
        metrics::set_store_entries("result", stats.results);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample() -> Dataset {
        Dataset::from_csv_str("x,y\n1,2\n3,4\n5,6").unwrap()
    }

    fn store_with(settings: StoreSettings) -> ArtifactStore {
        ArtifactStore::new(settings).unwrap()
    }

    #[test]
    fn registers_and_reads_back_dataset() {
        let store = store_with(StoreSettings::default());
        let handle = store.register_dataset(sample());
        let dataset = store.get_dataset(&handle).unwrap();
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.column_count(), 2);
    }

    #[test]
    fn handles_are_uuids_and_unique() {
        let store = store_with(StoreSettings::default());
        let a = store.register_dataset(sample());
        let b = store.register_dataset(sample());
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn unknown_handle_is_not_found() {
        let store = store_with(StoreSettings::default());
        let err = store.get_dataset("nope").unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, StoreError::DatasetNotFound(h) if h == "nope"));
        assert!(store.materialize_path("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn namespaces_are_separate() {
        let store = store_with(StoreSettings::default());
        let dataset = store.register_dataset(sample());
        let result = store.register_result(ValidationResultDetail::trivial_success());
        assert!(store.get_result(&dataset).is_err());
        assert!(store.get_dataset(&result).is_err());
        assert_eq!(store.stats(), StoreStats { datasets: 1, results: 1 });
    }

    #[test]
    fn materialize_writes_handle_named_csv() {
        let store = store_with(StoreSettings::default());
        let handle = store.register_dataset(sample());
        let path = store.materialize_path(&handle).unwrap();
        assert_eq!(path.file_name().unwrap(), format!("{}.csv", handle).as_str());
        assert!(path.starts_with(store.materialize_dir()));
        let reread = Dataset::from_csv_path(&path).unwrap();
        assert_eq!(reread, *store.get_dataset(&handle).unwrap());

        // second call rewrites the same path
        let again = store.materialize_path(&handle).unwrap();
        assert_eq!(path, again);
    }

    #[test]
    fn full_namespace_evicts_least_recently_accessed() {
        let store = store_with(StoreSettings {
            max_datasets: 2,
            ..StoreSettings::default()
        });
        let first = store.register_dataset(sample());
        let second = store.register_dataset(sample());
        // touching `first` makes `second` the eviction candidate
        store.get_dataset(&first).unwrap();
        let third = store.register_dataset(sample());

        assert!(store.get_dataset(&first).is_ok());
        assert!(store.get_dataset(&second).unwrap_err().is_not_found());
        assert!(store.get_dataset(&third).is_ok());
        assert_eq!(store.stats().datasets, 2);
    }

    #[test]
    fn eviction_removes_materialized_file() {
        let store = store_with(StoreSettings {
            max_datasets: 1,
            ..StoreSettings::default()
        });
        let first = store.register_dataset(sample());
        let path = store.materialize_path(&first).unwrap();
        assert!(path.exists());
        store.register_dataset(sample());
        assert!(!path.exists());
    }

    #[test]
    fn idle_entries_expire() {
        let store = store_with(StoreSettings {
            handle_ttl: Some(Duration::from_millis(20)),
            ..StoreSettings::default()
        });
        let dataset = store.register_dataset(sample());
        let result = store.register_result(ValidationResultDetail::trivial_success());
        std::thread::sleep(Duration::from_millis(50));

        assert!(store.get_dataset(&dataset).unwrap_err().is_not_found());
        assert!(store.get_result(&result).unwrap_err().is_not_found());
    }

    #[test]
    fn sweep_purges_expired_entries() {
        let store = store_with(StoreSettings {
            handle_ttl: Some(Duration::from_millis(20)),
            ..StoreSettings::default()
        });
        store.register_dataset(sample());
        store.register_result(ValidationResultDetail::failure("x"));
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(store.sweep_expired(), 2);
        assert_eq!(store.stats(), StoreStats { datasets: 0, results: 0 });
    }

    #[test]
    fn no_ttl_means_no_expiry() {
        let store = store_with(StoreSettings {
            handle_ttl: None,
            ..StoreSettings::default()
        });
        let handle = store.register_dataset(sample());
        assert_eq!(store.sweep_expired(), 0);
        assert!(store.get_dataset(&handle).is_ok());
    }

    #[test]
    fn concurrent_registration_yields_distinct_handles() {
        let store = Arc::new(store_with(StoreSettings {
            max_datasets: 1000,
            ..StoreSettings::default()
        }));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| store.register_dataset(sample()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for thread in threads {
            for handle in thread.join().unwrap() {
                assert!(all.insert(handle));
            }
        }
        assert_eq!(all.len(), 400);
    }
}
