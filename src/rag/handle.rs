//! Shared, reloadable view of a persisted store.

use crate::config::ReloadPolicy;
use crate::error::Result;
use crate::vector_store::VectorStore;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Holds the current snapshot of a store directory.
///
/// Readers get an `Arc` and keep using it even if a reload swaps in a newer
/// snapshot underneath them.
pub struct StoreHandle {
    path: PathBuf,
    policy: ReloadPolicy,
    current: RwLock<Arc<VectorStore>>,
}

impl StoreHandle {
    /// Load the store at `path`.
    pub fn open(path: impl Into<PathBuf>, policy: ReloadPolicy) -> Result<Self> {
        let path = path.into();
        let store = VectorStore::load(&path)?;
        info!("Opened store at {:?} ({} records)", path, store.len());
        Ok(Self::from_store(store, path, policy))
    }

    /// Wrap an already-loaded store. `path` is where reloads read from.
    pub fn from_store(store: VectorStore, path: impl Into<PathBuf>, policy: ReloadPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            current: RwLock::new(Arc::new(store)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> ReloadPolicy {
        self.policy
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<VectorStore> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Re-read the store from disk and make it the current snapshot.
    ///
    /// On error the previous snapshot stays current.
    pub fn reload(&self) -> Result<Arc<VectorStore>> {
        let store = Arc::new(VectorStore::load(&self.path)?);
        debug!("Reloaded store at {:?} ({} records)", self.path, store.len());

        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::clone(&store);
        Ok(store)
    }

    /// Snapshot for a query, reloading first when the policy asks for it.
    pub fn for_query(&self) -> Result<Arc<VectorStore>> {
        match self.policy {
            ReloadPolicy::Manual => Ok(self.snapshot()),
            ReloadPolicy::EveryQuery => self.reload(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KildeError;
    use crate::vector_store::Record;

    fn store_with(texts: &[&str]) -> VectorStore {
        let mut store = VectorStore::new(2);
        let records = texts.iter().map(|t| Record::new(*t)).collect();
        let vectors = texts.iter().map(|_| vec![1.0, 0.0]).collect();
        store.append(records, vectors).unwrap();
        store
    }

    #[test]
    fn test_manual_policy_keeps_snapshot_until_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        store_with(&["one"]).save(&path).unwrap();

        let handle = StoreHandle::open(&path, ReloadPolicy::Manual).unwrap();
        let before = handle.snapshot();

        store_with(&["one", "two"]).save(&path).unwrap();
        assert_eq!(handle.for_query().unwrap().len(), 1);

        handle.reload().unwrap();
        assert_eq!(handle.snapshot().len(), 2);
        // Old readers are unaffected.
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn test_every_query_policy_sees_new_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        store_with(&["one"]).save(&path).unwrap();

        let handle = StoreHandle::open(&path, ReloadPolicy::EveryQuery).unwrap();
        store_with(&["one", "two", "three"]).save(&path).unwrap();

        assert_eq!(handle.for_query().unwrap().len(), 3);
    }

    #[test]
    fn test_failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        store_with(&["one"]).save(&path).unwrap();

        let handle = StoreHandle::open(&path, ReloadPolicy::Manual).unwrap();
        std::fs::write(path.join("metadata.json"), "not json").unwrap();

        assert!(matches!(handle.reload(), Err(KildeError::CorruptState(_))));
        assert_eq!(handle.snapshot().len(), 1);
    }

    #[test]
    fn test_open_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let result = StoreHandle::open(dir.path().join("nothing"), ReloadPolicy::Manual);
        assert!(matches!(result, Err(KildeError::CorruptState(_))));
    }

    /// Saves and reloads race here on purpose. Whatever a reader observes must
    /// be internally consistent; reads that land inside the swap window may
    /// fail, which is the documented behavior rather than a guarantee.
    #[test]
    fn test_concurrent_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        store_with(&["seed"]).save(&path).unwrap();

        let handle = Arc::new(StoreHandle::open(&path, ReloadPolicy::EveryQuery).unwrap());

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            for n in 2..12 {
                let texts: Vec<String> = (0..n).map(|i| format!("row {i}")).collect();
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                store_with(&refs).save(&writer_path).unwrap();
            }
        });

        let mut observed = 0;
        let mut failed = 0;
        for _ in 0..50 {
            match handle.for_query() {
                Ok(store) => {
                    assert_eq!(store.index().len(), store.records().len());
                    observed += 1;
                }
                Err(KildeError::CorruptState(_)) | Err(KildeError::Io(_)) => failed += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        writer.join().unwrap();

        assert_eq!(observed + failed, 50);
        assert_eq!(handle.reload().unwrap().len(), 11);
    }
}
