//! In-process blob store used by tests and dry runs.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::blob::{validate_path, Blob, BlobStore, VersionToken};
use crate::error::StoreError;

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Blob>>,
    next_version: AtomicU64,
    failing_reads: AtomicU32,
    writes: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` reads fail with a transient error.
    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stored paths, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let records = self.lock();
        let mut paths: Vec<String> = records.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Blob>> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        validate_path(path)?;
        if self.take_injected_failure() {
            return Err(StoreError::Simulated(path.to_owned()));
        }
        Ok(self.lock().get(path).cloned())
    }

    async fn put(
        &self,
        path: &str,
        content: &str,
        expected: Option<&VersionToken>,
        _message: &str,
    ) -> Result<VersionToken, StoreError> {
        validate_path(path)?;
        let mut records = self.lock();
        let current = records.get(path).map(|b| &b.version);
        if current != expected {
            return Err(StoreError::Conflict {
                path: path.to_owned(),
            });
        }

        let n = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        let version = VersionToken::new(format!("v{n}"));
        records.insert(
            path.to_owned(),
            Blob {
                content: content.to_owned(),
                version: version.clone(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(version)
    }

    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        validate_path(prefix)?;
        let wanted = format!("{prefix}/");
        let dirs: BTreeSet<String> = self
            .lock()
            .keys()
            .filter_map(|k| k.strip_prefix(&wanted))
            .filter_map(|rest| rest.split_once('/').map(|(dir, _)| dir.to_owned()))
            .collect();
        Ok(dirs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_stale_token_one_wins_one_conflicts() {
        let store = MemoryStore::new();
        let v1 = store.put("s.json", "base", None, "m").await.unwrap();

        let first = store.put("s.json", "a", Some(&v1), "m").await;
        let second = store.put("s.json", "b", Some(&v1), "m").await;

        assert!(first.is_ok());
        assert!(matches!(second, Err(StoreError::Conflict { .. })));
        assert_eq!(store.get("s.json").await.unwrap().unwrap().content, "a");
    }

    #[tokio::test]
    async fn list_dirs_derives_directories_from_keys() {
        let store = MemoryStore::new();
        store.put("data/t1/2025-01-01.json", "{}", None, "m").await.unwrap();
        store.put("data/t2/2025-01-01.json", "{}", None, "m").await.unwrap();
        store.put("data/readme.md", "", None, "m").await.unwrap();
        assert_eq!(store.list_dirs("data").await.unwrap(), vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.fail_next_reads(1);
        assert!(store.get("x").await.is_err());
        assert!(store.get("x").await.unwrap().is_none());
    }
}
