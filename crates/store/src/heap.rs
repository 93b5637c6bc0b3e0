//! In-process heap backend
//!
//! A DashMap-backed cache keyed by the full encoded key. Lock-free reads,
//! sharded writes, no persistence across process restarts. Used for tests
//! and as the local staging area of staged imports.
//!
//! Unbounded by default. With [`HeapBackend::with_entry_limit`] the backend
//! evicts the earliest-inserted entries once the limit is exceeded; the
//! insertion log is only maintained when a limit is configured.

use crate::backend::{Backend, BackendKind};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rankstore_core::Result;
use std::collections::VecDeque;

/// In-process cache backend
#[derive(Debug, Default)]
pub struct HeapBackend {
    entries: DashMap<Vec<u8>, Vec<u8>>,
    entry_limit: Option<usize>,
    insert_log: Mutex<VecDeque<Vec<u8>>>,
}

impl HeapBackend {
    /// Create an unbounded heap backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a heap backend that evicts earliest-inserted entries beyond
    /// `limit`
    pub fn with_entry_limit(limit: usize) -> Self {
        Self {
            entries: DashMap::new(),
            entry_limit: Some(limit),
            insert_log: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the backend holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record_insert(&self, key: &[u8], was_new: bool) {
        let Some(limit) = self.entry_limit else {
            return;
        };
        let mut log = self.insert_log.lock();
        if was_new {
            log.push_back(key.to_vec());
        }
        // Evict in insertion order. Logged keys may have been deleted since;
        // popping them is harmless.
        while self.entries.len() > limit {
            match log.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl Backend for HeapBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Heap
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let was_new = self.entries.insert(key.to_vec(), value.to_vec()).is_none();
        self.record_insert(key, was_new);
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out: Vec<(Vec<u8>, Vec<u8>)> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        // DashMap iteration order is arbitrary; sort so scans are stable.
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    async fn sync(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let backend = HeapBackend::new();
        assert_eq!(backend.get(b"k").await.unwrap(), None);

        backend.put(b"k", b"v1").await.unwrap();
        assert_eq!(backend.get(b"k").await.unwrap(), Some(b"v1".to_vec()));

        backend.put(b"k", b"v2").await.unwrap();
        assert_eq!(backend.get(b"k").await.unwrap(), Some(b"v2".to_vec()));

        backend.delete(b"k").await.unwrap();
        assert_eq!(backend.get(b"k").await.unwrap(), None);

        // Deleting an absent key is fine.
        backend.delete(b"k").await.unwrap();
    }

    #[tokio::test]
    async fn test_scan_prefix_is_sorted_and_bounded() {
        let backend = HeapBackend::new();
        backend.put(b"ctr/user=b", b"2").await.unwrap();
        backend.put(b"ctr/user=a", b"1").await.unwrap();
        backend.put(b"ctr_total/user=a", b"9").await.unwrap();

        let entries = backend.scan_prefix(b"ctr/").await.unwrap();
        assert_eq!(
            entries,
            vec![
                (b"ctr/user=a".to_vec(), b"1".to_vec()),
                (b"ctr/user=b".to_vec(), b"2".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_entry_limit_evicts_earliest_inserted() {
        let backend = HeapBackend::with_entry_limit(2);
        backend.put(b"a", b"1").await.unwrap();
        backend.put(b"b", b"2").await.unwrap();
        backend.put(b"c", b"3").await.unwrap();

        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get(b"a").await.unwrap(), None);
        assert_eq!(backend.get(b"c").await.unwrap(), Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn test_overwrite_does_not_grow_log() {
        let backend = HeapBackend::with_entry_limit(2);
        backend.put(b"a", b"1").await.unwrap();
        backend.put(b"a", b"2").await.unwrap();
        backend.put(b"b", b"1").await.unwrap();
        // Overwrites of "a" must not count against the limit.
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get(b"a").await.unwrap(), Some(b"2".to_vec()));
    }
}
