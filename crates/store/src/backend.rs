//! Byte-level backend interface
//!
//! A backend is one concrete keyspace: a flat map from key bytes to value
//! bytes. The three implementations (heap, disk, redis) expose identical
//! observable get/put/delete semantics; only durability, latency and
//! failure modes differ, which is what lets the import pipeline switch
//! backends by configuration alone.
//!
//! Absence is `Ok(None)` / a missing entry, never an error. All operations
//! are idempotent at the storage level: repeated identical puts or deletes
//! leave equivalent state.

use async_trait::async_trait;
use rankstore_core::Result;
use std::fmt;

/// Which backend implementation a store runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process cache; no persistence across restarts
    Heap,
    /// Embedded on-disk store; durable after `sync`
    Disk,
    /// Network-addressed shared store
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Heap => write!(f, "heap"),
            BackendKind::Disk => write!(f, "disk"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

/// One concrete keyspace of (key bytes, value bytes) entries
///
/// The scan methods materialize their results; they exist for bulk
/// operations (size estimation, transfer, buffer flush) over bounded
/// keyspaces, not for serving paths.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which implementation this is
    fn kind(&self) -> BackendKind;

    /// Value stored under `key`, if any
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, overwriting any previous value
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    async fn delete(&self, key: &[u8]) -> Result<()>;

    /// All entries whose key starts with `prefix`
    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Unconditional overwrite of a batch of entries
    ///
    /// Semantically equivalent to sequential `put` calls; implementations
    /// override this to batch I/O (one write transaction, one pipeline).
    async fn put_batch(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        for (key, value) in entries {
            self.put(key, value).await?;
        }
        Ok(())
    }

    /// Make previously written entries durable
    ///
    /// Heap: no-op. Disk: entries written before a successful `sync`
    /// survive a crash. Remote: best-effort flush signal; the remote store
    /// is durable on its own terms.
    async fn sync(&self) -> Result<()>;
}
