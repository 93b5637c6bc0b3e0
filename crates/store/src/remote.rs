//! Remote redis backend
//!
//! Network-addressed shared store. Every operation may fail transiently
//! and is wrapped in the [`retry`](crate::retry) policy; exhausting the
//! budget fails the enclosing import run. `sync` is a no-op: redis is
//! durable on its own terms, and bulk imports rely on overwrite idempotence
//! rather than a flush barrier.
//!
//! Keys are namespaced with a configurable prefix so one redis instance can
//! host several stores. Prefix scans use cursor-driven `SCAN` with the
//! match pattern glob-escaped, then fetch values in `MGET` chunks.

use crate::backend::{Backend, BackendKind};
use crate::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use rankstore_core::{Error, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

const SCAN_COUNT: usize = 512;
const MGET_CHUNK: usize = 256;

/// Connection configuration for the remote backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// redis connection URL, e.g. `redis://127.0.0.1:6379/0`
    pub url: String,
    /// Namespace prefix prepended to every key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_key_prefix() -> String {
    "rankstore:".to_string()
}

impl RemoteConfig {
    /// Config with the default namespace prefix and retry policy
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: default_key_prefix(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Classify a redis error into transient vs. hard backend failure
fn classify(e: redis::RedisError) -> Error {
    let transient = e.is_timeout()
        || e.is_connection_dropped()
        || e.is_connection_refusal()
        || e.is_io_error()
        || matches!(
            e.kind(),
            redis::ErrorKind::TryAgain | redis::ErrorKind::BusyLoadingError
        );
    if transient {
        Error::BackendTransient(e.to_string())
    } else {
        Error::Backend(e.to_string())
    }
}

/// Escape redis glob metacharacters so a key prefix matches literally
fn glob_escape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if matches!(b, b'*' | b'?' | b'[' | b']' | b'\\') {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

/// redis-backed shared backend
pub struct RedisBackend {
    conn: ConnectionManager,
    key_prefix: Vec<u8>,
    retry: RetryPolicy,
}

impl RedisBackend {
    /// Connect to the configured redis instance
    pub async fn connect(config: &RemoteConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| Error::Config(format!("invalid redis url '{}': {e}", config.url)))?;
        let conn = ConnectionManager::new(client).await.map_err(classify)?;
        tracing::debug!(url = %config.url, prefix = %config.key_prefix, "connected remote backend");
        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone().into_bytes(),
            retry: config.retry.clone(),
        })
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.key_prefix.len() + key.len());
        full.extend_from_slice(&self.key_prefix);
        full.extend_from_slice(key);
        full
    }

    fn strip_prefix<'a>(&self, full: &'a [u8]) -> Option<&'a [u8]> {
        full.strip_prefix(self.key_prefix.as_slice())
    }

    /// One full SCAN pass collecting keys under `pattern`
    async fn scan_keys(&self, pattern: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<Vec<u8>> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, chunk): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(classify)?;
            keys.extend(chunk);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl Backend for RedisBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let full = self.full_key(key);
        with_retry(&self.retry, "redis get", || {
            let mut conn = self.conn.clone();
            let key = full.clone();
            async move {
                let value: Option<Vec<u8>> = conn.get(key).await.map_err(classify)?;
                Ok(value)
            }
        })
        .await
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let full = self.full_key(key);
        with_retry(&self.retry, "redis set", || {
            let mut conn = self.conn.clone();
            let key = full.clone();
            let value = value.to_vec();
            async move {
                let _: () = conn.set(key, value).await.map_err(classify)?;
                Ok(())
            }
        })
        .await
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let full = self.full_key(key);
        with_retry(&self.retry, "redis del", || {
            let mut conn = self.conn.clone();
            let key = full.clone();
            async move {
                let _: () = conn.del(key).await.map_err(classify)?;
                Ok(())
            }
        })
        .await
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut pattern = glob_escape(&self.full_key(prefix));
        pattern.push(b'*');

        // The whole scan retries as a unit; SCAN cursors do not survive a
        // reconnect. Re-reads are deduplicated below.
        let keys = with_retry(&self.retry, "redis scan", || {
            let pattern = pattern.clone();
            async move { self.scan_keys(&pattern).await }
        })
        .await?;

        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(MGET_CHUNK) {
            let values = with_retry(&self.retry, "redis mget", || {
                let mut conn = self.conn.clone();
                let chunk = chunk.to_vec();
                async move {
                    let values: Vec<Option<Vec<u8>>> =
                        redis::cmd("MGET").arg(&chunk).query_async(&mut conn).await.map_err(classify)?;
                    Ok(values)
                }
            })
            .await?;
            for (full, value) in chunk.iter().zip(values) {
                // Entries deleted between SCAN and MGET come back nil; skip.
                let (Some(stripped), Some(value)) = (self.strip_prefix(full), value) else {
                    continue;
                };
                entries.push((stripped.to_vec(), value));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);
        Ok(entries)
    }

    async fn put_batch(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        with_retry(&self.retry, "redis pipeline set", || {
            let mut conn = self.conn.clone();
            let mut pipe = redis::pipe();
            for (key, value) in entries {
                pipe.set(self.full_key(key), value.clone()).ignore();
            }
            async move {
                let _: () = pipe.query_async(&mut conn).await.map_err(classify)?;
                Ok(())
            }
        })
        .await
    }

    /// Best-effort flush signal; redis persistence is its own concern
    async fn sync(&self) -> Result<()> {
        Ok(())
    }
}
