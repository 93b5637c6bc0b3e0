//! Backend configuration and store construction
//!
//! The import pipeline selects a backend implementation by configuration,
//! never by runtime type inspection beyond this single dispatch point.

use crate::backend::Backend;
use crate::disk::DiskBackend;
use crate::heap::HeapBackend;
use crate::remote::{RedisBackend, RemoteConfig};
use crate::state::Store;
use rankstore_core::{FeatureMapping, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Which backend to open, and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-process cache; optional cap on live entries
    Heap {
        /// Evict earliest-inserted entries beyond this count
        #[serde(default)]
        entry_limit: Option<usize>,
    },
    /// Embedded on-disk store
    Disk {
        /// Database file path; parent directories are created
        path: PathBuf,
    },
    /// Remote redis store
    Remote {
        /// Connection settings
        #[serde(flatten)]
        config: RemoteConfig,
    },
}

impl BackendConfig {
    /// Unbounded heap backend
    pub fn heap() -> Self {
        BackendConfig::Heap { entry_limit: None }
    }

    /// Disk backend at `path`
    pub fn disk(path: impl Into<PathBuf>) -> Self {
        BackendConfig::Disk { path: path.into() }
    }

    /// Remote backend at `url` with default prefix and retry policy
    pub fn remote(url: impl Into<String>) -> Self {
        BackendConfig::Remote {
            config: RemoteConfig::new(url),
        }
    }

    /// Whether this configuration addresses a remote store
    pub fn is_remote(&self) -> bool {
        matches!(self, BackendConfig::Remote { .. })
    }
}

/// Open the configured backend
pub async fn open_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    match config {
        BackendConfig::Heap { entry_limit } => {
            let backend = match entry_limit {
                Some(limit) => HeapBackend::with_entry_limit(*limit),
                None => HeapBackend::new(),
            };
            Ok(Arc::new(backend))
        }
        BackendConfig::Disk { path } => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Ok(Arc::new(DiskBackend::open(path)?))
        }
        BackendConfig::Remote { config } => Ok(Arc::new(RedisBackend::connect(config).await?)),
    }
}

impl Store {
    /// Open a ready store for `config` with the given feature mapping
    pub async fn open(config: &BackendConfig, mapping: &FeatureMapping) -> Result<Store> {
        let backend = open_backend(config).await?;
        Ok(Store::new(backend, mapping.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use rankstore_core::StateDescriptor;

    fn mapping() -> FeatureMapping {
        FeatureMapping::new(vec![StateDescriptor::value("ctr", ["user"]).unwrap()]).unwrap()
    }

    #[tokio::test]
    async fn test_open_heap_store() {
        let store = Store::open(&BackendConfig::heap(), &mapping()).await.unwrap();
        assert_eq!(store.kind(), BackendKind::Heap);
    }

    #[tokio::test]
    async fn test_open_disk_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/state.redb");
        let store = Store::open(&BackendConfig::disk(&path), &mapping())
            .await
            .unwrap();
        assert_eq!(store.kind(), BackendKind::Disk);
        assert!(path.exists());
    }

    #[test]
    fn test_config_serde_round_trip() {
        let configs = vec![
            BackendConfig::heap(),
            BackendConfig::disk("/var/lib/rankstore/state.redb"),
            BackendConfig::remote("redis://127.0.0.1:6379"),
        ];
        for config in configs {
            let json = serde_json::to_string(&config).unwrap();
            let back: BackendConfig = serde_json::from_str(&json).unwrap();
            assert_eq!(config, back);
        }
    }
}
