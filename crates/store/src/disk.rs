//! Embedded on-disk backend
//!
//! redb-backed durable single-node storage. The keyspace is laid out as
//! one redb table per state descriptor namespace: the table name is the
//! descriptor segment of the key and the table key is the remainder. This
//! layout is a private wire format between import and serving processes;
//! it must stay stable across versions.
//!
//! Writes commit with eventual durability; [`Backend::sync`] performs a
//! durable commit, after which everything written before it survives a
//! crash. Losing post-sync writes on a crash is within contract: re-running
//! an import is safe because all writes are unconditional overwrites.

use crate::backend::{Backend, BackendKind};
use crate::key::split_descriptor;
use async_trait::async_trait;
use rankstore_core::{Error, Result};
use redb::{Database, Durability, ReadableTable, TableDefinition, TableError, TableHandle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn backend_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Backend(format!("{context}: {e}"))
}

/// Split a full key into (table name, in-table key)
fn route(key: &[u8]) -> Result<(&str, &[u8])> {
    let (name, rest) = split_descriptor(key)
        .ok_or_else(|| Error::Backend("key is missing its descriptor segment".to_string()))?;
    let name = std::str::from_utf8(name)
        .map_err(|e| backend_err("descriptor segment is not UTF-8", e))?;
    Ok((name, rest))
}

fn join_key(table: &str, rest: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(table.len() + 1 + rest.len());
    key.extend_from_slice(table.as_bytes());
    key.push(b'/');
    key.extend_from_slice(rest);
    key
}

/// redb-backed durable backend
pub struct DiskBackend {
    db: Arc<Database>,
    path: PathBuf,
}

impl DiskBackend {
    /// Open (or create) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path)
            .map_err(|e| backend_err(&format!("open {}", path.display()), e))?;
        tracing::debug!(path = %path.display(), "opened disk backend");
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan one table for entries whose in-table key starts with `rest`
    fn scan_table(
        db: &Database,
        table_name: &str,
        rest: &[u8],
        out: &mut Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<()> {
        let read = db.begin_read().map_err(|e| backend_err("begin read", e))?;
        let def: TableDefinition<&[u8], &[u8]> = TableDefinition::new(table_name);
        let table = match read.open_table(def) {
            Ok(table) => table,
            // A table that was never written to is just an empty namespace.
            Err(TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(backend_err("open table", e)),
        };
        for entry in table
            .range(rest..)
            .map_err(|e| backend_err("range scan", e))?
        {
            let (key, value) = entry.map_err(|e| backend_err("range scan", e))?;
            if !key.value().starts_with(rest) {
                break;
            }
            out.push((join_key(table_name, key.value()), value.value().to_vec()));
        }
        Ok(())
    }

    /// Scan every entry matching `prefix`, across tables if the prefix ends
    /// before the descriptor separator
    fn scan_sync(db: &Database, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        if let Some((name, rest)) = split_descriptor(prefix) {
            let name = std::str::from_utf8(name)
                .map_err(|e| backend_err("descriptor segment is not UTF-8", e))?;
            Self::scan_table(db, name, rest, &mut out)?;
        } else {
            let read = db.begin_read().map_err(|e| backend_err("begin read", e))?;
            let tables: Vec<String> = read
                .list_tables()
                .map_err(|e| backend_err("list tables", e))?
                .map(|handle| handle.name().to_string())
                .filter(|name| name.as_bytes().starts_with(prefix))
                .collect();
            drop(read);
            for name in tables {
                Self::scan_table(db, &name, &[], &mut out)?;
            }
            out.sort_by(|a, b| a.0.cmp(&b.0));
        }
        Ok(out)
    }
}

#[async_trait]
impl Backend for DiskBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Disk
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let (name, rest) = route(key)?;
        let read = self
            .db
            .begin_read()
            .map_err(|e| backend_err("begin read", e))?;
        let def: TableDefinition<&[u8], &[u8]> = TableDefinition::new(name);
        let table = match read.open_table(def) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(backend_err("open table", e)),
        };
        let value = table.get(rest).map_err(|e| backend_err("get", e))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let entry = [(key.to_vec(), value.to_vec())];
        self.put_batch(&entry).await
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let (name, rest) = route(key)?;
        let mut txn = self
            .db
            .begin_write()
            .map_err(|e| backend_err("begin write", e))?;
        txn.set_durability(Durability::Eventual);
        {
            let def: TableDefinition<&[u8], &[u8]> = TableDefinition::new(name);
            let mut table = txn
                .open_table(def)
                .map_err(|e| backend_err("open table", e))?;
            table.remove(rest).map_err(|e| backend_err("delete", e))?;
        }
        txn.commit().map_err(|e| backend_err("commit", e))?;
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let db = Arc::clone(&self.db);
        let prefix = prefix.to_vec();
        tokio::task::spawn_blocking(move || Self::scan_sync(&db, &prefix))
            .await
            .map_err(|e| backend_err("scan task", e))?
    }

    async fn put_batch(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut txn = self
            .db
            .begin_write()
            .map_err(|e| backend_err("begin write", e))?;
        txn.set_durability(Durability::Eventual);
        for (key, value) in entries {
            let (name, rest) = route(key)?;
            let def: TableDefinition<&[u8], &[u8]> = TableDefinition::new(name);
            let mut table = txn
                .open_table(def)
                .map_err(|e| backend_err("open table", e))?;
            table
                .insert(rest, value.as_slice())
                .map_err(|e| backend_err("put", e))?;
        }
        txn.commit().map_err(|e| backend_err("commit", e))?;
        Ok(())
    }

    /// Durable commit; everything written before this survives a crash
    async fn sync(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut txn = db.begin_write().map_err(|e| backend_err("begin sync", e))?;
            txn.set_durability(Durability::Immediate);
            txn.commit().map_err(|e| backend_err("sync commit", e))
        })
        .await
        .map_err(|e| backend_err("sync task", e))?
    }
}
