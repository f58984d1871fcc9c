//! Key-value store adapter
//!
//! Wraps an embedded [`redb`] database holding a single ordered table of
//! string keys to JSON byte values. Keys carry the entity prefix
//! (`station:3`, `schedule:3:17`, ...) so prefix scans group records the same
//! way the key naming does.
//!
//! Reads run in MVCC read transactions and never block the writer. Writes go
//! through [`Store::write`], which runs a closure inside one write
//! transaction: every put/delete made inside it commits together, or not at
//! all when the closure returns an error. Commits use redb's immediate
//! durability, so a write is on disk once the call returns.

use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{RadarHubError, Result};

const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// Name of the database file created inside the store directory.
pub const DATABASE_FILE: &str = "radar-hub.redb";

/// Read access shared by the store handle and open write scopes.
pub trait KvRead {
    /// Fetch the raw value at `key`, `None` if absent.
    fn get_opt(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Visit every entry whose key starts with `prefix`, in ascending key
    /// order. The visitor returns `ControlFlow::Break` to stop early; an
    /// error aborts the scan and is returned as-is.
    fn iterate_prefix<F>(&self, prefix: &str, visit: F) -> Result<()>
    where
        F: FnMut(&str, &[u8]) -> Result<ControlFlow<()>>;

    /// Fetch the raw value at `key`, failing with `NotFound` if absent.
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.get_opt(key)?
            .ok_or_else(|| RadarHubError::not_found("key", key))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get_opt(key)?.is_some())
    }

    /// Fetch and decode a JSON value.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_opt(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Collect all entries under `prefix`.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        self.iterate_prefix(prefix, |key, value| {
            out.push((key.to_string(), value.to_vec()));
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(out)
    }

    /// Decode every record under `prefix`.
    ///
    /// Records that fail to decode are logged and skipped, so one corrupt
    /// value does not hide the rest of the listing.
    fn list_json<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let mut out = Vec::new();
        self.iterate_prefix(prefix, |key, value| {
            match serde_json::from_slice::<T>(value) {
                Ok(record) => out.push(record),
                Err(e) => warn!("Skipping undecodable record {}: {}", key, e),
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(out)
    }
}

/// Shared handle to the embedded store.
///
/// Cloning is cheap; all clones refer to the same database.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    path: PathBuf,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish()
    }
}

impl Store {
    /// Open or create the store inside `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(DATABASE_FILE);

        info!("Opening store at {}", path.display());
        let db = match Database::create(&path) {
            Ok(db) => db,
            Err(e) => {
                warn!("Failed to open store at {}: {}", path.display(), e);
                return Err(e.into());
            }
        };

        // Read transactions fail on a table that was never created
        let txn = db.begin_write()?;
        txn.open_table(KV)?;
        txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside a single write transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and is aborted otherwise.
    /// Write transactions are serialized by the engine, so anything read
    /// through the writer stays valid until the commit.
    pub fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreWriter<'_>) -> Result<T>,
    {
        let txn = self.db.begin_write()?;
        let result = {
            let table = txn.open_table(KV)?;
            let mut writer = StoreWriter { table };
            f(&mut writer)
        };

        match result {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = txn.abort() {
                    warn!("Failed to abort write transaction: {}", abort);
                }
                Err(e)
            }
        }
    }

    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.write(|w| w.put(key, value))
    }

    pub fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.write(|w| w.put_json(key, value))
    }

    /// Remove `key`. Returns whether the key was present.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.write(|w| w.delete(key))
    }

    /// Close the handle.
    ///
    /// The database file is released once the last clone is dropped.
    pub fn close(self) {
        let remaining = Arc::strong_count(&self.db) - 1;
        info!(
            "Closing store at {} ({} other handles open)",
            self.path.display(),
            remaining
        );
    }
}

impl KvRead for Store {
    fn get_opt(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(KV)?;
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn iterate_prefix<F>(&self, prefix: &str, visit: F) -> Result<()>
    where
        F: FnMut(&str, &[u8]) -> Result<ControlFlow<()>>,
    {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(KV)?;
        scan_table(&table, prefix, visit)
    }
}

/// Mutable view of the store inside one write transaction.
pub struct StoreWriter<'txn> {
    table: redb::Table<'txn, &'static str, &'static [u8]>,
}

impl StoreWriter<'_> {
    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.table.insert(key, value)?;
        Ok(())
    }

    pub fn put_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        debug!("put {} ({} bytes)", key, bytes.len());
        self.put(key, &bytes)
    }

    /// Remove `key`. Returns whether the key was present.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let removed = self.table.remove(key)?.is_some();
        debug!("delete {} (present: {})", key, removed);
        Ok(removed)
    }
}

impl KvRead for StoreWriter<'_> {
    fn get_opt(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn iterate_prefix<F>(&self, prefix: &str, visit: F) -> Result<()>
    where
        F: FnMut(&str, &[u8]) -> Result<ControlFlow<()>>,
    {
        scan_table(&self.table, prefix, visit)
    }
}

fn scan_table<T, F>(table: &T, prefix: &str, mut visit: F) -> Result<()>
where
    T: ReadableTable<&'static str, &'static [u8]>,
    F: FnMut(&str, &[u8]) -> Result<ControlFlow<()>>,
{
    for entry in table.range(prefix..)? {
        let (key, value) = entry?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        if visit(key, value.value())?.is_break() {
            break;
        }
    }
    Ok(())
}
