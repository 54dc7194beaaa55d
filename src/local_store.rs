//! Durable string key/value storage backed by LMDB.
//!
//! This plays the role of the front end's "local storage": one key per cached
//! domain, every value a string (usually serialized JSON). Read-modify-write
//! helpers run inside a single LMDB write transaction, so concurrent writers
//! to the same key are serialized by the environment instead of racing.

use std::fs;
use std::path::{Path, PathBuf};

use lmdb::{Cursor, Database, DatabaseFlags, Environment, RwTransaction, Transaction, WriteFlags};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app_response::AppResponse;

const BYTES_PER_MB: usize = 1024 * 1024;

pub struct LocalStore {
    env: Environment,
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").field("path", &self.path).finish()
    }
}

impl LocalStore {
    /// Opens (or creates) the environment at `<name>.lmdb`.
    pub fn init(name: &str, map_size_mb: usize) -> Result<Self, AppResponse> {
        let path = PathBuf::from(format!("{name}.lmdb"));
        let map_size = map_size_mb.max(1) * BYTES_PER_MB;
        let (env, db) = Self::open_env(&path, map_size)?;
        info!("Local store opened at {}", path.display());
        Ok(Self { env, db, path })
    }

    fn open_env(path: &Path, map_size: usize) -> Result<(Environment, Database), AppResponse> {
        fs::create_dir_all(path)?;
        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(map_size)
            .open(path)?;
        let db = env.create_db(None, DatabaseFlags::empty())?;
        Ok((env, db))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(value)
    }

    pub fn put_raw(&self, key: &str, value: &str) -> Result<(), AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        Ok(())
    }

    /// Writes several keys in one transaction.
    pub fn put_raw_many(&self, entries: &[(&str, &str)]) -> Result<(), AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        for (key, value) in entries {
            txn.put(self.db, key, value, WriteFlags::empty())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Removes `key`. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool, AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        let existed = match txn.del(self.db, &key, None) {
            Ok(()) => true,
            Err(lmdb::Error::NotFound) => false,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(existed)
    }

    /// Reads and deserializes `key`. A value that no longer parses is an
    /// error here; callers decide whether to fall back to a default.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppResponse> {
        match self.get_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppResponse> {
        let json = serde_json::to_string(value)?;
        self.put_raw(key, &json)
    }

    /// Like [`get_json`](Self::get_json) but unreadable or missing values
    /// become `T::default()`.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.get_json(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                warn!("Discarding unreadable value under '{key}': {e}");
                T::default()
            }
        }
    }

    /// Atomic read-modify-write of a JSON value.
    ///
    /// `f` receives the current value (or the default when missing or
    /// unreadable) and mutates it in place; its return value is passed back.
    /// The updated value is written in the same transaction.
    pub fn update_json<T, R, F>(&self, key: &str, f: F) -> Result<R, AppResponse>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        self.transaction(|txn| {
            let mut value: T = txn.load(key)?;
            let result = f(&mut value);
            txn.save(key, &value)?;
            Ok(result)
        })
    }

    /// Runs `f` inside one write transaction spanning any number of keys.
    /// Nothing is written unless `f` returns `Ok`.
    pub fn transaction<R, F>(&self, f: F) -> Result<R, AppResponse>
    where
        F: FnOnce(&mut JsonTxn<'_>) -> Result<R, AppResponse>,
    {
        let mut txn = JsonTxn { txn: self.env.begin_rw_txn()?, db: self.db };
        let result = f(&mut txn)?;
        txn.txn.commit()?;
        Ok(result)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let mut keys = Vec::new();
        {
            // `iter` starts with MDB_NEXT on a fresh cursor, which simply
            // yields nothing on an empty database.
            let mut cursor = txn.open_ro_cursor(self.db)?;
            for (key, _) in cursor.iter() {
                let key = String::from_utf8_lossy(key);
                if key.starts_with(prefix) {
                    keys.push(key.into_owned());
                }
            }
        }
        txn.commit()?;
        Ok(keys)
    }

    /// Empties the store, returning how many keys were removed.
    pub fn clear_all_records(&self) -> Result<usize, AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        let count = {
            let mut cursor = txn.open_ro_cursor(self.db)?;
            cursor.iter().count()
        };
        txn.clear_db(self.db)?;
        txn.commit()?;
        debug!("Cleared {count} keys from {}", self.path.display());
        Ok(count)
    }

    /// Flushes buffers to disk.
    pub fn close_database(&self) -> Result<(), AppResponse> {
        self.env.sync(true)?;
        info!("Local store at {} flushed", self.path.display());
        Ok(())
    }

    /// Drops every key and forces the empty state to disk.
    pub fn reset_database(&self) -> Result<bool, AppResponse> {
        self.clear_all_records()?;
        self.env.sync(true)?;
        warn!("Local store at {} was reset", self.path.display());
        Ok(true)
    }
}

/// Handle passed to [`LocalStore::transaction`]. Reads see the writes made
/// earlier in the same transaction.
pub struct JsonTxn<'env> {
    txn: RwTransaction<'env>,
    db: Database,
}

impl JsonTxn<'_> {
    /// Current value of `key`; missing or unreadable values become the default.
    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, AppResponse> {
        match self.txn.get(self.db, &key) {
            Ok(bytes) => match serde_json::from_slice(bytes) {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!("Discarding unreadable value under '{key}': {e}");
                    Ok(T::default())
                }
            },
            Err(lmdb::Error::NotFound) => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), AppResponse> {
        let json = serde_json::to_string(value)?;
        self.txn.put(self.db, &key, &json, WriteFlags::empty())?;
        Ok(())
    }
}
