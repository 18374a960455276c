//! Key-value persistence capability.
//!
//! Everything the hub persists goes through [`KvStore`]: a flat string
//! keyspace with whole-value overwrites and no transactions. Values are JSON
//! text; [`KvStoreExt`] adds typed helpers on top.
//!
//! Implementations:
//! - [`MemoryStore`]: in-process map with an optional byte quota.
//! - [`FileStore`]: map persisted as a checksummed postcard snapshot.
//! - [`Namespaced`]: prefixes every key of an inner store.

use std::collections::BTreeMap;
use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;

mod file;

pub use file::FileStore;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("invalid magic or version")]
    MagicOrVersion,
    #[error("file too short or malformed")]
    Malformed,
    #[error("checksum mismatch")]
    Checksum,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Flat string keyspace with full-overwrite writes.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
    fn delete(&mut self, key: &str) -> Result<(), StorageError>;
    /// All keys currently present, in ascending order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<S: KvStore + ?Sized> KvStore for &mut S {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> { (**self).get(key) }
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> { (**self).set(key, value) }
    fn delete(&mut self, key: &str) -> Result<(), StorageError> { (**self).delete(key) }
    fn keys(&self) -> Result<Vec<String>, StorageError> { (**self).keys() }
}

impl<S: KvStore + ?Sized> KvStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> { (**self).get(key) }
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> { (**self).set(key, value) }
    fn delete(&mut self, key: &str) -> Result<(), StorageError> { (**self).delete(key) }
    fn keys(&self) -> Result<Vec<String>, StorageError> { (**self).keys() }
}

/// JSON helpers available on every store.
pub trait KvStoreExt: KvStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let text = serde_json::to_string(value)?;
        self.set(key, text)
    }

    /// Read a list, treating a missing key as empty.
    fn get_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
        Ok(self.get_json(key)?.unwrap_or_default())
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

/// In-memory store, optionally limited to `quota` bytes of keys plus values.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    map: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// A store that refuses writes once keys plus values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self { map: BTreeMap::new(), quota: Some(bytes) }
    }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.map
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::Unavailable(format!(
                    "quota exceeded writing {key}: {needed} > {quota} bytes"
                )));
            }
        }
        self.map.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.map.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.map.keys().cloned().collect())
    }
}

/// Prefixes every key with `{namespace}:` so several apps can share one backend.
#[derive(Debug, Clone)]
pub struct Namespaced<S> {
    inner: S,
    prefix: String,
}

impl<S: KvStore> Namespaced<S> {
    pub fn new(inner: S, namespace: &str) -> Self {
        Self { inner, prefix: format!("{namespace}:") }
    }

    pub fn into_inner(self) -> S { self.inner }

    fn full_key(&self, key: &str) -> String { format!("{}{}", self.prefix, key) }
}

impl<S: KvStore> KvStore for Namespaced<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(&self.full_key(key))
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        let key = self.full_key(key);
        self.inner.set(&key, value)
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        let key = self.full_key(key);
        self.inner.delete(&key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .inner
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }
}
