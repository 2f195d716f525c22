//! In-memory store, used as the bridge's default when no database is configured.

use super::traits::{KeyValueStore, StoredValue};
use crate::error::{Result, StoreviewError};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Insertion-ordered in-memory store.
///
/// Overwriting a key keeps its original position in the key order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Vec<(String, StoredValue)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`, in order.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<StoredValue>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Get the raw typed value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        let entries = self.read()?;
        Ok(entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone()))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<(String, StoredValue)>>> {
        self.entries.read().map_err(|e| StoreviewError::Store {
            message: format!("Failed to lock store: {}", e),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<(String, StoredValue)>>> {
        self.entries.write().map_err(|e| StoreviewError::Store {
            message: format!("Failed to lock store: {}", e),
        })
    }

    fn put(&self, key: &str, value: StoredValue) -> Result<()> {
        let mut entries = self.write()?;
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => entries.push((key.to_string(), value)),
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.get(key)? {
            Some(StoredValue::String(s)) => Some(s),
            _ => None,
        })
    }

    fn get_number(&self, key: &str) -> Result<Option<f64>> {
        Ok(match self.get(key)? {
            Some(StoredValue::Number(n)) => Some(n),
            _ => None,
        })
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(match self.get(key)? {
            Some(StoredValue::Bool(b)) => Some(b),
            _ => None,
        })
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, StoredValue::String(value.to_string()))
    }

    fn set_number(&self, key: &str, value: f64) -> Result<()> {
        self.put(key, StoredValue::Number(value))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, StoredValue::Bool(value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.write()?.retain(|(k, _)| k != key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read()?.iter().map(|(k, _)| k.clone()).collect())
    }
}
