//! Store capability trait and value types.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One typed value as held by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl StoredValue {
    /// Name of the value kind, as persisted by the SQLite store.
    pub fn kind(&self) -> &'static str {
        match self {
            StoredValue::String(_) => "string",
            StoredValue::Number(_) => "number",
            StoredValue::Bool(_) => "bool",
        }
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::String(value.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        StoredValue::String(value)
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        StoredValue::Number(value)
    }
}

impl From<bool> for StoredValue {
    fn from(value: bool) -> Self {
        StoredValue::Bool(value)
    }
}

/// Key-value store inspected by the bridge.
///
/// Each key holds exactly one typed value. The typed getters return `None`
/// when the key is missing or holds a value of another kind; a missing value
/// is never an error. Setters replace both the value and its kind.
///
/// All operations are synchronous to match rusqlite's API. Implementations
/// provide their own interior synchronization and must make a write visible
/// to the next read.
pub trait KeyValueStore: Send + Sync {
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    fn get_number(&self, key: &str) -> Result<Option<f64>>;

    fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    fn set_string(&self, key: &str, value: &str) -> Result<()>;

    fn set_number(&self, key: &str, value: f64) -> Result<()>;

    fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Remove a key. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys, in the store's enumeration order.
    fn keys(&self) -> Result<Vec<String>>;

    /// Store any typed value.
    fn set(&self, key: &str, value: StoredValue) -> Result<()> {
        match value {
            StoredValue::String(s) => self.set_string(key, &s),
            StoredValue::Number(n) => self.set_number(key, n),
            StoredValue::Bool(b) => self.set_bool(key, b),
        }
    }
}
