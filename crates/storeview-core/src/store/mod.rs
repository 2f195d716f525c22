//! Key-value stores the bridge can expose.
//!
//! The bridge only depends on [`KeyValueStore`]. Two implementations ship
//! with the crate:
//! - [`MemoryStore`]: process-local, insertion ordered
//! - [`SqliteStore`]: persistent, backed by a single SQLite table

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KeyValueStore, StoredValue};
