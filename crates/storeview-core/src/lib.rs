//! Storeview Core - exposes a key-value store to an out-of-process inspector.
//!
//! The bridge listens for `list`, `write` and `delete` requests on a message
//! channel, runs them against a store, and answers each request exactly once:
//! an acknowledgement on `ack:<method>` or a serialized fault on `error`.
//!
//! The store and the channel are traits ([`KeyValueStore`], [`Connection`]).
//! The crate ships an in-memory and a SQLite store, plus an in-process and a
//! TCP transport.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storeview::{SqliteStore, StoreBridge, TcpTransport};
//!
//! #[tokio::main]
//! async fn main() -> storeview::Result<()> {
//!     let transport = Arc::new(TcpTransport::bind("127.0.0.1", 0).await?);
//!     let mut bridge = StoreBridge::builder()
//!         .store(SqliteStore::open("app.sqlite")?)
//!         .build();
//!     bridge.activate(transport.clone())?;
//!
//!     println!("Inspector port: {}", transport.port());
//!     tokio::signal::ctrl_c().await?;
//!     bridge.deactivate();
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod protocol;
pub mod store;
pub mod transport;

// Re-export commonly used types
pub use bridge::{BridgeState, ErrorCallback, MethodHandler, StoreBridge, StoreBridgeBuilder};
pub use error::{Result, StoreviewError};
pub use protocol::{AckPayload, Envelope, ErrorPayload, ListEntry, Message, Method, Params};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoredValue};
pub use transport::{
    Connection, InspectorClient, Listener, LocalConnection, Subscription, TcpTransport,
};
