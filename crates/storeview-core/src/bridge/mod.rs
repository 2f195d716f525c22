//! The inspector bridge.
//!
//! A [`StoreBridge`] exposes one key-value store to an inspector over a
//! [`Connection`]. Activation binds a handler for each [`Method`] and records
//! the resulting subscriptions; deactivation releases them all.
//!
//! ```text
//! Inactive -> Activating -> Active -> Deactivating -> Inactive
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storeview::{LocalConnection, StoreBridge};
//!
//! let (connection, inspector_inbox) = LocalConnection::new();
//! let mut bridge = StoreBridge::builder()
//!     .error_handler(|err| eprintln!("bridge fault: {err}"))
//!     .build();
//! bridge.activate(Arc::new(connection.clone()))?;
//! connection.deliver("list", serde_json::Value::Null).await;
//! bridge.deactivate();
//! ```

mod dispatcher;
pub mod handlers;
mod lifecycle;
pub mod normalize;

pub use dispatcher::{log_errors, Dispatcher, ErrorCallback};
pub use handlers::MethodHandler;
pub use lifecycle::{BridgeState, SubscriptionSet};

use crate::error::{Result, StoreviewError};
use crate::protocol::Method;
use crate::store::{KeyValueStore, MemoryStore, SqliteStore};
use crate::transport::Connection;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-activation state.
struct Session {
    subscriptions: SubscriptionSet,
    live: Arc<AtomicBool>,
}

/// Exposes a key-value store to an inspector.
pub struct StoreBridge {
    store: Option<Arc<dyn KeyValueStore>>,
    default_db_path: Option<PathBuf>,
    on_error: ErrorCallback,
    state: BridgeState,
    session: Option<Session>,
}

impl StoreBridge {
    /// Bridge with default options: in-memory store, faults logged.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for StoreBridge.
    pub fn builder() -> StoreBridgeBuilder {
        StoreBridgeBuilder::new()
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == BridgeState::Active
    }

    /// Number of subscriptions held by the current activation.
    pub fn subscription_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.subscriptions.len())
    }

    /// The store this bridge exposes.
    ///
    /// A default store is created on first use and reused for the rest of
    /// the bridge's lifetime.
    pub fn store(&mut self) -> Result<Arc<dyn KeyValueStore>> {
        if let Some(store) = &self.store {
            return Ok(store.clone());
        }

        let store: Arc<dyn KeyValueStore> = match &self.default_db_path {
            Some(path) => {
                info!("Creating default SQLite store at {}", path.display());
                Arc::new(SqliteStore::open(path)?)
            }
            None => {
                debug!("Creating default in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        self.store = Some(store.clone());
        Ok(store)
    }

    /// Bind a handler for every method on `connection`.
    ///
    /// Fails if the bridge is not inactive. If a registration fails, the
    /// listeners registered so far are released and the bridge stays
    /// inactive.
    pub fn activate(&mut self, connection: Arc<dyn Connection>) -> Result<()> {
        if self.state != BridgeState::Inactive {
            return Err(StoreviewError::Lifecycle {
                expected: BridgeState::Inactive.as_str(),
                actual: self.state.as_str(),
            });
        }
        self.state = BridgeState::Activating;

        let store = match self.store() {
            Ok(store) => store,
            Err(e) => {
                self.state = BridgeState::Inactive;
                return Err(e);
            }
        };

        let live = Arc::new(AtomicBool::new(true));
        let dispatcher = Arc::new(Dispatcher::new(
            connection.clone(),
            self.on_error.clone(),
            live.clone(),
        ));

        let mut subscriptions = SubscriptionSet::new();
        for handler in handlers::registry(store) {
            let method = handler.method();
            match connection.add_listener(method.as_str(), dispatcher.listener(handler)) {
                Ok(subscription) => subscriptions.record(subscription),
                Err(e) => {
                    live.store(false, Ordering::Release);
                    subscriptions.release_all(&self.on_error);
                    self.state = BridgeState::Inactive;
                    return Err(e);
                }
            }
        }

        info!(
            "Storeview bridge active ({} methods bound)",
            subscriptions.len()
        );
        self.session = Some(Session {
            subscriptions,
            live,
        });
        self.state = BridgeState::Active;
        Ok(())
    }

    /// Release every subscription of the current activation.
    ///
    /// Handlers stop accepting requests before the first release. Release
    /// failures go to the error callback. Returns the number of failed
    /// releases; deactivating an inactive bridge does nothing.
    pub fn deactivate(&mut self) -> usize {
        let Some(mut session) = self.session.take() else {
            return 0;
        };
        self.state = BridgeState::Deactivating;
        session.live.store(false, Ordering::Release);

        let total = session.subscriptions.len();
        let failures = session.subscriptions.release_all(&self.on_error);

        self.state = BridgeState::Inactive;
        info!(
            "Storeview bridge inactive ({} of {} listeners released)",
            total - failures,
            total
        );
        failures
    }

    /// Methods the bridge binds on activation.
    pub fn methods() -> [Method; 3] {
        Method::ALL
    }
}

impl Default for StoreBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StoreBridge {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Builder for configuring a [`StoreBridge`].
///
/// # Example
///
/// ```rust,ignore
/// let bridge = StoreBridge::builder()
///     .store(SqliteStore::open("app.sqlite")?)
///     .error_handler(|err| tracing::warn!("inspector fault: {}", err))
///     .build();
/// ```
pub struct StoreBridgeBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    default_db_path: Option<PathBuf>,
    on_error: Option<ErrorCallback>,
}

impl StoreBridgeBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            default_db_path: None,
            on_error: None,
        }
    }

    /// Expose an externally owned store.
    pub fn store(mut self, store: impl KeyValueStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Expose a store shared with the host application.
    pub fn shared_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Back the default store with a SQLite database at `path`.
    ///
    /// Ignored when a store is supplied. Default: in-memory store.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_db_path = Some(path.into());
        self
    }

    /// Callback invoked for every handler and teardown fault.
    ///
    /// Default: faults are logged at error level.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&StoreviewError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> StoreBridge {
        StoreBridge {
            store: self.store,
            default_db_path: self.default_db_path,
            on_error: self.on_error.unwrap_or_else(log_errors),
            state: BridgeState::Inactive,
            session: None,
        }
    }
}

impl Default for StoreBridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
