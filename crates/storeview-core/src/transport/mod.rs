//! Message channel between the host process and an inspector.
//!
//! The bridge only needs two primitives from a transport: registering a
//! listener for a message name (which yields a [`Subscription`]) and sending
//! a named payload. Two transports ship with the crate:
//!
//! - **Local**: in-process channel, used for embedding and tests
//! - **TCP**: length-prefixed JSON frames over `127.0.0.1`, with a matching
//!   [`InspectorClient`]

pub mod client;
pub mod local;
mod registry;
pub mod server;

pub use client::InspectorClient;
pub use local::LocalConnection;
pub use registry::ListenerRegistry;
pub use server::TcpTransport;

use crate::error::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Callback invoked with the params of each matching inbound message.
pub type Listener = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Transport-side removal of a single listener.
pub trait Unsubscribe: Send {
    fn unsubscribe(self: Box<Self>) -> Result<()>;
}

impl<F> Unsubscribe for F
where
    F: FnOnce() -> Result<()> + Send,
{
    fn unsubscribe(self: Box<Self>) -> Result<()> {
        (*self)()
    }
}

/// Handle for one registered listener.
///
/// Holds the sole right to unregister the listener. [`Subscription::remove`]
/// consumes the handle, so a listener can be released at most once.
pub struct Subscription {
    name: String,
    handle: Box<dyn Unsubscribe>,
}

impl Subscription {
    pub fn new(name: impl Into<String>, handle: impl Unsubscribe + 'static) -> Self {
        Self {
            name: name.into(),
            handle: Box::new(handle),
        }
    }

    /// Message name this subscription listens to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unregister the listener.
    pub fn remove(self) -> Result<()> {
        self.handle.unsubscribe()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A bidirectional, named-message channel.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Register `listener` for messages named `name`.
    fn add_listener(&self, name: &str, listener: Listener) -> Result<Subscription>;

    /// Send `payload` under `name` to the remote side.
    async fn send(&self, name: &str, payload: Value) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreviewError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscription_remove_runs_handle_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = Subscription::new("list", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(sub.name(), "list");
        sub.remove().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_remove_reports_failure() {
        let sub = Subscription::new("write", || Err(StoreviewError::Other("gone".into())));
        assert!(sub.remove().is_err());
    }
}
