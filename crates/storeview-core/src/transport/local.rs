//! In-process transport.
//!
//! [`LocalConnection`] plays the host side of the channel; the paired
//! receiver returned by [`LocalConnection::new`] plays the inspector side and
//! observes every message the host sends.

use super::{Connection, Listener, ListenerRegistry, Subscription};
use crate::error::{Result, StoreviewError};
use crate::protocol::Envelope;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Host side of an in-process channel.
#[derive(Clone)]
pub struct LocalConnection {
    registry: Arc<ListenerRegistry>,
    outbox: mpsc::UnboundedSender<Envelope>,
}

impl LocalConnection {
    /// Create a connection and the receiver that observes its outbound messages.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        (
            Self {
                registry: Arc::new(ListenerRegistry::new()),
                outbox,
            },
            inbox,
        )
    }

    /// Deliver an inbound message to every listener registered for `name`.
    ///
    /// Listeners run one after another and are awaited to completion.
    /// Returns how many listeners ran.
    pub async fn deliver(&self, name: &str, params: Value) -> usize {
        let listeners = match self.registry.listeners_for(name) {
            Ok(listeners) => listeners,
            Err(e) => {
                debug!("Dropping local message {}: {}", name, e);
                return 0;
            }
        };

        if listeners.is_empty() {
            debug!("No listener for local message {}", name);
        }

        for listener in &listeners {
            listener(params.clone()).await;
        }
        listeners.len()
    }

    /// Number of listeners currently registered for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.registry.count(name)
    }

    /// Total number of registered listeners.
    pub fn total_listeners(&self) -> usize {
        self.registry.total()
    }
}

#[async_trait::async_trait]
impl Connection for LocalConnection {
    fn add_listener(&self, name: &str, listener: Listener) -> Result<Subscription> {
        self.registry.add(name, listener)
    }

    async fn send(&self, name: &str, payload: Value) -> Result<()> {
        self.outbox
            .send(Envelope::new(name, payload))
            .map_err(|_| StoreviewError::NotConnected)
    }
}
