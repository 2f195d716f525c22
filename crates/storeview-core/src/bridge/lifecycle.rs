//! Bridge lifecycle state and subscription teardown.

use super::dispatcher::ErrorCallback;
use crate::error::StoreviewError;
use crate::transport::Subscription;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Lifecycle of a [`StoreBridge`](super::StoreBridge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    #[default]
    Inactive,
    Activating,
    Active,
    Deactivating,
}

impl BridgeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeState::Inactive => "inactive",
            BridgeState::Activating => "activating",
            BridgeState::Active => "active",
            BridgeState::Deactivating => "deactivating",
        }
    }
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscriptions recorded during one activation.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every recorded subscription.
    ///
    /// Each release is isolated: a failure (or panic) is passed to
    /// `on_error` and the remaining subscriptions are still released. The
    /// set is empty afterwards. Returns the number of failed releases.
    pub fn release_all(&mut self, on_error: &ErrorCallback) -> usize {
        let mut failures = 0;

        for subscription in self.subscriptions.drain(..) {
            let name = subscription.name().to_string();
            let outcome = catch_unwind(AssertUnwindSafe(|| subscription.remove()))
                .unwrap_or_else(|_| {
                    Err(StoreviewError::Unsubscribe {
                        method: name.clone(),
                        message: "release panicked".to_string(),
                    })
                });

            match outcome {
                Ok(()) => debug!("Released {} listener", name),
                Err(e) => {
                    failures += 1;
                    warn!("Failed to release {} listener: {}", name, e);
                    on_error(&e);
                }
            }
        }

        failures
    }
}
