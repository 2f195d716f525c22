//! Listener bookkeeping shared by the bundled transports.

use super::{Listener, Subscription};
use crate::error::{Result, StoreviewError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type ListenerMap = HashMap<String, Vec<(u64, Listener)>>;

/// Name-keyed listener table.
///
/// Subscriptions hold only a weak reference, so releasing one after the
/// registry is gone is a no-op.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Arc<Mutex<ListenerMap>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return the subscription that removes it.
    pub fn add(&self, name: &str, listener: Listener) -> Result<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners)?
            .entry(name.to_string())
            .or_default()
            .push((id, listener));

        let table = Arc::downgrade(&self.listeners);
        let key = name.to_string();
        Ok(Subscription::new(name, move || remove(&table, &key, id)))
    }

    /// Snapshot of the listeners for `name`, in registration order.
    ///
    /// The table lock is released before the caller runs any listener.
    pub fn listeners_for(&self, name: &str) -> Result<Vec<Listener>> {
        Ok(lock(&self.listeners)?
            .get(name)
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default())
    }

    /// Number of listeners currently registered for `name`.
    pub fn count(&self, name: &str) -> usize {
        lock(&self.listeners)
            .map(|table| table.get(name).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Total number of registered listeners.
    pub fn total(&self) -> usize {
        lock(&self.listeners)
            .map(|table| table.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

fn lock(listeners: &Mutex<ListenerMap>) -> Result<MutexGuard<'_, ListenerMap>> {
    listeners.lock().map_err(|e| StoreviewError::Transport {
        message: format!("Failed to lock listener table: {}", e),
    })
}

fn remove(table: &Weak<Mutex<ListenerMap>>, name: &str, id: u64) -> Result<()> {
    let Some(listeners) = table.upgrade() else {
        return Ok(());
    };
    let mut table = lock(&listeners)?;
    if let Some(entries) = table.get_mut(name) {
        entries.retain(|(entry_id, _)| *entry_id != id);
        if entries.is_empty() {
            table.remove(name);
        }
    }
    Ok(())
}
