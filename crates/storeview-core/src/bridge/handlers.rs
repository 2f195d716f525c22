//! Method handlers for `list`, `write` and `delete`.
//!
//! Handlers only touch the store. Missing parameters produce a `false`
//! result; only store failures surface as errors.

use super::normalize::read_normalized;
use crate::error::Result;
use crate::protocol::{ListEntry, Message, Method};
use crate::store::KeyValueStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Logic bound to a single method name.
///
/// Each invocation receives its own [`Message`]. A handler returns
/// `Ok(None)` when it has no explicit result; the acknowledgement then
/// carries `true`.
#[async_trait::async_trait]
pub trait MethodHandler: Send + Sync {
    fn method(&self) -> Method;

    async fn handle(&self, message: Message) -> Result<Option<Value>>;
}

/// Build the handler set for every known method, in [`Method::ALL`] order.
pub fn registry(store: Arc<dyn KeyValueStore>) -> Vec<Arc<dyn MethodHandler>> {
    Method::ALL
        .into_iter()
        .map(|method| handler_for(method, store.clone()))
        .collect()
}

/// The handler bound to `method`.
pub fn handler_for(method: Method, store: Arc<dyn KeyValueStore>) -> Arc<dyn MethodHandler> {
    match method {
        Method::List => Arc::new(ListHandler { store }),
        Method::Write => Arc::new(WriteHandler { store }),
        Method::Delete => Arc::new(DeleteHandler { store }),
    }
}

/// Every key with its flattened value, in store order.
pub fn list_entries(store: &dyn KeyValueStore) -> Result<Vec<ListEntry>> {
    store
        .keys()?
        .into_iter()
        .map(|key| {
            let value = read_normalized(store, &key)?;
            Ok((key, value))
        })
        .collect()
}

pub struct ListHandler {
    store: Arc<dyn KeyValueStore>,
}

#[async_trait::async_trait]
impl MethodHandler for ListHandler {
    fn method(&self) -> Method {
        Method::List
    }

    async fn handle(&self, _message: Message) -> Result<Option<Value>> {
        let entries = list_entries(self.store.as_ref())?;
        debug!("Listing {} entries", entries.len());
        Ok(Some(serde_json::to_value(entries)?))
    }
}

pub struct WriteHandler {
    store: Arc<dyn KeyValueStore>,
}

#[async_trait::async_trait]
impl MethodHandler for WriteHandler {
    fn method(&self) -> Method {
        Method::Write
    }

    async fn handle(&self, message: Message) -> Result<Option<Value>> {
        let (Some(key), Some(value)) = (message.params.key, message.params.value) else {
            debug!("write without key or value, ignoring");
            return Ok(Some(Value::Bool(false)));
        };

        self.store.set_string(&key, &value)?;
        Ok(Some(Value::Bool(true)))
    }
}

pub struct DeleteHandler {
    store: Arc<dyn KeyValueStore>,
}

#[async_trait::async_trait]
impl MethodHandler for DeleteHandler {
    fn method(&self) -> Method {
        Method::Delete
    }

    async fn handle(&self, message: Message) -> Result<Option<Value>> {
        let Some(key) = message.params.key else {
            debug!("delete without key, ignoring");
            return Ok(Some(Value::Bool(false)));
        };

        self.store.remove(&key)?;
        Ok(Some(Value::Bool(true)))
    }
}
