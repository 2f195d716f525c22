//! Request dispatch and terminal responses.
//!
//! Every inbound message for a bound method ends in exactly one terminal
//! action: an acknowledgement on `ack:<method>`, or an error payload on
//! `error` followed by the error callback.

use super::handlers::MethodHandler;
use crate::config::ProtocolConfig;
use crate::error::StoreviewError;
use crate::protocol::{AckPayload, ErrorPayload, Message, Method, Params};
use crate::transport::{Connection, Listener};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Caller-supplied fault sink. Invoked inline on the dispatching task.
pub type ErrorCallback = Arc<dyn Fn(&StoreviewError) + Send + Sync>;

/// Callback used when the host did not configure one.
pub fn log_errors() -> ErrorCallback {
    Arc::new(|err: &StoreviewError| error!("Storeview bridge fault: {}", err))
}

/// Runs the error callback when dropped.
///
/// Created before the error payload is sent, so the callback fires after
/// the send attempt however it ends: success, failure, or the send future
/// being dropped.
struct NotifyOnDrop<'a> {
    on_error: &'a ErrorCallback,
    fault: Option<StoreviewError>,
}

impl Drop for NotifyOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(fault) = self.fault.take() {
            (self.on_error)(&fault);
        }
    }
}

/// Binds handlers to a connection for one activation.
pub struct Dispatcher {
    connection: Arc<dyn Connection>,
    on_error: ErrorCallback,
    live: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(
        connection: Arc<dyn Connection>,
        on_error: ErrorCallback,
        live: Arc<AtomicBool>,
    ) -> Self {
        Self {
            connection,
            on_error,
            live,
        }
    }

    /// Wrap `handler` into a transport listener.
    pub fn listener(self: &Arc<Self>, handler: Arc<dyn MethodHandler>) -> Listener {
        let dispatcher = Arc::clone(self);
        Arc::new(move |payload: Value| {
            let dispatcher = dispatcher.clone();
            let handler = handler.clone();
            async move { dispatcher.dispatch(handler.as_ref(), payload).await }.boxed()
        })
    }

    /// Run one request through `handler` and send its terminal response.
    pub async fn dispatch(&self, handler: &dyn MethodHandler, payload: Value) {
        let method = handler.method();
        if !self.live.load(Ordering::Acquire) {
            debug!("Bridge inactive, dropping {} request", method);
            return;
        }

        let message = Message {
            method,
            params: Params::from_value(&payload),
        };
        debug!("Dispatching {} with {:?}", method, message.params);

        let outcome = AssertUnwindSafe(handler.handle(message))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(result)) => self.acknowledge(method, result).await,
            Ok(Err(err)) => self.report(err).await,
            Err(panic) => {
                self.report(StoreviewError::HandlerPanic {
                    method: method.to_string(),
                    message: panic_message(panic.as_ref()),
                })
                .await
            }
        }
    }

    /// Send the acknowledgement for `method`, defaulting the result to `true`.
    async fn acknowledge(&self, method: Method, result: Option<Value>) {
        let ack = AckPayload::from_result(result);
        let body = match serde_json::to_value(&ack) {
            Ok(body) => body,
            Err(e) => return self.report(e.into()).await,
        };

        if let Err(e) = self.connection.send(&method.ack_channel(), body).await {
            warn!("Failed to acknowledge {}: {}", method, e);
            (self.on_error)(&e);
        }
    }

    /// Send `fault` on the error channel, then hand it to the error callback.
    async fn report(&self, fault: StoreviewError) {
        let payload = ErrorPayload::from_error(&fault);
        let notice = NotifyOnDrop {
            on_error: &self.on_error,
            fault: Some(fault),
        };

        match serde_json::to_value(&payload) {
            Ok(body) => {
                if let Err(e) = self
                    .connection
                    .send(ProtocolConfig::ERROR_CHANNEL, body)
                    .await
                {
                    warn!("Failed to send error payload: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode error payload: {}", e),
        }

        drop(notice);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
