//! TCP inspector client.
//!
//! Connects to a host's [`TcpTransport`](super::TcpTransport) and issues
//! bridge requests. Responses are matched by channel name: the
//! acknowledgement for `write` arrives on `ack:write`, faults arrive on
//! `error`. At most one request is in flight per client.

use crate::config::{ProtocolConfig, TransportConfig};
use crate::error::{Result, StoreviewError};
use crate::protocol::{
    read_envelope, write_envelope, AckPayload, Envelope, ErrorPayload, ListEntry, Method, Params,
};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Inspector-side connection to a host.
#[derive(Debug)]
pub struct InspectorClient {
    stream: Mutex<TcpStream>,
    addr: SocketAddr,
}

impl InspectorClient {
    /// Connect to a host, giving up after `TransportConfig::CONNECT_TIMEOUT`.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let connecting = TcpStream::connect(addr);
        let stream = tokio::time::timeout(TransportConfig::CONNECT_TIMEOUT, connecting)
            .await
            .map_err(|_| StoreviewError::transport(format!("Timed out connecting to {}", addr)))?
            .map_err(|e| {
                StoreviewError::transport(format!("Failed to connect to {}: {}", addr, e))
            })?;

        debug!("Inspector client connected to {}", addr);

        Ok(Self {
            stream: Mutex::new(stream),
            addr,
        })
    }

    /// Issue `method` and wait for its acknowledgement.
    ///
    /// Returns the `result` field of the acknowledgement, or
    /// [`StoreviewError::Remote`] if the host reported a fault.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let ack_channel = ProtocolConfig::ack_channel(method);
        let mut stream = self.stream.lock().await;
        let (mut reader, mut writer) = stream.split();

        write_envelope(&mut writer, &Envelope::new(method, params)).await?;

        tokio::time::timeout(
            TransportConfig::CALL_TIMEOUT,
            read_response(&mut reader, &ack_channel),
        )
        .await
        .map_err(|_| StoreviewError::transport(format!("No acknowledgement for {}", method)))?
    }

    /// All entries of the host's store, values flattened to strings.
    pub async fn list(&self) -> Result<Vec<ListEntry>> {
        let result = self.call(Method::List.as_str(), Value::Null).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Write `value` under `key`. Returns the host's result.
    pub async fn write(&self, key: &str, value: &str) -> Result<bool> {
        let params = Params::new().with_key(key).with_value(value);
        self.call_bool(Method::Write, params).await
    }

    /// Delete `key`. Returns the host's result.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.call_bool(Method::Delete, Params::new().with_key(key)).await
    }

    async fn call_bool(&self, method: Method, params: Params) -> Result<bool> {
        let result = self.call(method.as_str(), serde_json::to_value(params)?).await?;
        result.as_bool().ok_or_else(|| StoreviewError::Validation {
            field: "result".to_string(),
            message: format!("Expected a boolean result for {}, got {}", method, result),
        })
    }

    /// Get the address of the connected host.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Read until the acknowledgement on `ack_channel` or an error payload arrives.
async fn read_response<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    ack_channel: &str,
) -> Result<Value> {
    loop {
        let envelope = read_envelope(reader)
            .await?
            .ok_or_else(|| StoreviewError::transport("Host closed the connection"))?;

        if envelope.name == ack_channel {
            let ack: AckPayload = serde_json::from_value(envelope.params)?;
            return Ok(ack.result);
        }
        if envelope.name == ProtocolConfig::ERROR_CHANNEL {
            let payload: ErrorPayload = serde_json::from_value(envelope.params)?;
            return Err(StoreviewError::Remote {
                message: payload.message,
                stack: payload.stack,
            });
        }
        debug!("Skipping unrelated message {}", envelope.name);
    }
}
