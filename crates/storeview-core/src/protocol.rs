//! Inspector protocol types and framing.
//!
//! The bridge understands a fixed set of [`Method`]s. Each request carries
//! partial [`Params`]; each terminal response is either an [`AckPayload`] on
//! `ack:<method>` or an [`ErrorPayload`] on `error`.
//!
//! The reference TCP transport wraps every message in an [`Envelope`] and
//! frames it as:
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```

use crate::config::{ProtocolConfig, TransportConfig};
use crate::{Result, StoreviewError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Operations the bridge dispatches. Any other name is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    List,
    Write,
    Delete,
}

impl Method {
    /// Every method, in registration order.
    pub const ALL: [Method; 3] = [Method::List, Method::Write, Method::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::List => "list",
            Method::Write => "write",
            Method::Delete => "delete",
        }
    }

    /// Channel on which this method's acknowledgement is sent.
    pub fn ack_channel(&self) -> String {
        ProtocolConfig::ack_channel(self.as_str())
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request parameters. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Extract params from an arbitrary JSON payload.
    ///
    /// Missing, `null` or non-object payloads yield empty params, and a field
    /// that is not a string is treated as absent.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(String::from);
        Self {
            key: field("key"),
            value: field("value"),
        }
    }
}

/// One row of a `list` result: key and flattened value (`null` if unreadable).
pub type ListEntry = (String, Option<String>);

/// An inbound request, owned by the handler invocation it is passed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub method: Method,
    pub params: Params,
}

/// Successful response body: `{ "result": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckPayload {
    pub result: Value,
}

impl AckPayload {
    /// Build an acknowledgement, defaulting an absent result to `true`.
    pub fn from_result(result: Option<Value>) -> Self {
        Self {
            result: result.unwrap_or(Value::Bool(true)),
        }
    }
}

/// Transport-safe description of a fault: `{ "message": ..., "stack"?: ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorPayload {
    /// Serialize an error and its `source()` chain.
    ///
    /// The chain becomes the stack, one `caused by:` line per source. Errors
    /// without a source carry no stack.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut lines = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            lines.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        Self {
            message: err.to_string(),
            stack: if lines.is_empty() {
                None
            } else {
                Some(lines.join("\n"))
            },
        }
    }
}

/// A named message as carried by the reference TCP transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

impl Envelope {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Read a length-prefixed frame from an async reader.
///
/// Frame format: `[4-byte BE u32 length][payload bytes]`
///
/// Returns `None` on clean EOF (peer closed connection).
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;

    if len > TransportConfig::MAX_FRAME_SIZE {
        return Err(StoreviewError::Validation {
            field: "frame".to_string(),
            message: format!(
                "Frame size {} exceeds maximum {}",
                len,
                TransportConfig::MAX_FRAME_SIZE
            ),
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(payload))
}

/// Write a length-prefixed frame to an async writer.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| StoreviewError::Validation {
        field: "frame".to_string(),
        message: format!("Frame of {} bytes cannot be encoded", payload.len()),
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Encode and write one envelope.
pub async fn write_envelope<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
) -> Result<()> {
    let bytes = serde_json::to_vec(envelope)?;
    write_frame(writer, &bytes).await
}

/// Read and decode one envelope. Returns `None` on clean EOF.
pub async fn read_envelope<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Envelope>> {
    match read_frame(reader).await? {
        Some(frame) => Ok(Some(serde_json::from_slice(&frame)?)),
        None => Ok(None),
    }
}
