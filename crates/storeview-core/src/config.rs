//! Centralized configuration for Storeview.
//!
//! Channel naming of the inspector protocol, transport limits and store
//! defaults.

use std::time::Duration;

/// Channel names used on the inspector message channel.
pub struct ProtocolConfig;

impl ProtocolConfig {
    /// Acknowledgements are sent on `ack:<method>`.
    pub const ACK_PREFIX: &'static str = "ack:";
    /// Serialized handler faults are sent here.
    pub const ERROR_CHANNEL: &'static str = "error";

    /// Channel on which the acknowledgement for `method` is sent.
    pub fn ack_channel(method: &str) -> String {
        format!("{}{}", Self::ACK_PREFIX, method)
    }
}

/// Configuration for the reference TCP transport.
pub struct TransportConfig;

impl TransportConfig {
    /// Maximum accepted frame payload (1 MiB).
    pub const MAX_FRAME_SIZE: usize = 1_048_576;
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    /// How long the inspector client waits for an acknowledgement.
    pub const CALL_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
}

/// Configuration for the SQLite store.
pub struct StoreConfig;

impl StoreConfig {
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
}
