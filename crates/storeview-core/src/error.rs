//! Error types for Storeview.
//!
//! Every fault the bridge can observe is expressed as a [`StoreviewError`].
//! Faults raised while handling an inspector request are converted into an
//! [`ErrorPayload`](crate::protocol::ErrorPayload) before they leave the process.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Storeview library.
#[derive(Debug, Error)]
pub enum StoreviewError {
    // Store errors
    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("No inspector connected")]
    NotConnected,

    #[error("Failed to release subscription for {method}: {message}")]
    Unsubscribe { method: String, message: String },

    #[error("Inspector reported an error: {message}")]
    Remote {
        message: String,
        stack: Option<String>,
    },

    // Bridge lifecycle errors
    #[error("Invalid bridge state: expected {expected}, found {actual}")]
    Lifecycle {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Handler for {method} panicked: {message}")]
    HandlerPanic { method: String, message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Storeview operations.
pub type Result<T> = std::result::Result<T, StoreviewError>;

impl From<std::io::Error> for StoreviewError {
    fn from(err: std::io::Error) -> Self {
        StoreviewError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for StoreviewError {
    fn from(err: serde_json::Error) -> Self {
        StoreviewError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for StoreviewError {
    fn from(err: rusqlite::Error) -> Self {
        StoreviewError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl StoreviewError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        StoreviewError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a transport error from any displayable cause.
    pub fn transport(message: impl std::fmt::Display) -> Self {
        StoreviewError::Transport {
            message: message.to_string(),
        }
    }
}
