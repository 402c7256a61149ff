//! Error types for the URP client.

use std::time::Duration;

use thiserror::Error;

use crate::types::UnoException;

/// Errors that can occur while talking URP to an office process.
#[derive(Debug, Error)]
pub enum UrpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {addr} timed out after {}s", .timeout.as_secs())]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("marshaling error: {0}")]
    Marshal(String),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("remote raised {0}")]
    Remote(UnoException),

    #[error("cache miss: {0}")]
    Cache(String),

    #[error("unknown type class: {0}")]
    UnknownTypeClass(u8),

    #[error("{0}() returned a null reference")]
    NullReference(&'static str),

    #[error("object does not implement {0}")]
    Unsupported(String),
}

impl UrpError {
    /// The remote exception behind this error, if the server raised one.
    pub fn remote_exception(&self) -> Option<&UnoException> {
        match self {
            UrpError::Remote(exc) => Some(exc),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, UrpError>;
