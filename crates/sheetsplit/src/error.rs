//! Error types for a conversion run.

use std::path::PathBuf;

use sheetsplit_urp::{UnoException, UrpError};
use thiserror::Error;

/// Every failure aborts the run. The variant says which stage failed.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("cannot reach office process at {host}:{port}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: UrpError,
    },

    #[error("cannot open {}", .path.display())]
    DocumentOpen {
        path: PathBuf,
        #[source]
        source: UrpError,
    },

    #[error("document is in an unexpected state while {action}")]
    DocumentState {
        action: String,
        #[source]
        source: UrpError,
    },

    #[error("failed to export sheet {sheet:?} to {}", .target.display())]
    Export {
        sheet: String,
        target: PathBuf,
        #[source]
        source: UrpError,
    },
}

impl ConvertError {
    pub(crate) fn state(action: impl Into<String>, source: UrpError) -> Self {
        ConvertError::DocumentState {
            action: action.into(),
            source,
        }
    }

    /// Short name of the failed stage, for user-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            ConvertError::Connection { .. } => "connection",
            ConvertError::DocumentOpen { .. } => "document open",
            ConvertError::DocumentState { .. } => "document state",
            ConvertError::Export { .. } => "export",
        }
    }

    /// The exception the office process raised, if that is what failed.
    pub fn remote_exception(&self) -> Option<&UnoException> {
        self.urp_error().remote_exception()
    }

    fn urp_error(&self) -> &UrpError {
        match self {
            ConvertError::Connection { source, .. }
            | ConvertError::DocumentOpen { source, .. }
            | ConvertError::DocumentState { source, .. }
            | ConvertError::Export { source, .. } => source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
