//! Server error types.

use std::io;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (listener, status file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The calendar API failed or returned something unusable.
    #[error("Calendar error: {message}")]
    Calendar {
        message: String,
        status: Option<u16>,
    },

    /// The calendar API rejected the access token.
    #[error("Calendar API rejected the access token")]
    Unauthenticated,

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    pub fn calendar(message: impl Into<String>) -> Self {
        Self::Calendar {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a calendar error for a non-success HTTP status.
    pub fn calendar_status(status: u16, message: impl Into<String>) -> Self {
        Self::Calendar {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
