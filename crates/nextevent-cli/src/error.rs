//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that end the `nextevent` process.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing, unreadable or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] nextevent_auth::AuthError),

    #[error(transparent)]
    Server(#[from] nextevent_server::ServerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_message() {
        let err = ClientError::config("client_id is required");
        assert_eq!(err.to_string(), "configuration error: client_id is required");
    }

    #[test]
    fn wraps_auth_errors() {
        let err: ClientError = nextevent_auth::AuthError::network("connection refused").into();
        assert!(matches!(err, ClientError::Auth(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn wraps_io_errors() {
        let err: ClientError = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy").into();
        assert!(matches!(err, ClientError::Io(_)));
    }
}
