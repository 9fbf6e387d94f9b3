//! Error types for the credential lifecycle.
//!
//! Every failure is classified by an [`AuthErrorCode`]. The code decides how
//! callers react: an interactive login turns any failure into a redirect to
//! the error page, while the refresh supervisor only retries
//! [`AuthErrorCode::NetworkFailure`].

use std::fmt;
use thiserror::Error;

/// The category of an authentication error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    /// The token endpoint could not be reached (DNS, connect, timeout, body read).
    NetworkFailure,
    /// The token endpoint answered with a non-success status.
    ProviderRejected,
    /// The token endpoint answered 2xx but the body was not a usable token set.
    DecodeFailure,
    /// Reading or writing the persisted credential failed.
    PersistenceFailure,
    /// The operation cannot run with the current configuration or state,
    /// e.g. a refresh without a refresh token.
    Configuration,
}

impl AuthErrorCode {
    /// Returns true if the failure may go away on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkFailure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkFailure => "network_failure",
            Self::ProviderRejected => "provider_rejected",
            Self::DecodeFailure => "decode_failure",
            Self::PersistenceFailure => "persistence_failure",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while exchanging, storing, or persisting credentials.
#[derive(Debug, Error)]
pub struct AuthError {
    code: AuthErrorCode,
    message: String,
    /// HTTP status returned by the provider, when there was one.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AuthError {
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::NetworkFailure, message)
    }

    /// Creates a rejection error carrying the provider's HTTP status.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(AuthErrorCode::ProviderRejected, message);
        err.status = Some(status);
        err
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::DecodeFailure, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::PersistenceFailure, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::Configuration, message)
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> AuthErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

/// A specialized Result type for credential operations.
pub type AuthResult<T> = Result<T, AuthError>;
