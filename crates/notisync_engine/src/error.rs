//! Error types for the notification engine.

use notisync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for engine operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors that can occur in the notification engine.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Protocol error (malformed frame or body).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server rejected the credential (HTTP 401/403 or push handshake).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No bearer token is currently available.
    #[error("no credential available")]
    MissingCredential,

    /// Server returned an error status.
    #[error("server error ({status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Invalid endpoint URL.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session owning this component has been torn down.
    #[error("session closed")]
    SessionClosed,
}

impl NotifyError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Transport { retryable, .. } => *retryable,
            NotifyError::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the server rejected the credential.
    ///
    /// A missing credential is not a rejection; there is nothing to refresh.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, NotifyError::AuthenticationFailed(_))
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return NotifyError::transport_fatal(format!("invalid response body: {err}"));
        }
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                NotifyError::AuthenticationFailed(err.to_string())
            }
            Some(status) => NotifyError::ServerError {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => NotifyError::transport_retryable(err.to_string()),
        }
    }
}
