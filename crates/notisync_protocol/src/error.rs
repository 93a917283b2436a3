//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding frames.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame is not valid JSON or does not match the expected shape.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame is valid JSON but is not a `{type, data}` envelope.
    #[error("invalid frame structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// The `type` discriminator names no known event.
    #[error("unknown frame type: {type_name}")]
    UnknownType {
        /// The unrecognized discriminator.
        type_name: String,
    },
}

impl ProtocolError {
    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }
}
