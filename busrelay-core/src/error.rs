//! Failure taxonomy for relay operations
//!
//! A missing connector configuration is not represented here: absence is
//! normalized to empty strings by the config store.

use thiserror::Error;

/// Errors surfaced by the relay service and its collaborators
#[derive(Error, Debug)]
pub enum RelayError {
    /// Malformed connection string or unreachable transport target
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single message does not fit into an empty batch
    #[error("Message too big to fit in a batch ({size} bytes, limit {max} bytes)")]
    MessageTooLarge { size: usize, max: usize },

    /// Failure while sending a batch that was already accepted
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failure while reading or writing connector configuration
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Request envelope could not be interpreted
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RelayError {
    /// Stable identifier used in response bodies and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Connection(_) => "connection_error",
            RelayError::MessageTooLarge { .. } => "message_too_large",
            RelayError::Transport(_) => "transport_error",
            RelayError::Persistence(_) => "persistence_error",
            RelayError::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Status code reported in the response envelope
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::InvalidRequest(_) => 400,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Persistence(err.to_string())
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
