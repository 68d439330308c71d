//! Error types for rrc-remote
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use crate::daw::protocol::ProtocolError;
use thiserror::Error;

/// Main error type for rrc-remote
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors detected after loading
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by rrc-common (config loading, validation)
    #[error(transparent)]
    Common(#[from] rrc_common::Error),

    /// DAW unreachable or answered with a non-success status
    #[error("DAW error: {0}")]
    Daw(String),

    /// DAW answered with something we could not interpret
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A transition is already in flight
    #[error("Busy: {0}")]
    Busy(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// MIDI input errors
    #[error("MIDI error: {0}")]
    Midi(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e.to_string())
    }
}

impl Error {
    /// Collapse rrc-common's lookup/validation errors onto ours
    ///
    /// Handlers map on our variants only.
    pub fn normalized(self) -> Self {
        match self {
            Error::Common(rrc_common::Error::NotFound(msg)) => Error::NotFound(msg),
            Error::Common(rrc_common::Error::InvalidInput(msg)) => Error::InvalidInput(msg),
            other => other,
        }
    }
}

/// Convenience Result type using rrc-remote Error
pub type Result<T> = std::result::Result<T, Error>;
