//! Error types for sinks.

use thiserror::Error;

/// Errors that can occur when writing a snapshot to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing to the file or socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot could not be serialized.
    #[error("Failed to encode snapshot: {0}")]
    Encode(String),

    /// The target address could not be resolved.
    #[error("Invalid address '{0}'")]
    Address(String),
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            SinkError::Io(err.into())
        } else {
            SinkError::Encode(err.to_string())
        }
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for SinkError {
    fn from(err: minicbor::encode::Error<E>) -> Self {
        SinkError::Encode(err.to_string())
    }
}
