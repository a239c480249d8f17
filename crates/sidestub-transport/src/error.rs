//! Transport error types

use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transport not available in this build: {0}")]
    Unsupported(String),
}

impl TransportError {
    /// Closure is the expected way for a link to end
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
