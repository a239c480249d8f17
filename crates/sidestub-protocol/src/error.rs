//! Protocol error types

use thiserror::Error;

/// Protocol-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Frame too long: payload exceeded {max} bytes without a terminator")]
    FrameTooLong { max: usize },

    #[error("Protocol violation: unexpected byte 0x{byte:02x} outside of a frame")]
    ProtocolViolation { byte: u8 },

    #[error("Checksum mismatch: expected {expected}, received {received}")]
    ChecksumMismatch { expected: String, received: String },

    #[error("Invalid hex data: {0}")]
    InvalidHex(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
