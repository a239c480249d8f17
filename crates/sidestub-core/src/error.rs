//! Error types for the session engine

use std::time::Duration;

use sidestub_protocol::ProtocolError;
use sidestub_transport::TransportError;
use thiserror::Error;

/// Session error types
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("No reply within {0:?}")]
    CommandTimeout(Duration),

    #[error("Session closed")]
    SessionClosed,

    #[error("Target returned error code 0x{0:02x}")]
    RemoteError(u8),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Result type alias for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;
