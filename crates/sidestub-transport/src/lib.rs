//! Side-stub Transport Layer
//!
//! Byte transports the session engine runs on:
//! - Serial: a UART device such as `/dev/ttyUSB0` (optional feature)
//! - TCP: a socket such as a QEMU gdbstub (optional feature)
//! - Stream: any tokio `AsyncRead`/`AsyncWrite` pair, used for in-memory links
//!
//! Every transport reads one byte at a time, writes whole buffers, and can
//! be closed from any task. Closing wakes a pending `read_byte`, which then
//! fails with [`TransportError::Closed`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

pub mod error;
pub mod signal;
pub mod stream;
#[cfg(feature = "tcp")]
pub mod tcp;
#[cfg(feature = "serial")]
pub mod serial;

pub use error::{TransportError, TransportResult};
pub use stream::StreamTransport;
#[cfg(feature = "tcp")]
pub use tcp::TcpTransport;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;

/// A bidirectional byte link to the target
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read the next byte, waiting until one arrives.
    ///
    /// Fails with [`TransportError::Closed`] on end of stream or after
    /// [`Transport::close`].
    async fn read_byte(&self) -> TransportResult<u8>;

    /// Write the whole buffer and flush it.
    async fn write(&self, bytes: &[u8]) -> TransportResult<()>;

    /// Close the link. Idempotent.
    fn close(&self);

    /// Close the link and wait until the underlying handle is released,
    /// so the far end observes end of stream.
    async fn shutdown(&self) -> TransportResult<()> {
        self.close();
        Ok(())
    }

    fn is_closed(&self) -> bool;
}

/// Serial port settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SerialOptions {
    pub baud_rate: u32,
    /// How often the reader thread checks whether the port was closed
    pub poll_interval_ms: u64,
}

impl Default for SerialOptions {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            poll_interval_ms: 50,
        }
    }
}

/// Where to find the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `tcp:<host>:<port>` or `<host>:<port>`
    Tcp(String),
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`
    Serial(String),
}

impl FromStr for Address {
    type Err = TransportError;

    fn from_str(s: &str) -> TransportResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TransportError::InvalidAddress("empty address".into()));
        }

        if let Some(rest) = s.strip_prefix("tcp:") {
            return match rest.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    Ok(Address::Tcp(rest.to_string()))
                }
                _ => Err(TransportError::InvalidAddress(format!(
                    "expected tcp:<host>:<port>, got {}",
                    s
                ))),
            };
        }

        if let Some(rest) = s.strip_prefix("serial:") {
            return Ok(Address::Serial(rest.to_string()));
        }

        // host:port without a scheme
        if !s.starts_with('/') {
            if let Some((host, port)) = s.rsplit_once(':') {
                if !host.is_empty() && port.parse::<u16>().is_ok() {
                    return Ok(Address::Tcp(s.to_string()));
                }
            }
        }

        Ok(Address::Serial(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp(addr) => write!(f, "tcp:{}", addr),
            Address::Serial(path) => write!(f, "{}", path),
        }
    }
}

/// Open a transport for the given address
pub async fn open(address: &Address, serial: &SerialOptions) -> TransportResult<Arc<dyn Transport>> {
    match address {
        #[cfg(feature = "tcp")]
        Address::Tcp(addr) => Ok(Arc::new(TcpTransport::connect(addr).await?)),
        #[cfg(feature = "serial")]
        Address::Serial(path) => Ok(Arc::new(SerialTransport::open(path, serial)?)),
        #[allow(unreachable_patterns)]
        other => {
            let _ = serial;
            Err(TransportError::Unsupported(other.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_addresses() {
        assert_eq!(
            "tcp:localhost:1234".parse::<Address>().unwrap(),
            Address::Tcp("localhost:1234".into())
        );
        assert_eq!(
            "127.0.0.1:1234".parse::<Address>().unwrap(),
            Address::Tcp("127.0.0.1:1234".into())
        );
        assert!("tcp:localhost".parse::<Address>().is_err());
    }

    #[test]
    fn test_parse_serial_addresses() {
        assert_eq!(
            "/dev/ttyUSB0".parse::<Address>().unwrap(),
            Address::Serial("/dev/ttyUSB0".into())
        );
        assert_eq!("COM3".parse::<Address>().unwrap(), Address::Serial("COM3".into()));
        assert_eq!(
            "serial:/dev/tty1".parse::<Address>().unwrap(),
            Address::Serial("/dev/tty1".into())
        );
        assert!("  ".parse::<Address>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::Tcp("localhost:1234".into()).to_string(), "tcp:localhost:1234");
        assert_eq!(Address::Serial("/dev/tty1".into()).to_string(), "/dev/tty1");
    }
}
