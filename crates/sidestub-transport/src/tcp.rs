//! TCP transport, e.g. for a QEMU gdbstub socket

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::info;

use crate::error::TransportResult;
use crate::stream::StreamTransport;

/// Stream transport over a TCP connection
pub type TcpTransport = StreamTransport<OwnedReadHalf, OwnedWriteHalf>;

impl StreamTransport<OwnedReadHalf, OwnedWriteHalf> {
    /// Connect to `host:port`
    pub async fn connect(addr: &str) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!(addr = %addr, "TCP transport connected");

        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let target = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            stream.write_all(b"+").await.unwrap();
            buf
        });

        let transport = TcpTransport::connect(&addr.to_string()).await.unwrap();
        transport.write(b"$#00").await.unwrap();
        assert_eq!(transport.read_byte().await.unwrap(), b'+');

        assert_eq!(&target.await.unwrap(), b"$#00");

        // Peer hung up
        assert!(transport.read_byte().await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_sends_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = TcpTransport::connect(&addr.to_string()).await.unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();

        transport.shutdown().await.unwrap();

        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(std::time::Duration::from_millis(500), peer.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}
