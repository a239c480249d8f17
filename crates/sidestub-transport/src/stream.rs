//! Transport over any tokio stream pair

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{TransportError, TransportResult};
use crate::signal::CloseSignal;
use crate::Transport;

/// Byte transport over a read half and a write half.
///
/// Reads go through a buffer so single-byte reads stay cheap. The write
/// half is released on close so the peer sees end of stream.
pub struct StreamTransport<R, W> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<Option<W>>,
    closed: CloseSignal,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(Some(writer)),
            closed: CloseSignal::new(),
        }
    }
}

impl StreamTransport<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>> {
    /// An in-memory link. Returns the transport and the far end of the pipe,
    /// which plays the part of the target.
    pub fn pair(capacity: usize) -> (Self, DuplexStream) {
        let (near, far) = tokio::io::duplex(capacity);
        let (reader, writer) = tokio::io::split(near);
        (Self::new(reader, writer), far)
    }
}

/// Shut down a released write half in the background, or just drop it
/// when no runtime is around.
fn release<W>(mut writer: W)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = writer.shutdown().await {
                    debug!(error = %e, "Write half shutdown failed");
                }
            });
        }
        Err(_) => drop(writer),
    }
}

#[async_trait]
impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn read_byte(&self) -> TransportResult<u8> {
        if self.closed.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut reader = self.reader.lock().await;
        tokio::select! {
            result = reader.read_u8() => match result {
                Ok(byte) => {
                    trace!(byte = %(byte as char).escape_default(), "rx");
                    Ok(byte)
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(TransportError::Closed),
                Err(e) => Err(TransportError::Io(e)),
            },
            _ = self.closed.closed() => Err(TransportError::Closed),
        }
    }

    async fn write(&self, bytes: &[u8]) -> TransportResult<()> {
        if self.closed.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut guard = self.writer.lock().await;
        if self.closed.is_closed() {
            if let Some(writer) = guard.take() {
                release(writer);
            }
            return Err(TransportError::Closed);
        }
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    fn close(&self) {
        if !self.closed.close() {
            return;
        }
        // A write in progress releases the half itself once it sees the flag
        if let Ok(mut guard) = self.writer.try_lock() {
            if let Some(writer) = guard.take() {
                release(writer);
            }
        }
    }

    async fn shutdown(&self) -> TransportResult<()> {
        self.closed.close();
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            writer.shutdown().await?;
            debug!("Write half shut down");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_read_and_write() {
        let (transport, mut target) = StreamTransport::pair(64);

        target.write_all(b"$OK").await.unwrap();
        assert_eq!(transport.read_byte().await.unwrap(), b'$');
        assert_eq!(transport.read_byte().await.unwrap(), b'O');
        assert_eq!(transport.read_byte().await.unwrap(), b'K');

        transport.write(b"+").await.unwrap();
        let mut buf = [0u8; 1];
        target.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"+");
    }

    #[tokio::test]
    async fn test_eof_is_closed() {
        let (transport, target) = StreamTransport::pair(64);
        drop(target);
        assert!(transport.read_byte().await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_close_interrupts_pending_read() {
        let (transport, _target) = StreamTransport::pair(64);
        let transport = Arc::new(transport);

        let reader = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.read_byte().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        transport.close();
        transport.close();

        let result = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        assert!(result.unwrap_err().is_closed());
        assert!(transport.write(b"+").await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_reaches_peer() {
        let (transport, mut target) = StreamTransport::pair(64);
        transport.shutdown().await.unwrap();
        transport.shutdown().await.unwrap();

        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_millis(500), target.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_close_releases_write_half() {
        let (transport, mut target) = StreamTransport::pair(64);
        transport.close();

        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_millis(500), target.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}
