//! Frame writer - the single write path onto the transport
//!
//! Commands from the caller and acknowledgements from the reader loop share
//! one lock so their bytes never interleave on the wire.

use std::sync::Arc;

use bytes::Bytes;
use sidestub_protocol::ACK;
use sidestub_transport::{Transport, TransportResult};
use tokio::sync::Mutex;
use tracing::{debug, trace};

pub struct FrameWriter {
    transport: Arc<dyn Transport>,
    lock: Mutex<()>,
    last_frame: parking_lot::Mutex<Option<Bytes>>,
}

impl FrameWriter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            lock: Mutex::new(()),
            last_frame: parking_lot::Mutex::new(None),
        }
    }

    /// Write an encoded command frame, remembering it for retransmission.
    pub async fn send_frame(&self, frame: Bytes) -> TransportResult<()> {
        let _guard = self.lock.lock().await;
        debug!(frame = %String::from_utf8_lossy(&frame), "tx");
        *self.last_frame.lock() = Some(frame.clone());
        self.transport.write(&frame).await
    }

    /// Acknowledge a received packet
    pub async fn ack(&self) -> TransportResult<()> {
        let _guard = self.lock.lock().await;
        trace!("ack");
        self.transport.write(&[ACK]).await
    }

    /// Send the last command frame again. Returns false if nothing was sent yet.
    pub async fn retransmit(&self) -> TransportResult<bool> {
        let _guard = self.lock.lock().await;
        let frame = self.last_frame.lock().clone();
        match frame {
            Some(frame) => {
                debug!(frame = %String::from_utf8_lossy(&frame), "retransmit");
                self.transport.write(&frame).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
