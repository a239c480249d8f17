//! Serial port transport
//!
//! `serialport` only offers blocking reads, so a dedicated thread pumps
//! bytes from the port into a channel. The thread wakes every
//! `poll_interval_ms` to notice that the transport was closed.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serialport::SerialPort;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, trace, warn};

use crate::error::{TransportError, TransportResult};
use crate::signal::CloseSignal;
use crate::{SerialOptions, Transport};

/// Bytes buffered between the pump thread and the reader
const PUMP_CAPACITY: usize = 4096;

/// Transport over a serial device
pub struct SerialTransport {
    path: String,
    port: Arc<Mutex<Option<Box<dyn SerialPort>>>>,
    rx: AsyncMutex<mpsc::Receiver<io::Result<u8>>>,
    stop: Arc<AtomicBool>,
    closed: CloseSignal,
}

impl SerialTransport {
    /// Open the device and start the pump thread
    pub fn open(path: &str, options: &SerialOptions) -> TransportResult<Self> {
        let port = serialport::new(path, options.baud_rate)
            .timeout(Duration::from_millis(options.poll_interval_ms.max(1)))
            .open()?;
        let reader = port.try_clone()?;

        let (tx, rx) = mpsc::channel(PUMP_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));

        let thread_stop = stop.clone();
        let thread_path = path.to_string();
        thread::Builder::new()
            .name("serial-pump".into())
            .spawn(move || pump(reader, tx, thread_stop, thread_path))?;

        info!(path = %path, baud = options.baud_rate, "Serial transport opened");

        Ok(Self {
            path: path.to_string(),
            port: Arc::new(Mutex::new(Some(port))),
            rx: AsyncMutex::new(rx),
            stop,
            closed: CloseSignal::new(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn pump(
    mut port: Box<dyn SerialPort>,
    tx: mpsc::Sender<io::Result<u8>>,
    stop: Arc<AtomicBool>,
    path: String,
) {
    let mut buf = [0u8; 256];
    while !stop.load(Ordering::Acquire) {
        match port.read(&mut buf) {
            Ok(0) => {
                debug!(path = %path, "Serial port reached end of stream");
                break;
            }
            Ok(n) => {
                for &byte in &buf[..n] {
                    if tx.blocking_send(Ok(byte)).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(path = %path, error = %e, "Serial read failed");
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
    debug!(path = %path, "Serial pump stopped");
}

#[async_trait]
impl Transport for SerialTransport {
    async fn read_byte(&self) -> TransportResult<u8> {
        if self.closed.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut rx = self.rx.lock().await;
        tokio::select! {
            next = rx.recv() => match next {
                Some(Ok(byte)) => {
                    trace!(byte = %(byte as char).escape_default(), "rx");
                    Ok(byte)
                }
                Some(Err(e)) => Err(TransportError::Io(e)),
                None => Err(TransportError::Closed),
            },
            _ = self.closed.closed() => Err(TransportError::Closed),
        }
    }

    async fn write(&self, bytes: &[u8]) -> TransportResult<()> {
        if self.closed.is_closed() {
            return Err(TransportError::Closed);
        }

        let port = self.port.clone();
        let stop = self.stop.clone();
        let data = bytes.to_vec();
        tokio::task::spawn_blocking(move || -> TransportResult<()> {
            let mut guard = port.lock();
            let handle = guard.as_mut().ok_or(TransportError::Closed)?;
            let result = handle.write_all(&data).and_then(|()| handle.flush());
            // Closed mid-write: the handle is released here instead
            if stop.load(Ordering::Acquire) {
                guard.take();
            }
            Ok(result?)
        })
        .await
        .map_err(|e| TransportError::Io(io::Error::other(e)))?
    }

    fn close(&self) {
        if self.closed.close() {
            self.stop.store(true, Ordering::Release);
            if let Some(mut port) = self.port.try_lock() {
                port.take();
            }
            debug!(path = %self.path, "Serial transport closed");
        }
    }

    async fn shutdown(&self) -> TransportResult<()> {
        self.close();
        let port = self.port.clone();
        tokio::task::spawn_blocking(move || port.lock().take())
            .await
            .map_err(|e| TransportError::Io(io::Error::other(e)))?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_closed()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.port.lock().take();
    }
}
