//! Session - the public face of the engine
//!
//! Owns the transport, runs the reader loop, and serializes commands so at
//! most one is outstanding at a time.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sidestub_protocol::{encoder, Command, Packet, Reply};
use sidestub_transport::{Address, SerialOptions, Transport};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{SessionError, SessionResult};
use crate::notifications::{self, Notifications};
use crate::reader::ReaderLoop;
use crate::stats::{SessionStats, StatsSnapshot};
use crate::writer::FrameWriter;

/// How long `disconnect` waits for the transport and the reader loop to wind down
const READER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// A connection to one target
pub struct Session {
    transport: Arc<dyn Transport>,
    writer: Arc<FrameWriter>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<SessionStats>,
    notifications: Mutex<Option<Notifications>>,
    command_lock: AsyncMutex<()>,
    reader: Mutex<Option<JoinHandle<SessionResult<()>>>>,
    config: SessionConfig,
}

impl Session {
    /// Open the transport at `address` and start the reader loop
    pub async fn connect(
        address: &str,
        config: SessionConfig,
        serial: &SerialOptions,
    ) -> SessionResult<Self> {
        let address: Address = address.parse()?;
        let transport = sidestub_transport::open(&address, serial).await?;
        info!(address = %address, "Connected");
        Self::start(transport, config).await
    }

    /// Start a session on an already open transport.
    ///
    /// Returns once the reader loop is running.
    pub async fn start(transport: Arc<dyn Transport>, config: SessionConfig) -> SessionResult<Self> {
        let writer = Arc::new(FrameWriter::new(transport.clone()));
        let dispatcher = Arc::new(Dispatcher::new());
        let stats = Arc::new(SessionStats::new()?);
        let (sink, queue) = notifications::channel();

        let reader = ReaderLoop::new(
            transport.clone(),
            writer.clone(),
            dispatcher.clone(),
            sink,
            stats.clone(),
            config.max_frame_len,
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(reader.run(ready_tx));
        ready_rx.await.map_err(|_| SessionError::SessionClosed)?;

        Ok(Self {
            transport,
            writer,
            dispatcher,
            stats,
            notifications: Mutex::new(Some(queue)),
            command_lock: AsyncMutex::new(()),
            reader: Mutex::new(Some(handle)),
            config,
        })
    }

    /// Send `command` + `payload` and wait for the reply packet.
    ///
    /// The reply is returned exactly as framed; its checksum is not checked.
    pub async fn send_command(&self, command: &str, payload: &str) -> SessionResult<Packet> {
        let _guard = self.command_lock.lock().await;

        let pending = self.dispatcher.register()?;
        let frame = encoder::encode(command, payload);
        debug!(command = %command, payload = %payload, "Sending command");

        if let Err(e) = self.writer.send_frame(frame).await {
            self.dispatcher.cancel(pending.id());
            if e.is_closed() {
                return Err(SessionError::SessionClosed);
            }
            return Err(e.into());
        }
        self.stats.record_command();

        let result = self
            .dispatcher
            .await_next_reply(pending, self.config.reply_timeout())
            .await;
        if let Err(SessionError::CommandTimeout(timeout)) = &result {
            self.stats.record_timeout();
            warn!(command = %command, timeout = ?timeout, "Command timed out");
        }
        result
    }

    /// Send a [`Command`] and return the raw reply packet
    pub async fn send(&self, command: &Command) -> SessionResult<Packet> {
        self.send_command(command.mnemonic(), &command.payload()).await
    }

    /// Send a command and decode its reply, turning `E<nn>` into an error
    pub async fn request(&self, command: &Command) -> SessionResult<Reply> {
        let packet = self.send(command).await?;
        if self.config.verify_replies {
            packet.check()?;
        }

        match Reply::parse(packet.payload()) {
            Reply::Error(code) => Err(SessionError::RemoteError(code)),
            reply => Ok(reply),
        }
    }

    /// Set a tracepoint on `symbol` and read the registers when it fires
    pub async fn tracepoint_get_registers(&self, symbol: &str) -> SessionResult<Reply> {
        self.request(&Command::tracepoint_get_registers(symbol)).await
    }

    /// Read `length` bytes at `addr` when the tracepoint fires
    pub async fn tracepoint_get_memory(&self, addr: u64, length: u64) -> SessionResult<Vec<u8>> {
        match self.request(&Command::tracepoint_get_memory(addr, length)).await? {
            Reply::Data(data) => Ok(data),
            other => Err(SessionError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    /// Read the call arguments of `function` when it is entered
    pub async fn tracepoint_get_arguments(&self, function: &str) -> SessionResult<Reply> {
        self.request(&Command::tracepoint_get_arguments(function)).await
    }

    /// Take the notification queue. Only the first call gets it.
    pub fn take_notifications(&self) -> Option<Notifications> {
        self.notifications.lock().take()
    }

    pub fn is_connected(&self) -> bool {
        !self.dispatcher.is_closed() && !self.transport.is_closed()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Session counters in Prometheus text format
    pub fn metrics_text(&self) -> SessionResult<String> {
        Ok(self.stats.encode()?)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Close the transport and wait for the reader loop to exit.
    ///
    /// Commands in flight fail with `SessionClosed`.
    pub async fn disconnect(&self) -> SessionResult<()> {
        self.dispatcher.close();
        match tokio::time::timeout(READER_SHUTDOWN_TIMEOUT, self.transport.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Transport shutdown failed"),
            Err(_) => {
                self.transport.close();
                warn!("Transport shutdown did not finish in time");
            }
        }

        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(READER_SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!(error = %e, "Reader loop ended with an error"),
                Ok(Err(e)) => warn!(error = %e, "Reader loop task failed"),
                Err(_) => warn!("Reader loop did not stop in time"),
            }
        }

        info!("Disconnected");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.transport.close();
        self.dispatcher.close();
    }
}
