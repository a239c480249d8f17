//! Reader loop - drains the transport, frames packets, routes them and
//! acknowledges every standard reply before reading the next byte.

use std::sync::Arc;

use sidestub_protocol::{Frame, Framer, Packet, PacketKind, ProtocolError};
use sidestub_transport::{Transport, TransportError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

use crate::dispatcher::Dispatcher;
use crate::error::SessionResult;
use crate::notifications::NotificationSink;
use crate::stats::SessionStats;
use crate::writer::FrameWriter;

pub struct ReaderLoop {
    transport: Arc<dyn Transport>,
    writer: Arc<FrameWriter>,
    dispatcher: Arc<Dispatcher>,
    sink: NotificationSink,
    stats: Arc<SessionStats>,
    framer: Framer,
}

impl ReaderLoop {
    pub fn new(
        transport: Arc<dyn Transport>,
        writer: Arc<FrameWriter>,
        dispatcher: Arc<Dispatcher>,
        sink: NotificationSink,
        stats: Arc<SessionStats>,
        max_frame_len: usize,
    ) -> Self {
        Self {
            transport,
            writer,
            dispatcher,
            sink,
            stats,
            framer: Framer::with_max_frame_len(max_frame_len),
        }
    }

    /// Run until the transport closes or fails.
    ///
    /// Clean closure returns `Ok`. Either way the dispatcher is closed on
    /// exit so waiting and future commands fail with `SessionClosed`.
    pub async fn run(mut self, ready: oneshot::Sender<()>) -> SessionResult<()> {
        info!("Reader loop started");
        let _ = ready.send(());

        let result = self.drive().await;

        self.dispatcher.close();
        if let Err(e) = self.transport.shutdown().await {
            debug!(error = %e, "Transport shutdown failed");
        }
        match &result {
            Ok(()) => info!("Reader loop stopped: transport closed"),
            Err(e) => error!(error = %e, "Reader loop failed"),
        }
        result
    }

    async fn drive(&mut self) -> SessionResult<()> {
        loop {
            let byte = match self.transport.read_byte().await {
                Ok(byte) => byte,
                Err(TransportError::Closed) => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            match self.framer.push(byte) {
                Ok(None) => {}
                Ok(Some(Frame::Packet(packet))) => {
                    if !self.route(packet).await? {
                        return Ok(());
                    }
                }
                Ok(Some(Frame::Nak)) => {
                    match self.writer.retransmit().await {
                        Ok(true) => {
                            self.stats.record_retransmit();
                            warn!("Target sent NAK, retransmitted last command");
                        }
                        Ok(false) => warn!("Target sent NAK before any command was sent"),
                        Err(TransportError::Closed) => return Ok(()),
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e @ ProtocolError::FrameTooLong { .. }) => {
                    self.stats.record_framing_error();
                    warn!(error = %e, "Discarded oversized frame");
                }
                Err(e) => {
                    self.stats.record_framing_error();
                    warn!(error = %e, "Skipping byte outside of a frame");
                }
            }
        }
    }

    /// Returns false when the transport closed while acknowledging.
    async fn route(&mut self, packet: Packet) -> SessionResult<bool> {
        match packet.kind() {
            PacketKind::StandardReply => {
                debug!(payload = %packet.payload_lossy(), valid = packet.verify(), "Reply received");
                self.stats.record_reply();
                if !self.dispatcher.deliver(packet) {
                    self.stats.record_dropped_reply();
                }

                match self.writer.ack().await {
                    Ok(()) => {
                        self.stats.record_ack();
                        Ok(true)
                    }
                    Err(TransportError::Closed) => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
            PacketKind::Notification => {
                info!(payload = %packet.payload_lossy(), "Notification received");
                self.stats.record_notification();
                if !self.sink.push(packet) {
                    trace!("Notification consumer gone");
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sidestub_protocol::checksum;
    use sidestub_transport::TransportResult;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Read(u8),
        Write(Vec<u8>),
    }

    /// Replays a fixed byte script and records every read and write
    struct ScriptedTransport {
        input: Mutex<VecDeque<u8>>,
        events: Mutex<Vec<Event>>,
    }

    impl ScriptedTransport {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Mutex::new(input.iter().copied().collect()),
                events: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn read_byte(&self) -> TransportResult<u8> {
            let byte = self.input.lock().pop_front().ok_or(TransportError::Closed)?;
            self.events.lock().push(Event::Read(byte));
            Ok(byte)
        }

        async fn write(&self, bytes: &[u8]) -> TransportResult<()> {
            self.events.lock().push(Event::Write(bytes.to_vec()));
            Ok(())
        }

        fn close(&self) {}

        fn is_closed(&self) -> bool {
            self.input.lock().is_empty()
        }
    }

    fn frame(start: u8, body: &str) -> Vec<u8> {
        let mut out = vec![start];
        out.extend_from_slice(body.as_bytes());
        out.push(b'#');
        out.extend_from_slice(checksum::compute(body.as_bytes()).as_bytes());
        out
    }

    async fn run_script(input: &[u8]) -> (Vec<Event>, Arc<SessionStats>, notifications::Notifications) {
        let transport = Arc::new(ScriptedTransport::new(input));
        let writer = Arc::new(FrameWriter::new(transport.clone()));
        let dispatcher = Arc::new(Dispatcher::new());
        let stats = Arc::new(SessionStats::new().unwrap());
        let (sink, queue) = notifications::channel();

        let reader = ReaderLoop::new(
            transport.clone(),
            writer,
            dispatcher.clone(),
            sink,
            stats.clone(),
            1024,
        );
        let (ready, _) = oneshot::channel();
        reader.run(ready).await.unwrap();
        assert!(dispatcher.is_closed());

        let events = transport.events.lock().clone();
        (events, stats, queue)
    }

    #[tokio::test]
    async fn test_ack_follows_each_reply_before_next_read() {
        let mut input = vec![b'+'];
        input.extend(frame(b'$', "OK"));
        input.extend(frame(b'%', "Stopped"));
        input.extend(frame(b'$', "E01"));
        input.extend(frame(b'$', ""));

        let (events, stats, mut queue) = run_script(&input).await;

        let mut expected = Vec::new();
        let mut cursor = 0;
        for (chunk, acked) in [
            (1 + 6, true),
            (11, false),
            (7, true),
            (4, true),
        ] {
            for &b in &input[cursor..cursor + chunk] {
                expected.push(Event::Read(b));
            }
            cursor += chunk;
            if acked {
                expected.push(Event::Write(vec![b'+']));
            }
        }
        assert_eq!(events, expected);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.replies, 3);
        assert_eq!(snapshot.acks_sent, 3);
        assert_eq!(snapshot.notifications, 1);
        // Nobody was waiting for these replies
        assert_eq!(snapshot.dropped_replies, 3);
        assert_eq!(queue.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_nak_without_command_sends_nothing() {
        let (events, stats, _) = run_script(b"-").await;
        assert_eq!(events, vec![Event::Read(b'-')]);
        assert_eq!(stats.snapshot().retransmits, 0);
    }

    #[tokio::test]
    async fn test_garbage_does_not_stop_loop() {
        let mut input = b"\r\nhello".to_vec();
        input.extend(frame(b'$', "OK"));

        let (events, stats, _) = run_script(&input).await;
        assert_eq!(events.last(), Some(&Event::Write(vec![b'+'])));
        assert_eq!(stats.snapshot().framing_errors, 7);
        assert_eq!(stats.snapshot().replies, 1);
    }
}
