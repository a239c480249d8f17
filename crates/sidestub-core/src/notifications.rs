//! Notification sink - FIFO queue of out-of-band packets

use sidestub_protocol::Packet;
use tokio::sync::mpsc;

/// Producer side, owned by the reader loop
#[derive(Clone)]
pub struct NotificationSink {
    tx: mpsc::UnboundedSender<Packet>,
}

/// Consumer side, e.g. a console echo task
pub struct Notifications {
    rx: mpsc::UnboundedReceiver<Packet>,
}

/// Create a connected sink and queue
pub fn channel() -> (NotificationSink, Notifications) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NotificationSink { tx }, Notifications { rx })
}

impl NotificationSink {
    /// Append a notification. Returns false once the consumer is gone.
    pub fn push(&self, packet: Packet) -> bool {
        self.tx.send(packet).is_ok()
    }
}

impl Notifications {
    /// Wait for the next notification. `None` once the session has ended
    /// and the queue is empty.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Packet> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, oldest first
    pub fn drain(&mut self) -> Vec<Packet> {
        let mut out = Vec::new();
        while let Some(packet) = self.try_recv() {
            out.push(packet);
        }
        out
    }
}
