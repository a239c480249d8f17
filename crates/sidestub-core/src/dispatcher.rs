//! Reply dispatcher - single-slot rendezvous between the reader loop and the
//! caller waiting on a command's reply
//!
//! A reply is only handed over if a waiter was registered before it arrived.
//! Registration happens before the command is written, so a reply can never
//! overtake its waiter. A reply with nobody waiting (for example one that
//! shows up after its command timed out) is dropped, keeping the next
//! command's correlation intact.

use std::time::Duration;

use parking_lot::Mutex;
use sidestub_protocol::Packet;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};

/// Ticket for the next reply, obtained from [`Dispatcher::register`]
#[derive(Debug)]
pub struct PendingReply {
    id: u64,
    rx: oneshot::Receiver<Packet>,
}

impl PendingReply {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Default)]
struct Slot {
    waiter: Option<(u64, oneshot::Sender<Packet>)>,
    next_id: u64,
    closed: bool,
}

/// Hands standard replies from the reader loop to the one waiting caller
#[derive(Default)]
pub struct Dispatcher {
    slot: Mutex<Slot>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for the next reply.
    pub fn register(&self) -> SessionResult<PendingReply> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return Err(SessionError::SessionClosed);
        }

        let id = slot.next_id;
        slot.next_id += 1;

        let (tx, rx) = oneshot::channel();
        if let Some((stale, _)) = slot.waiter.replace((id, tx)) {
            warn!(stale, id, "Replaced a pending reply that was never collected");
        }
        Ok(PendingReply { id, rx })
    }

    /// Hand a reply to the registered waiter. Returns false when the packet
    /// was dropped because nobody was waiting.
    pub fn deliver(&self, packet: Packet) -> bool {
        let waiter = self.slot.lock().waiter.take();
        match waiter {
            Some((id, tx)) => match tx.send(packet) {
                Ok(()) => {
                    debug!(id, "Reply delivered");
                    true
                }
                Err(packet) => {
                    warn!(id, payload = %packet.payload_lossy(), "Waiter gave up, dropping reply");
                    false
                }
            },
            None => {
                warn!(payload = %packet.payload_lossy(), "No command waiting, dropping reply");
                false
            }
        }
    }

    /// Wait for the reply claimed by `pending`.
    ///
    /// On timeout the slot is cleared so a late reply is dropped rather than
    /// handed to the next command.
    pub async fn await_next_reply(
        &self,
        pending: PendingReply,
        timeout: Duration,
    ) -> SessionResult<Packet> {
        let PendingReply { id, rx } = pending;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(packet)) => Ok(packet),
            Ok(Err(_)) => Err(SessionError::SessionClosed),
            Err(_) => {
                self.cancel(id);
                Err(SessionError::CommandTimeout(timeout))
            }
        }
    }

    /// Release the slot if it still belongs to `id`
    pub fn cancel(&self, id: u64) {
        let mut slot = self.slot.lock();
        if matches!(slot.waiter, Some((current, _)) if current == id) {
            slot.waiter = None;
        }
    }

    pub fn has_waiter(&self) -> bool {
        self.slot.lock().waiter.is_some()
    }

    /// Fail the current waiter and every later registration
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        slot.waiter = None;
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }
}
