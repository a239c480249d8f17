//! Session counters, kept in a per-session Prometheus registry

use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Counters updated by the reader loop and the send path
pub struct SessionStats {
    registry: Registry,
    replies: IntCounter,
    notifications: IntCounter,
    acks_sent: IntCounter,
    dropped_replies: IntCounter,
    framing_errors: IntCounter,
    retransmits: IntCounter,
    commands_sent: IntCounter,
    timeouts: IntCounter,
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub replies: u64,
    pub notifications: u64,
    pub acks_sent: u64,
    pub dropped_replies: u64,
    pub framing_errors: u64,
    pub retransmits: u64,
    pub commands_sent: u64,
    pub timeouts: u64,
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help).namespace("sidestub"))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl SessionStats {
    /// Create the counters and register them in a fresh registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let replies = counter(&registry, "replies_total", "Standard replies received")?;
        let notifications = counter(
            &registry,
            "notifications_total",
            "Notification packets received",
        )?;
        let acks_sent = counter(&registry, "acks_sent_total", "Acknowledgements written")?;
        let dropped_replies = counter(
            &registry,
            "dropped_replies_total",
            "Replies that arrived with no command waiting",
        )?;
        let framing_errors = counter(
            &registry,
            "framing_errors_total",
            "Oversized frames and bytes outside a frame",
        )?;
        let retransmits = counter(
            &registry,
            "retransmits_total",
            "Commands resent after a NAK",
        )?;
        let commands_sent = counter(&registry, "commands_sent_total", "Command frames written")?;
        let timeouts = counter(&registry, "timeouts_total", "Commands that got no reply in time")?;

        Ok(Self {
            registry,
            replies,
            notifications,
            acks_sent,
            dropped_replies,
            framing_errors,
            retransmits,
            commands_sent,
            timeouts,
        })
    }

    pub fn record_reply(&self) {
        self.replies.inc();
    }

    pub fn record_notification(&self) {
        self.notifications.inc();
    }

    pub fn record_ack(&self) {
        self.acks_sent.inc();
    }

    pub fn record_dropped_reply(&self) {
        self.dropped_replies.inc();
    }

    pub fn record_framing_error(&self) {
        self.framing_errors.inc();
    }

    pub fn record_retransmit(&self) {
        self.retransmits.inc();
    }

    pub fn record_command(&self) {
        self.commands_sent.inc();
    }

    pub fn record_timeout(&self) {
        self.timeouts.inc();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            replies: self.replies.get(),
            notifications: self.notifications.get(),
            acks_sent: self.acks_sent.get(),
            dropped_replies: self.dropped_replies.get(),
            framing_errors: self.framing_errors.get(),
            retransmits: self.retransmits.get(),
            commands_sent: self.commands_sent.get(),
            timeouts: self.timeouts.get(),
        }
    }

    /// Encode all counters in Prometheus text format
    pub fn encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
