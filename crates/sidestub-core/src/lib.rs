//! Side-stub Core - session engine
//!
//! This crate drives a target over a [`Transport`](sidestub_transport::Transport):
//! - A reader loop framing inbound bytes and acknowledging replies
//! - A single-slot dispatcher pairing each command with its reply
//! - A FIFO queue of asynchronous notifications
//! - The [`Session`] that ties them together

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod notifications;
pub mod reader;
pub mod session;
pub mod stats;
pub mod writer;

pub use config::SessionConfig;
pub use dispatcher::{Dispatcher, PendingReply};
pub use error::{SessionError, SessionResult};
pub use notifications::{NotificationSink, Notifications};
pub use session::Session;
pub use stats::{SessionStats, StatsSnapshot};
