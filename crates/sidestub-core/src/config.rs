//! Session configuration

use std::time::Duration;

use serde::Deserialize;
use sidestub_protocol::DEFAULT_MAX_FRAME_LEN;

/// Tunables for a [`Session`](crate::Session)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long `send_command` waits for the reply
    pub reply_timeout_ms: u64,
    /// Largest payload the framer accepts before discarding the frame
    pub max_frame_len: usize,
    /// Reject replies with a bad checksum in the typed operations
    pub verify_replies: bool,
}

impl SessionConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 3000,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            verify_replies: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_reply_timeout() {
        let config = SessionConfig::default().with_reply_timeout(Duration::from_millis(250));
        assert_eq!(config.reply_timeout_ms, 250);
        assert_eq!(config.reply_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let config = SessionConfig::default().with_reply_timeout(Duration::MAX);
        assert_eq!(config.reply_timeout_ms, u64::MAX);
    }
}
