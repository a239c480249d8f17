//! Configuration file support

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sidestub_core::SessionConfig;
use sidestub_transport::SerialOptions;

/// Contents of the optional TOML configuration file
///
/// ```toml
/// address = "/dev/ttyUSB0"
/// log_level = "debug"
///
/// [session]
/// reply_timeout_ms = 5000
///
/// [serial]
/// baud_rate = 115200
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub address: Option<String>,
    pub log_level: Option<String>,
    pub session: SessionConfig,
    pub serial: SerialOptions,
}

impl Config {
    /// Load from `path`, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml(&text)
                    .with_context(|| format!("Invalid config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.address.is_none());
        assert_eq!(config.session.reply_timeout_ms, 3000);
        assert!(config.session.verify_replies);
        assert_eq!(config.serial.baud_rate, 115_200);
    }

    #[test]
    fn test_partial_tables() {
        let config = Config::from_toml(
            r#"
            address = "tcp:localhost:1234"

            [session]
            reply_timeout_ms = 250

            [serial]
            baud_rate = 9600
            "#,
        )
        .unwrap();
        assert_eq!(config.address.as_deref(), Some("tcp:localhost:1234"));
        assert_eq!(config.session.reply_timeout_ms, 250);
        assert_eq!(config.session.max_frame_len, SessionConfig::default().max_frame_len);
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.poll_interval_ms, 50);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"debug\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(Config::load(Some(Path::new("/nonexistent/side-stub.toml"))).is_err());
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(Config::from_toml("[session]\nreply_timeout_ms = \"soon\"").is_err());
    }
}
