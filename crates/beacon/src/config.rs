//! Configuration management for the beacon server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use socket_server::config::parse_socket_addr;
use socket_server::{ServerConfig, ServerTimings, TransportKind};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::cli::CliArgs;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub timings: TimingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub control: ControlSettings,
}

/// Which transport to serve and what to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub transport: TransportKind,
    /// Literal IP address to bind to
    pub host: String,
    /// Port to bind to (0 picks a free port)
    pub port: u16,
    /// Message to broadcast; the server starts on launch when non-empty
    pub message: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stream,
            host: "127.0.0.1".to_string(),
            port: TransportKind::Stream.default_port(),
            message: String::new(),
        }
    }
}

/// Loop cadence, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub send_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub rebind_delay_ms: u64,
    pub error_backoff_ms: u64,
    pub batch_interval_ms: u64,
    pub read_buffer_size: usize,
}

impl Default for TimingSettings {
    fn default() -> Self {
        let timings = ServerTimings::default();
        Self {
            send_interval_ms: timings.send_interval.as_millis() as u64,
            shutdown_timeout_ms: timings.shutdown_timeout.as_millis() as u64,
            rebind_delay_ms: timings.rebind_delay.as_millis() as u64,
            error_backoff_ms: timings.error_backoff.as_millis() as u64,
            batch_interval_ms: timings.batch_interval.as_millis() as u64,
            read_buffer_size: timings.read_buffer_size,
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Read JSON control commands from stdin
    pub console: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self { console: true }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file values.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(transport) = args.transport {
            self.server.transport = transport;
        }
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(message) = &args.message {
            self.server.message = message.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if args.no_console {
            self.control.console = false;
        }
    }

    /// Converts the server section into the address and payload for a run.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig::new(
            self.server.host.clone(),
            self.server.port,
            self.server.message.clone(),
        )
    }

    /// Converts the timing section into the library's cadence settings.
    pub fn to_timings(&self) -> ServerTimings {
        let t = &self.timings;
        let mut timings = ServerTimings::default()
            .with_send_interval(Duration::from_millis(t.send_interval_ms))
            .with_shutdown_timeout(Duration::from_millis(t.shutdown_timeout_ms))
            .with_rebind_delay(Duration::from_millis(t.rebind_delay_ms))
            .with_error_backoff(Duration::from_millis(t.error_backoff_ms))
            .with_batch_interval(Duration::from_millis(t.batch_interval_ms));
        timings.read_buffer_size = t.read_buffer_size;
        timings
    }

    /// True when the server should start without waiting for a command.
    pub fn autostart(&self) -> bool {
        !self.server.message.trim().is_empty()
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = parse_socket_addr(&self.server.host, self.server.port) {
            bail!("Invalid server address: {e}");
        }

        if self.timings.send_interval_ms == 0 {
            bail!("timings.send_interval_ms must be greater than zero");
        }
        if self.timings.read_buffer_size == 0 {
            bail!("timings.read_buffer_size must be greater than zero");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                self.logging.level
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.transport, TransportKind::Stream);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5018);
        assert!(config.server.message.is_empty());
        assert!(!config.autostart());

        assert_eq!(config.timings.send_interval_ms, 3000);
        assert_eq!(config.timings.shutdown_timeout_ms, 5000);
        assert_eq!(config.timings.rebind_delay_ms, 500);
        assert_eq!(config.timings.batch_interval_ms, 100);

        assert_eq!(config.logging.level, "info");
        assert!(config.control.console);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_timings_round_trip() {
        assert_eq!(AppConfig::default().to_timings(), ServerTimings::default());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_creates_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        // The written file loads back to the same values
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
transport = "datagram"
host = "0.0.0.0"
port = 9100
message = "hello"

[timings]
send_interval_ms = 250

[logging]
level = "debug"
json_format = true

[control]
console = false
"#;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.toml");
        tokio::fs::write(&path, toml_content).await.unwrap();

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.transport, TransportKind::Datagram);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9100);
        assert!(config.autostart());
        assert_eq!(config.timings.send_interval_ms, 250);
        // Unset keys keep their defaults
        assert_eq!(config.timings.rebind_delay_ms, 500);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert!(!config.control.console);

        assert_eq!(config.to_timings().send_interval, Duration::from_millis(250));

        let server = config.to_server_config();
        assert_eq!(server, ServerConfig::new("0.0.0.0", 9100, "hello"));
        assert_eq!(server.socket_addr().unwrap().port(), 9100);
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        tokio::fs::write(&path, "[server\nport = ").await.unwrap();

        assert!(AppConfig::load_from_file(&path).await.is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.server.host = "localhost".to_string();
        assert!(config.validate().is_err());

        config.server.host = "::1".to_string();
        assert!(config.validate().is_ok());

        config.timings.send_interval_ms = 0;
        assert!(config.validate().is_err());
        config.timings.send_interval_ms = 3000;

        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            transport: Some(TransportKind::Datagram),
            port: Some(0),
            message: Some("override".to_string()),
            log_level: Some("warn".to_string()),
            json_logs: true,
            no_console: true,
            ..CliArgs::default()
        };
        config.apply_cli(&args);

        assert_eq!(config.server.transport, TransportKind::Datagram);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 0);
        assert_eq!(config.server.message, "override");
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json_format);
        assert!(!config.control.console);
    }
}
