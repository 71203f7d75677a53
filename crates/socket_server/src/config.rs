//! Server configuration types and defaults.
//!
//! This module contains the configuration used to start a server instance
//! and the timing constants that drive its loops. All timings default to the
//! cadence the server is expected to keep in production; tests shrink them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ServerError;

/// Which socket family a server manager drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Connection-oriented transport (TCP).
    Stream,
    /// Connectionless transport (UDP).
    Datagram,
}

impl TransportKind {
    /// Port reported by a manager that has never been started.
    pub fn default_port(self) -> u16 {
        match self {
            TransportKind::Stream => 5018,
            TransportKind::Datagram => 5019,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stream => write!(f, "stream"),
            TransportKind::Datagram => write!(f, "datagram"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stream" | "tcp" => Ok(TransportKind::Stream),
            "datagram" | "udp" => Ok(TransportKind::Datagram),
            other => Err(format!("Unknown transport: {other} (expected stream or datagram)")),
        }
    }
}

/// Address and payload for one server run.
///
/// `message` may change while the server runs; `host` and `port` only take
/// effect through a (re)start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Literal IP address to bind to (no name resolution)
    pub host: String,

    /// Port to bind to; 0 lets the OS pick one
    pub port: u16,

    /// Payload sent to every peer
    pub message: String,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16, message: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            message: message.into(),
        }
    }

    /// Resolves `host:port` into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        parse_socket_addr(&self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5018,
            message: String::new(),
        }
    }
}

/// Parses a literal IP host and a port into a [`SocketAddr`].
///
/// IPv6 hosts may be given with or without surrounding brackets.
pub fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    let trimmed = host.trim().trim_start_matches('[').trim_end_matches(']');
    let ip: IpAddr = trimmed
        .parse()
        .map_err(|_| ServerError::InvalidAddress(host.to_string()))?;
    Ok(SocketAddr::new(ip, port))
}

/// Cadence and deadline settings for the server loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimings {
    /// Pause between two sends to the same peer, and between datagram receive cycles
    pub send_interval: Duration,

    /// Upper bound on the join performed by `stop`
    pub shutdown_timeout: Duration,

    /// Settle delay between stop and start during an address change
    pub rebind_delay: Duration,

    /// Backoff after a failed accept or receive
    pub error_backoff: Duration,

    /// Pause between two messages of a batch
    pub batch_interval: Duration,

    /// Size of the per-peer inbound read buffer
    pub read_buffer_size: usize,
}

impl Default for ServerTimings {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(5),
            rebind_delay: Duration::from_millis(500),
            error_backoff: Duration::from_secs(1),
            batch_interval: Duration::from_millis(100),
            read_buffer_size: 1024,
        }
    }
}

impl ServerTimings {
    /// Sets the per-peer send cadence.
    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    /// Sets the bounded join used by `stop`.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the settle delay used by address changes.
    pub fn with_rebind_delay(mut self, delay: Duration) -> Self {
        self.rebind_delay = delay;
        self
    }

    /// Sets the backoff after accept/receive faults.
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Sets the pause between batch messages.
    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let timings = ServerTimings::default();
        assert_eq!(timings.send_interval, Duration::from_secs(3));
        assert_eq!(timings.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(timings.rebind_delay, Duration::from_millis(500));
        assert_eq!(timings.error_backoff, Duration::from_secs(1));
        assert_eq!(timings.batch_interval, Duration::from_millis(100));
        assert_eq!(timings.read_buffer_size, 1024);
    }

    #[test]
    fn test_parse_socket_addr() {
        let addr = parse_socket_addr("127.0.0.1", 9100).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:9100");

        let addr = parse_socket_addr("[::1]", 9100).unwrap();
        assert_eq!(addr.to_string(), "[::1]:9100");

        let addr = parse_socket_addr("::1", 0).unwrap();
        assert!(addr.is_ipv6());
    }

    #[test]
    fn test_parse_socket_addr_rejects_names() {
        let result = parse_socket_addr("localhost", 80);
        assert!(matches!(result, Err(ServerError::InvalidAddress(h)) if h == "localhost"));

        assert!(parse_socket_addr("", 80).is_err());
        assert!(parse_socket_addr("256.0.0.1", 80).is_err());
    }

    #[test]
    fn test_transport_kind_parsing() {
        assert_eq!("stream".parse::<TransportKind>().unwrap(), TransportKind::Stream);
        assert_eq!("TCP".parse::<TransportKind>().unwrap(), TransportKind::Stream);
        assert_eq!("udp".parse::<TransportKind>().unwrap(), TransportKind::Datagram);
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
        assert_eq!(TransportKind::Datagram.to_string(), "datagram");
        assert_eq!(TransportKind::Datagram.default_port(), 5019);
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5018);
        assert!(config.message.is_empty());
        assert_eq!(config.socket_addr().unwrap().port(), 5018);
    }
}
