//! Published server state.

use serde::Serialize;

use crate::config::TransportKind;

/// Snapshot of a manager's state.
///
/// Published whole through a watch channel, so a reader sees either the
/// state before a transition or the state after it. `host` and `port` keep
/// the last bound address after a stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub is_running: bool,
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
}

impl ServerStatus {
    pub fn running(transport: TransportKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            is_running: true,
            transport,
            host: host.into(),
            port,
        }
    }

    pub fn stopped(transport: TransportKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            is_running: false,
            transport,
            host: host.into(),
            port,
        }
    }

    /// `host:port`, with IPv6 hosts in brackets.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Old and new address of a completed address change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressChange {
    pub old_address: String,
    pub new_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_camel_case() {
        let status = ServerStatus::running(TransportKind::Stream, "127.0.0.1", 9100);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["isRunning"], true);
        assert_eq!(json["transport"], "stream");
        assert_eq!(json["host"], "127.0.0.1");
        assert_eq!(json["port"], 9100);
    }

    #[test]
    fn test_address_formatting() {
        assert_eq!(
            ServerStatus::stopped(TransportKind::Datagram, "10.0.0.1", 5019).address(),
            "10.0.0.1:5019"
        );
        assert_eq!(
            ServerStatus::stopped(TransportKind::Datagram, "::1", 5019).address(),
            "[::1]:5019"
        );
    }
}
