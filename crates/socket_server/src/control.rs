//! Control plane: validated operator commands and JSON-shaped replies.
//!
//! Every operation takes a loosely typed request (fields may be missing or
//! out of range), validates it, drives the manager and answers with an
//! HTTP-like status code plus a camelCase JSON body. The framing that carries
//! these commands is up to the embedder; [`ControlPlane::handle_line`] accepts
//! one tagged JSON object per call.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{ServerConfig, TransportKind};
use crate::datagram::MAX_BATCH_COUNT;
use crate::error::ServerError;
use crate::server::{AddressChange, DatagramServerManager, ServerStatus, StreamServerManager};
use crate::utils::current_timestamp;

/// A manager of either transport, as driven by the control plane.
#[derive(Clone)]
pub enum ManagedServer {
    Stream(Arc<StreamServerManager>),
    Datagram(Arc<DatagramServerManager>),
}

impl ManagedServer {
    pub fn kind(&self) -> TransportKind {
        match self {
            ManagedServer::Stream(_) => TransportKind::Stream,
            ManagedServer::Datagram(_) => TransportKind::Datagram,
        }
    }

    pub fn status(&self) -> ServerStatus {
        match self {
            ManagedServer::Stream(server) => server.status(),
            ManagedServer::Datagram(server) => server.status(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ManagedServer::Stream(server) => server.message(),
            ManagedServer::Datagram(server) => server.message(),
        }
    }

    pub async fn start(&self, host: &str, port: u16, message: &str) -> Result<SocketAddr, ServerError> {
        match self {
            ManagedServer::Stream(server) => server.start(host, port, message).await,
            ManagedServer::Datagram(server) => server.start(host, port, message).await,
        }
    }

    pub async fn start_with(&self, config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        match self {
            ManagedServer::Stream(server) => server.start_with(config).await,
            ManagedServer::Datagram(server) => server.start_with(config).await,
        }
    }

    pub async fn stop(&self) {
        match self {
            ManagedServer::Stream(server) => server.stop().await,
            ManagedServer::Datagram(server) => server.stop().await,
        }
    }

    pub async fn change_address(&self, host: &str, port: u16) -> Result<AddressChange, ServerError> {
        match self {
            ManagedServer::Stream(server) => server.change_address(host, port).await,
            ManagedServer::Datagram(server) => server.change_address(host, port).await,
        }
    }

    pub fn update_message(&self, message: &str) {
        match self {
            ManagedServer::Stream(server) => server.update_message(message),
            ManagedServer::Datagram(server) => server.update_message(message),
        }
    }

    /// Live stream connections or registered datagram peers.
    pub async fn peer_count(&self) -> usize {
        match self {
            ManagedServer::Stream(server) => server.connections().len(),
            ManagedServer::Datagram(server) => server.peers().await.len(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub host: Option<String>,
    pub port: Option<i64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeAddressRequest {
    pub new_host: Option<String>,
    pub new_port: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessageRequest {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagesRequest {
    pub count: Option<i64>,
    pub custom_message: Option<String>,
}

/// One operator command, tagged by its `command` field.
///
/// ```json
/// {"command": "start", "host": "127.0.0.1", "port": 9100, "message": "hello"}
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum ControlCommand {
    Start(StartRequest),
    Stop,
    ChangeAddress(ChangeAddressRequest),
    UpdateMessage(UpdateMessageRequest),
    Status,
    SendMessages(SendMessagesRequest),
}

/// Reply to a control command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub status_code: u16,
    pub body: Value,
}

impl ControlResponse {
    pub fn ok(body: Value) -> Self {
        Self { status_code: 200, body }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status_code: 400,
            body: json!({ "message": message.into() }),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status_code: 409,
            body: json!({ "message": message.into() }),
        }
    }

    pub fn internal_error(message: &str, err: &ServerError) -> Self {
        Self {
            status_code: 500,
            body: json!({ "message": message, "error": err.to_string() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn valid_port(port: Option<i64>) -> Option<u16> {
    port.and_then(|p| u16::try_from(p).ok()).filter(|&p| p > 0)
}

/// Validates commands and applies them to one managed server.
#[derive(Clone)]
pub struct ControlPlane {
    server: ManagedServer,
}

impl ControlPlane {
    pub fn new(server: ManagedServer) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &ManagedServer {
        &self.server
    }

    pub async fn start(&self, request: StartRequest) -> ControlResponse {
        let Some(host) = non_blank(request.host.as_deref()) else {
            return ControlResponse::bad_request("Host is required");
        };
        let Some(port) = valid_port(request.port) else {
            return ControlResponse::bad_request("Port must be between 1 and 65535");
        };
        // The payload itself is sent untrimmed
        let Some(message) = request.message.as_deref().filter(|m| !m.trim().is_empty()) else {
            return ControlResponse::bad_request("Message is required");
        };

        match self.server.start(host, port, message).await {
            Ok(addr) => {
                info!(%addr, "Server started via control plane");
                ControlResponse::ok(json!({
                    "message": "Server started successfully",
                    "transport": self.server.kind(),
                    "host": host,
                    "port": addr.port(),
                    "status": "started",
                    "startedAt": current_timestamp(),
                }))
            }
            Err(e @ ServerError::AlreadyRunning { .. }) => ControlResponse::conflict(e.to_string()),
            Err(e @ ServerError::InvalidAddress(_)) => ControlResponse::bad_request(e.to_string()),
            Err(e) => {
                error!("Error starting server: {}", e);
                ControlResponse::internal_error("Failed to start server", &e)
            }
        }
    }

    pub async fn stop(&self) -> ControlResponse {
        self.server.stop().await;
        info!("Server stopped via control plane");
        ControlResponse::ok(json!({
            "message": "Server stopped successfully",
            "status": "stopped",
            "stoppedAt": current_timestamp(),
        }))
    }

    pub async fn change_address(&self, request: ChangeAddressRequest) -> ControlResponse {
        let Some(new_host) = non_blank(request.new_host.as_deref()) else {
            return ControlResponse::bad_request("NewHost is required");
        };
        let Some(new_port) = valid_port(request.new_port) else {
            return ControlResponse::bad_request("NewPort must be between 1 and 65535");
        };

        let before = self.server.status();
        match self.server.change_address(new_host, new_port).await {
            Ok(change) => {
                let after = self.server.status();
                info!(from = %change.old_address, to = %change.new_address, "Server address changed via control plane");
                ControlResponse::ok(json!({
                    "message": "Server address changed successfully",
                    "oldHost": before.host,
                    "oldPort": before.port,
                    "newHost": after.host,
                    "newPort": after.port,
                    "oldAddress": change.old_address,
                    "newAddress": change.new_address,
                    "status": "address_changed",
                    "changedAt": current_timestamp(),
                }))
            }
            Err(e @ ServerError::InvalidAddress(_)) => ControlResponse::bad_request(e.to_string()),
            Err(e) => {
                error!("Error changing server address: {}", e);
                ControlResponse::internal_error("Failed to change server address", &e)
            }
        }
    }

    pub fn update_message(&self, request: UpdateMessageRequest) -> ControlResponse {
        let Some(message) = request.message.as_deref().filter(|m| !m.trim().is_empty()) else {
            return ControlResponse::bad_request("Message is required");
        };

        self.server.update_message(message);
        ControlResponse::ok(json!({
            "message": "Server message updated successfully",
            "newMessage": message,
            "status": "message_updated",
            "updatedAt": current_timestamp(),
        }))
    }

    pub async fn status(&self) -> ControlResponse {
        let status = self.server.status();
        let peers = self.server.peer_count().await;
        ControlResponse::ok(json!({
            "isRunning": status.is_running,
            "transport": status.transport,
            "host": status.host,
            "port": status.port,
            "peers": peers,
            "currentMessage": self.server.message(),
            "status": if status.is_running { "running" } else { "stopped" },
            "checkedAt": current_timestamp(),
        }))
    }

    pub async fn send_messages(&self, request: SendMessagesRequest) -> ControlResponse {
        let ManagedServer::Datagram(server) = &self.server else {
            return ControlResponse::bad_request(
                "send-messages is only supported by the datagram transport",
            );
        };

        if !server.is_running() {
            return ControlResponse::bad_request(ServerError::NotRunning.to_string());
        }
        let count = match request.count.map(usize::try_from) {
            Some(Ok(count)) if (1..=MAX_BATCH_COUNT).contains(&count) => count,
            _ => {
                return ControlResponse::bad_request(format!(
                    "Message count must be between 1 and {MAX_BATCH_COUNT}"
                ))
            }
        };

        match server
            .send_messages(count, request.custom_message.as_deref())
            .await
        {
            Ok(report) => ControlResponse::ok(json!({
                "message": format!("Sent {} messages out of {}", report.sent_count, count),
                "sentCount": report.sent_count,
                "failedCount": report.failed_count,
                "status": "completed",
                "sentAt": current_timestamp(),
            })),
            Err(e) if e.is_precondition() => {
                warn!("Batch rejected: {}", e);
                ControlResponse::bad_request(e.to_string())
            }
            Err(e) => {
                error!("Error sending messages: {}", e);
                ControlResponse::internal_error("Failed to send messages", &e)
            }
        }
    }

    /// Routes a parsed command to its operation.
    pub async fn dispatch(&self, command: ControlCommand) -> ControlResponse {
        match command {
            ControlCommand::Start(request) => self.start(request).await,
            ControlCommand::Stop => self.stop().await,
            ControlCommand::ChangeAddress(request) => self.change_address(request).await,
            ControlCommand::UpdateMessage(request) => self.update_message(request),
            ControlCommand::Status => self.status().await,
            ControlCommand::SendMessages(request) => self.send_messages(request).await,
        }
    }

    /// Parses one JSON command and dispatches it.
    pub async fn handle_line(&self, line: &str) -> ControlResponse {
        match serde_json::from_str::<ControlCommand>(line) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                warn!(error = %e, "Rejected malformed control command");
                ControlResponse::bad_request(format!("Invalid command: {e}"))
            }
        }
    }
}
