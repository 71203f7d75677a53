//! Connected stream peer representation.

use serde::Serialize;
use std::net::SocketAddr;
use std::time::SystemTime;

use super::ConnectionId;
use crate::utils::unix_timestamp;

/// One live stream peer as seen by the operator.
///
/// The socket itself stays with the handler task; this is only the metadata
/// kept in the connection table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConnection {
    /// Identifier assigned at accept time
    pub id: ConnectionId,

    /// The remote network address of the peer
    pub remote_addr: SocketAddr,

    /// Unix seconds at which the connection was accepted
    pub connected_at: u64,
}

impl ClientConnection {
    pub fn new(id: ConnectionId, remote_addr: SocketAddr) -> Self {
        Self {
            id,
            remote_addr,
            connected_at: unix_timestamp(SystemTime::now()),
        }
    }
}
