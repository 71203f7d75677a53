//! Table of live stream connections.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ClientConnection, ConnectionId};

/// Concurrent table of accepted peers.
///
/// The accept loop inserts, each handler removes its own entry on exit.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: DashMap<ConnectionId, ClientConnection>,
    next_id: AtomicUsize,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted peer and returns its identifier.
    pub fn add_connection(&self, remote_addr: SocketAddr) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.connections.insert(id, ClientConnection::new(id, remote_addr));
        id
    }

    pub fn remove_connection(&self, id: ConnectionId) -> Option<ClientConnection> {
        self.connections.remove(&id).map(|(_, connection)| connection)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Snapshot of all live peers, ordered by identifier.
    pub fn connections(&self) -> Vec<ClientConnection> {
        let mut all: Vec<_> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|c| c.id);
        all
    }

    pub fn clear(&self) {
        self.connections.clear();
    }
}
