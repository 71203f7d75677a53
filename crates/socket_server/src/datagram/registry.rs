//! Registry of datagram peers.

use std::collections::HashSet;
use std::net::SocketAddr;
use tokio::sync::RwLock;

/// Set of peer addresses that receive broadcasts.
///
/// Shared by the receive loop, which adds senders, and by every broadcast,
/// which removes addresses whose send failed. Broadcasts work on a snapshot
/// so no lock is held across a send.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<HashSet<SocketAddr>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `peer`. Returns `true` if it was not known before.
    pub async fn register(&self, peer: SocketAddr) -> bool {
        self.peers.write().await.insert(peer)
    }

    /// Removes `peer`. Returns `true` if it was present.
    pub async fn remove(&self, peer: SocketAddr) -> bool {
        self.peers.write().await.remove(&peer)
    }

    pub async fn contains(&self, peer: SocketAddr) -> bool {
        self.peers.read().await.contains(&peer)
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Copy of the current members, sorted for stable output.
    pub async fn snapshot(&self) -> Vec<SocketAddr> {
        let mut peers: Vec<_> = self.peers.read().await.iter().copied().collect();
        peers.sort();
        peers
    }

    pub async fn clear(&self) {
        self.peers.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = PeerRegistry::new();
        let peer: SocketAddr = "127.0.0.1:7000".parse().unwrap();

        assert!(registry.register(peer).await);
        assert!(!registry.register(peer).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(peer).await);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let registry = PeerRegistry::new();
        let a: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:7001".parse().unwrap();
        registry.register(a).await;
        registry.register(b).await;

        assert!(registry.remove(a).await);
        assert!(!registry.remove(a).await);
        assert_eq!(registry.snapshot().await, vec![b]);

        registry.clear().await;
        assert!(registry.is_empty().await);
    }
}
