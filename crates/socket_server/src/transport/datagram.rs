//! Datagram (UDP) transport: a single receive loop over a shared socket.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

use super::{ServeContext, Transport};
use crate::config::TransportKind;
use crate::datagram::{receive_loop, PeerRegistry};
use crate::error::ServerError;
use crate::listener::DatagramListener;

/// Connectionless transport.
///
/// The run handle is the bound socket so batch sends can reuse it while the
/// receive loop owns its own clone.
#[derive(Debug, Default)]
pub struct DatagramTransport {
    registry: Arc<PeerRegistry>,
}

impl DatagramTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Registered peers, sorted.
    pub async fn peers(&self) -> Vec<SocketAddr> {
        self.registry.snapshot().await
    }
}

#[async_trait]
impl Transport for DatagramTransport {
    type Handle = DatagramListener;

    fn kind(&self) -> TransportKind {
        TransportKind::Datagram
    }

    async fn launch(
        &self,
        addr: SocketAddr,
        ctx: ServeContext,
    ) -> Result<(SocketAddr, Self::Handle), ServerError> {
        let listener = DatagramListener::bind(addr).await?;
        let local_addr = listener.local_addr();

        let tracker = ctx.tracker.clone();
        tracker.spawn(receive_loop(listener.clone(), self.registry.clone(), ctx));

        Ok((local_addr, listener))
    }

    async fn reset(&self) {
        let peers = self.registry.len().await;
        debug!(peers, "Clearing peer registry");
        self.registry.clear().await;
    }
}
