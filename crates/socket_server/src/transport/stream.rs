//! Stream (TCP) transport: accept loop plus one handler task per peer.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{ServeContext, Transport};
use crate::config::TransportKind;
use crate::connection::{handle_connection, ClientConnection, ConnectionManager};
use crate::error::ServerError;
use crate::listener::{ListenerError, StreamListener};

/// Connection-oriented transport.
#[derive(Debug, Default)]
pub struct StreamTransport {
    connections: Arc<ConnectionManager>,
}

impl StreamTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peers with a live handler.
    pub fn connections(&self) -> Vec<ClientConnection> {
        self.connections.connections()
    }
}

#[async_trait]
impl Transport for StreamTransport {
    type Handle = ();

    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    async fn launch(
        &self,
        addr: SocketAddr,
        ctx: ServeContext,
    ) -> Result<(SocketAddr, Self::Handle), ServerError> {
        let listener = StreamListener::bind(addr)?;
        let local_addr = listener.local_addr();

        let tracker = ctx.tracker.clone();
        tracker.spawn(accept_loop(listener, ctx, self.connections.clone()));

        Ok((local_addr, ()))
    }

    async fn reset(&self) {
        let leftover = self.connections.connection_count();
        if leftover > 0 {
            warn!(leftover, "Dropping connection entries of handlers that outlived shutdown");
        }
        self.connections.clear();
    }
}

/// Accepts peers until the run is cancelled. The listener is dropped, and
/// the port released, as soon as this returns.
async fn accept_loop(
    listener: StreamListener,
    ctx: ServeContext,
    connections: Arc<ConnectionManager>,
) {
    let local_addr = listener.local_addr();
    info!(%local_addr, "Accept loop started");

    loop {
        match listener.accept(&ctx.cancel).await {
            Ok((stream, peer)) => {
                let id = connections.add_connection(peer);
                info!(connection_id = id, %peer, "Peer connected");

                let handler_ctx = ctx.clone();
                let connections = connections.clone();
                ctx.tracker.spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, handler_ctx).await {
                        error!(connection_id = id, "Connection error: {}", e);
                    }
                    connections.remove_connection(id);
                    info!(connection_id = id, %peer, "Peer disconnected");
                });
            }
            Err(ListenerError::Closed) => {
                debug!(%local_addr, "Listener closed");
                break;
            }
            Err(ListenerError::Io(e)) => {
                error!("{}", ServerError::Accept(e));
                if !ctx.pause(ctx.timings.error_backoff).await {
                    break;
                }
            }
        }
    }

    info!(%local_addr, "Accept loop finished");
}
