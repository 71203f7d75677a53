//! Datagram peer tracking and broadcast.
//!
//! There is no connection to own: peers are addresses in a [`PeerRegistry`].
//! The receive loop registers senders and answers every datagram with a
//! broadcast; the batch dispatcher sends numbered messages on request.

pub mod dispatcher;
pub mod receiver;
pub mod registry;

pub use dispatcher::{send_batch, validate_count, BatchReport, MAX_BATCH_COUNT};
pub use receiver::receive_loop;
pub use registry::PeerRegistry;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::listener::DatagramListener;

/// Outcome of sending one payload to every registered peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Registry size at the time of the send
    pub peers: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Sends `payload` to every peer in `registry` concurrently.
///
/// Peers whose send fails are removed from the registry. Returns `None` if
/// the run was cancelled before the sends completed.
pub async fn broadcast(
    socket: &DatagramListener,
    registry: &PeerRegistry,
    payload: &[u8],
    cancel: &CancellationToken,
) -> Option<DeliveryReport> {
    let peers = registry.snapshot().await;
    let mut report = DeliveryReport {
        peers: peers.len(),
        ..DeliveryReport::default()
    };
    if peers.is_empty() {
        return Some(report);
    }

    let sends = join_all(peers.iter().map(|&peer| async move {
        (peer, socket.send_to(payload, peer).await)
    }));

    let results = tokio::select! {
        biased;
        _ = cancel.cancelled() => return None,
        results = sends => results,
    };

    for (peer, result) in results {
        match result {
            Ok(()) => {
                debug!(%peer, bytes = payload.len(), "Sent datagram");
                report.delivered += 1;
            }
            Err(e) => {
                error!(%peer, error = %e, "Failed to send datagram, dropping peer");
                registry.remove(peer).await;
                report.failed += 1;
            }
        }
    }

    Some(report)
}
