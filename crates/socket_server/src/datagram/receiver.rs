//! Receive loop for the datagram transport.

use std::sync::Arc;
use tracing::{debug, error, info};

use super::{broadcast, PeerRegistry};
use crate::error::ServerError;
use crate::listener::{DatagramListener, ListenerError};
use crate::transport::ServeContext;

/// Largest datagram the loop accepts in one read.
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Receives datagrams until the run is cancelled.
///
/// Every sender joins the registry, then the current message is broadcast to
/// all registered peers and the loop rests for `send_interval`. Receive faults
/// are logged and retried after `error_backoff`.
pub async fn receive_loop(
    listener: DatagramListener,
    registry: Arc<PeerRegistry>,
    ctx: ServeContext,
) {
    let local_addr = listener.local_addr();
    info!(%local_addr, "Receive loop started");
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        match listener.recv_from(&mut buf, &ctx.cancel).await {
            Ok((len, peer)) => {
                info!(%peer, data = %String::from_utf8_lossy(&buf[..len]), "Received data");

                if registry.register(peer).await {
                    let peers = registry.len().await;
                    info!(%peer, peers, "New peer registered");
                }

                let message = ctx.current_message();
                match broadcast(&listener, &registry, message.as_bytes(), &ctx.cancel).await {
                    Some(report) => {
                        debug!(
                            delivered = report.delivered,
                            failed = report.failed,
                            "Broadcast current message"
                        );
                    }
                    None => break,
                }

                if !ctx.pause(ctx.timings.send_interval).await {
                    break;
                }
            }
            Err(ListenerError::Closed) => {
                debug!(%local_addr, "Datagram socket closed");
                break;
            }
            Err(ListenerError::Io(e)) => {
                error!("{}", ServerError::Receive(e));
                if !ctx.pause(ctx.timings.error_backoff).await {
                    break;
                }
            }
        }
    }

    info!(%local_addr, "Receive loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerTimings;
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio::sync::watch;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sender_is_registered_and_answered() {
        let listener = DatagramListener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let server_addr = listener.local_addr();
        let registry = Arc::new(PeerRegistry::new());
        let (_message_tx, message_rx) = watch::channel("current".to_string());
        let ctx = ServeContext {
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            message: message_rx,
            timings: ServerTimings::default().with_send_interval(Duration::from_millis(10)),
        };
        let task = tokio::spawn(receive_loop(listener, registry.clone(), ctx.clone()));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"hello", server_addr).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"current");
        assert_eq!(from, server_addr);
        assert!(registry.contains(client.local_addr().unwrap()).await);

        ctx.cancel.cancel();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }
}
