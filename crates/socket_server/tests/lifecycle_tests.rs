//! Lifecycle tests for the server manager: start, stop, restart and address
//! changes against real sockets on the loopback interface.

use async_trait::async_trait;
use socket_server::transport::ServeContext;
use socket_server::{
    DatagramServerManager, DatagramTransport, ServerError, ServerManager, ServerTimings,
    StreamServerManager, StreamTransport, Transport, TransportKind,
};
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::time::{Duration, Instant};

fn test_timings() -> ServerTimings {
    ServerTimings::default()
        .with_send_interval(Duration::from_millis(50))
        .with_rebind_delay(Duration::from_millis(20))
        .with_shutdown_timeout(Duration::from_secs(2))
        .with_error_backoff(Duration::from_millis(20))
        .with_batch_interval(Duration::from_millis(1))
}

fn stream_manager() -> StreamServerManager {
    StreamServerManager::new(StreamTransport::new(), test_timings())
}

fn datagram_manager() -> DatagramServerManager {
    DatagramServerManager::new(DatagramTransport::new(), test_timings())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_then_status_reports_address() {
    let manager = stream_manager();
    let addr = manager.start("127.0.0.1", 0, "hello").await.unwrap();

    let status = manager.status();
    assert!(status.is_running);
    assert_eq!(status.host, "127.0.0.1");
    assert_eq!(status.port, addr.port());

    manager.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_while_running_changes_nothing() {
    let manager = stream_manager();
    let addr = manager.start("127.0.0.1", 0, "first").await.unwrap();

    let result = manager.start("127.0.0.1", 0, "second").await;
    match result {
        Err(ServerError::AlreadyRunning { host, port }) => {
            assert_eq!(host, "127.0.0.1");
            assert_eq!(port, addr.port());
        }
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }

    let status = manager.status();
    assert!(status.is_running);
    assert_eq!(status.port, addr.port());
    assert_eq!(manager.message(), "first");

    manager.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_is_idempotent() {
    let manager = datagram_manager();
    manager.stop().await;
    assert!(!manager.is_running());

    manager.start("127.0.0.1", 0, "m").await.unwrap();
    manager.stop().await;
    manager.stop().await;
    assert!(!manager.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_change_address_when_stopped_fails() {
    let manager = stream_manager();
    let before = manager.status();

    let result = manager.change_address("127.0.0.1", 9200).await;
    assert!(matches!(result, Err(ServerError::NotRunning)));
    assert_eq!(manager.status(), before);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_change_address_moves_stream_server_and_frees_old_port() {
    let manager = stream_manager();
    let old = manager.start("127.0.0.1", 0, "moving").await.unwrap();

    let change = manager.change_address("127.0.0.1", 0).await.unwrap();
    let status = manager.status();
    assert!(status.is_running);
    assert_ne!(status.port, old.port());
    assert_eq!(change.old_address, old.to_string());
    assert_eq!(change.new_address, status.address());
    assert_eq!(manager.message(), "moving");

    // Nothing holds the previous port any more
    let rebound = TcpListener::bind(old).expect("old address should be free");
    drop(rebound);

    manager.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_change_address_moves_datagram_server_and_frees_old_port() {
    let manager = datagram_manager();
    let old = manager.start("127.0.0.1", 0, "moving").await.unwrap();

    manager.change_address("127.0.0.1", 0).await.unwrap();
    assert!(manager.is_running());
    assert_ne!(manager.status().port, old.port());

    let rebound = UdpSocket::bind(old).expect("old address should be free");
    drop(rebound);

    manager.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_restart_leaves_server_stopped() {
    let manager = stream_manager();
    manager.start("127.0.0.1", 0, "m").await.unwrap();

    let blocker = TcpListener::bind("127.0.0.1:0").unwrap();
    let taken = blocker.local_addr().unwrap().port();

    let result = manager.change_address("127.0.0.1", taken).await;
    assert!(matches!(result, Err(ServerError::Bind { .. })));
    assert!(!manager.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_restart_on_same_port() {
    let manager = stream_manager();
    let addr = manager.start("127.0.0.1", 0, "again").await.unwrap();

    let client = tokio::net::TcpStream::connect(addr).await.unwrap();
    manager.stop().await;
    drop(client);

    let again = manager
        .start("127.0.0.1", addr.port(), "again")
        .await
        .expect("a just-freed port should be reusable");
    assert_eq!(again, addr);

    manager.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_message_while_stopped_succeeds() {
    let manager = datagram_manager();
    manager.update_message("queued");
    assert_eq!(manager.message(), "queued");
    assert!(!manager.is_running());
}

/// Transport whose only task ignores cancellation and outlives any stop.
struct UnresponsiveTransport;

#[async_trait]
impl Transport for UnresponsiveTransport {
    type Handle = ();

    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    async fn launch(
        &self,
        addr: SocketAddr,
        ctx: ServeContext,
    ) -> Result<(SocketAddr, Self::Handle), ServerError> {
        ctx.tracker.spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        Ok((addr, ()))
    }

    async fn reset(&self) {}
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_gives_up_after_shutdown_timeout() {
    let timings = test_timings().with_shutdown_timeout(Duration::from_millis(300));
    let manager = ServerManager::new(UnresponsiveTransport, timings);
    manager.start("127.0.0.1", 4000, "stuck").await.unwrap();
    assert!(manager.is_running());

    let started = Instant::now();
    manager.stop().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(250), "stop returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "stop took {elapsed:?}");
    assert!(!manager.is_running());
    assert_eq!(manager.status().port, 4000);

    // State was cleared, so the manager can run again
    manager.start("127.0.0.1", 4001, "again").await.unwrap();
    assert!(manager.is_running());
    manager.stop().await;
}
