//! Core lifecycle controller.
//!
//! This module contains [`ServerManager`], which enforces the
//! at-most-one-running invariant and serializes every start, stop and
//! address change behind a single async mutex. Status reads go through a
//! watch channel and never touch that mutex.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::status::{AddressChange, ServerStatus};
use crate::config::{parse_socket_addr, ServerConfig, ServerTimings};
use crate::connection::ClientConnection;
use crate::datagram::{send_batch, validate_count, BatchReport};
use crate::error::ServerError;
use crate::transport::{DatagramTransport, ServeContext, StreamTransport, Transport};

/// Manager driving the stream transport.
pub type StreamServerManager = ServerManager<StreamTransport>;

/// Manager driving the datagram transport.
pub type DatagramServerManager = ServerManager<DatagramTransport>;

/// State of one live run. Exists exactly while the server is running.
struct RunningServer<H> {
    cancel: CancellationToken,
    tracker: TaskTracker,
    handle: H,
    host: String,
    port: u16,
}

type Lifecycle<H> = Option<RunningServer<H>>;

/// Runtime-reconfigurable server controller.
///
/// A manager can be started, stopped and moved to a new address any number
/// of times. Each run gets a fresh cancellation token and task tracker; the
/// current message is shared across runs and can be replaced at any time.
///
/// # Examples
///
/// ```no_run
/// use socket_server::{ServerTimings, StreamServerManager, StreamTransport};
///
/// # async fn run() -> Result<(), socket_server::ServerError> {
/// let manager = StreamServerManager::new(StreamTransport::new(), ServerTimings::default());
/// manager.start("127.0.0.1", 9100, "hello").await?;
/// manager.update_message("hello again");
/// manager.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct ServerManager<T: Transport> {
    transport: T,
    timings: ServerTimings,
    lifecycle: Mutex<Lifecycle<T::Handle>>,
    status: watch::Sender<ServerStatus>,
    message: watch::Sender<String>,
}

impl<T: Transport> ServerManager<T> {
    /// Creates a stopped manager.
    pub fn new(transport: T, timings: ServerTimings) -> Self {
        let kind = transport.kind();
        let (status, _) = watch::channel(ServerStatus::stopped(
            kind,
            "127.0.0.1",
            kind.default_port(),
        ));
        let (message, _) = watch::channel(String::new());

        Self {
            transport,
            timings,
            lifecycle: Mutex::new(None),
            status,
            message,
        }
    }

    /// Binds `host:port` and starts serving `message`.
    ///
    /// Returns the bound address. Fails with [`ServerError::AlreadyRunning`]
    /// without touching the running instance, or with a bind/address error
    /// leaving the manager stopped.
    pub async fn start(
        &self,
        host: &str,
        port: u16,
        message: &str,
    ) -> Result<SocketAddr, ServerError> {
        let mut lifecycle = self.lifecycle.lock().await;

        if let Some(running) = lifecycle.as_ref() {
            let err = ServerError::AlreadyRunning {
                host: running.host.clone(),
                port: running.port,
            };
            warn!("Start rejected: {}", err);
            return Err(err);
        }

        self.start_locked(&mut lifecycle, host, port, message).await
    }

    /// Starts with the address and payload of `config`.
    pub async fn start_with(&self, config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        self.start(&config.host, config.port, &config.message).await
    }

    /// Stops the running instance, if any.
    ///
    /// Cancels every task of the run, then waits for them for at most
    /// `shutdown_timeout`. State is cleared even if the wait times out.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.stop_locked(&mut lifecycle).await;
    }

    /// Moves the running server to `new_host:new_port`.
    ///
    /// The current message carries over. The manager reads as stopped during
    /// the settle delay between stop and restart; if the restart fails it
    /// stays stopped.
    pub async fn change_address(
        &self,
        new_host: &str,
        new_port: u16,
    ) -> Result<AddressChange, ServerError> {
        let mut lifecycle = self.lifecycle.lock().await;

        if lifecycle.is_none() {
            warn!("Address change rejected: {}", ServerError::NotRunning);
            return Err(ServerError::NotRunning);
        }
        // Reject a bad host before tearing anything down
        parse_socket_addr(new_host, new_port)?;

        let old_address = self.status().address();
        let message = self.message();
        info!(from = %old_address, to_host = new_host, to_port = new_port, "Changing server address");

        self.stop_locked(&mut lifecycle).await;
        tokio::time::sleep(self.timings.rebind_delay).await;
        self.start_locked(&mut lifecycle, new_host, new_port, &message)
            .await?;

        Ok(AddressChange {
            old_address,
            new_address: self.status().address(),
        })
    }

    /// Replaces the payload. Handlers pick it up on their next send.
    pub fn update_message(&self, message: &str) {
        self.message.send_replace(message.to_string());
        info!(message, "Message updated");
    }

    /// Current state. Never waits on a transition in progress.
    pub fn status(&self) -> ServerStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe_status(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.status.borrow().is_running
    }

    /// The payload currently being sent.
    pub fn message(&self) -> String {
        self.message.borrow().clone()
    }

    /// Address of the current (or last) run together with the current
    /// payload. Before the first start this is the transport's default
    /// address.
    pub fn config(&self) -> ServerConfig {
        let status = self.status.borrow();
        ServerConfig::new(status.host.clone(), status.port, self.message())
    }

    async fn start_locked(
        &self,
        lifecycle: &mut MutexGuard<'_, Lifecycle<T::Handle>>,
        host: &str,
        port: u16,
        message: &str,
    ) -> Result<SocketAddr, ServerError> {
        let kind = self.transport.kind();
        let addr = parse_socket_addr(host, port).map_err(|e| {
            error!(transport = %kind, "Failed to start server: {}", e);
            e
        })?;

        let previous = self.message.send_replace(message.to_string());
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let ctx = ServeContext {
            cancel: cancel.clone(),
            tracker: tracker.clone(),
            message: self.message.subscribe(),
            timings: self.timings,
        };

        let (local_addr, handle) = match self.transport.launch(addr, ctx).await {
            Ok(launched) => launched,
            Err(e) => {
                self.message.send_replace(previous);
                error!(transport = %kind, "Failed to start server: {}", e);
                return Err(e);
            }
        };

        let host = local_addr.ip().to_string();
        let port = local_addr.port();
        **lifecycle = Some(RunningServer {
            cancel,
            tracker,
            handle,
            host: host.clone(),
            port,
        });
        self.status
            .send_replace(ServerStatus::running(kind, host, port));

        info!(transport = %kind, %local_addr, "Server started");
        Ok(local_addr)
    }

    async fn stop_locked(&self, lifecycle: &mut MutexGuard<'_, Lifecycle<T::Handle>>) {
        let Some(running) = lifecycle.take() else {
            debug!("Stop requested but the server is not running");
            return;
        };
        let kind = self.transport.kind();
        info!(transport = %kind, host = %running.host, port = running.port, "Stopping server");

        running.cancel.cancel();
        running.tracker.close();
        drop(running.handle);

        let deadline = self.timings.shutdown_timeout;
        if tokio::time::timeout(deadline, running.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = running.tracker.len(),
                "{}",
                ServerError::ShutdownTimeout(deadline)
            );
        }

        self.transport.reset().await;
        self.status
            .send_replace(ServerStatus::stopped(kind, running.host, running.port));
        info!(transport = %kind, "Server stopped");
    }
}

impl<T: Transport> Drop for ServerManager<T> {
    fn drop(&mut self) {
        if let Some(running) = self.lifecycle.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

impl ServerManager<StreamTransport> {
    /// Stream peers with a live handler.
    pub fn connections(&self) -> Vec<ClientConnection> {
        self.transport.connections()
    }
}

impl ServerManager<DatagramTransport> {
    /// Sends `count` numbered messages to every registered peer.
    ///
    /// Uses `custom_message` when it is non-empty, the current message
    /// otherwise. The batch runs as a task of the current run, so a
    /// concurrent stop interrupts it and waits for it.
    pub async fn send_messages(
        &self,
        count: usize,
        custom_message: Option<&str>,
    ) -> Result<BatchReport, ServerError> {
        let (socket, cancel, tracker) = {
            let lifecycle = self.lifecycle.lock().await;
            let Some(running) = lifecycle.as_ref() else {
                warn!("Batch rejected: {}", ServerError::NotRunning);
                return Err(ServerError::NotRunning);
            };
            (
                running.handle.clone(),
                running.cancel.clone(),
                running.tracker.clone(),
            )
        };
        validate_count(count).map_err(|e| {
            warn!("Batch rejected: {}", e);
            e
        })?;

        let message = match custom_message {
            Some(custom) if !custom.is_empty() => custom.to_string(),
            _ => self.message(),
        };
        let registry = Arc::clone(self.transport.registry());
        let interval = self.timings.batch_interval;

        let batch = tracker.spawn(async move {
            send_batch(&socket, &registry, count, &message, interval, &cancel).await
        });
        batch.await.map_err(|e| {
            error!("Batch task failed: {}", e);
            ServerError::Internal(e.to_string())
        })
    }

    /// Registered datagram peers.
    pub async fn peers(&self) -> Vec<SocketAddr> {
        self.transport.peers().await
    }
}
