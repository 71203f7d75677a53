//! The seam between the lifecycle controller and a concrete socket family.
//!
//! A [`Transport`] binds its socket and launches its serving loop onto the
//! run's task tracker. The controller owns everything else: the cancellation
//! token, the bounded join on stop and the published status.

pub mod datagram;
pub mod stream;

pub use datagram::DatagramTransport;
pub use stream::StreamTransport;

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::{ServerTimings, TransportKind};
use crate::error::ServerError;

/// Everything a serving loop and its handlers need for one run.
///
/// Cloned into every spawned task. `message` always yields the latest value
/// set through `update_message`.
#[derive(Debug, Clone)]
pub struct ServeContext {
    /// Cancelled exactly once, when the run stops
    pub cancel: CancellationToken,
    /// Tracks every task spawned for the run so `stop` can join them
    pub tracker: TaskTracker,
    /// Live payload
    pub message: watch::Receiver<String>,
    pub timings: ServerTimings,
}

impl ServeContext {
    /// Snapshot of the payload to use for the next send.
    pub fn current_message(&self) -> String {
        self.message.borrow().clone()
    }

    /// Sleeps for `duration` unless the run is cancelled first.
    ///
    /// Returns `false` when cancelled.
    pub async fn pause(&self, duration: Duration) -> bool {
        pause(&self.cancel, duration).await
    }
}

/// Cancellation-aware sleep. Returns `false` when `cancel` fired first.
pub async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// A socket family the lifecycle controller can drive.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Per-run value kept by the controller while the server runs and
    /// dropped on stop.
    type Handle: Clone + Send + Sync + 'static;

    fn kind(&self) -> TransportKind;

    /// Binds `addr` and spawns the serving loop on `ctx.tracker`.
    ///
    /// Returns the address actually bound. On error nothing was spawned and
    /// no socket is held.
    async fn launch(
        &self,
        addr: SocketAddr,
        ctx: ServeContext,
    ) -> Result<(SocketAddr, Self::Handle), ServerError>;

    /// Drops per-run peer state after the run's tasks were joined.
    async fn reset(&self);
}
