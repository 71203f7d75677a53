//! Error types for the socket server.
//!
//! Precondition and bind failures are returned to the caller. Accept, receive
//! and per-peer faults never leave the loops that hit them; they are built
//! here so every log line carries the same wording.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the lifecycle controller and its loops.
#[derive(Error, Debug)]
pub enum ServerError {
    /// `start` was called while a server instance is already live
    #[error("Server is already running on {host}:{port}")]
    AlreadyRunning { host: String, port: u16 },

    /// The operation needs a running server
    #[error("Server is not running")]
    NotRunning,

    /// The host is not a literal IP address
    #[error("Invalid host address: {0}")]
    InvalidAddress(String),

    /// The socket could not be created, bound or put into listening state
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A batch asked for a message count outside 1..=100
    #[error("Message count must be between 1 and {max}, got {count}")]
    InvalidCount { count: usize, max: usize },

    /// Transient fault while accepting a stream peer
    #[error("Failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// Transient fault while receiving a datagram
    #[error("Failed to receive datagram: {0}")]
    Receive(#[source] io::Error),

    /// Fault on a single peer; only that peer's handler is affected
    #[error("I/O error on peer {peer}: {source}")]
    PeerIo {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The graceful join in `stop` ran past its deadline
    #[error("Timed out after {0:?} waiting for server tasks to finish")]
    ShutdownTimeout(Duration),

    /// A server task failed in a way that is not an I/O fault
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Wraps a bind-time I/O failure.
    pub fn bind(addr: SocketAddr, source: io::Error) -> Self {
        ServerError::Bind { addr, source }
    }

    /// Wraps a per-peer I/O failure.
    pub fn peer_io(peer: SocketAddr, source: io::Error) -> Self {
        ServerError::PeerIo { peer, source }
    }

    /// True for failures caused by the caller's input or the server state
    /// rather than by the operating system.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ServerError::AlreadyRunning { .. }
                | ServerError::NotRunning
                | ServerError::InvalidAddress(_)
                | ServerError::InvalidCount { .. }
        )
    }
}
