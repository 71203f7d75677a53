//! Stream peer management.
//!
//! Tracks live stream connections and runs the per-peer send loop.

pub mod client;
pub mod handler;
pub mod manager;

pub use client::ClientConnection;
pub use handler::handle_connection;
pub use manager::ConnectionManager;

/// Type alias for connection identifiers.
///
/// Identifiers are unique for the lifetime of a [`ConnectionManager`], across
/// restarts.
pub type ConnectionId = usize;
