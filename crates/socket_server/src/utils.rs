//! Utility functions for creating server managers and stamping replies.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{ServerTimings, TransportKind};
use crate::control::ManagedServer;
use crate::server::{DatagramServerManager, StreamServerManager};
use crate::transport::{DatagramTransport, StreamTransport};

/// Seconds since the Unix epoch for `time`; 0 for times before the epoch.
pub fn unix_timestamp(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Seconds since the Unix epoch, now.
pub fn current_timestamp() -> u64 {
    unix_timestamp(SystemTime::now())
}

/// Creates a stopped stream manager with the default cadence.
pub fn create_stream_server() -> Arc<StreamServerManager> {
    create_stream_server_with_timings(ServerTimings::default())
}

pub fn create_stream_server_with_timings(timings: ServerTimings) -> Arc<StreamServerManager> {
    Arc::new(StreamServerManager::new(StreamTransport::new(), timings))
}

/// Creates a stopped datagram manager with the default cadence.
pub fn create_datagram_server() -> Arc<DatagramServerManager> {
    create_datagram_server_with_timings(ServerTimings::default())
}

pub fn create_datagram_server_with_timings(timings: ServerTimings) -> Arc<DatagramServerManager> {
    Arc::new(DatagramServerManager::new(DatagramTransport::new(), timings))
}

/// Creates a stopped manager for `kind`, ready to hand to a control plane.
pub fn create_server(kind: TransportKind, timings: ServerTimings) -> ManagedServer {
    match kind {
        TransportKind::Stream => ManagedServer::Stream(create_stream_server_with_timings(timings)),
        TransportKind::Datagram => {
            ManagedServer::Datagram(create_datagram_server_with_timings(timings))
        }
    }
}
