//! # Socket Server - Runtime-Reconfigurable Broadcast Server
//!
//! A server that can be started, stopped and moved to a new address while
//! live, broadcasting an operator-controlled message to every connected peer
//! over either a stream (TCP) or a datagram (UDP) transport.
//!
//! ## Architecture Overview
//!
//! * **Listeners** ([`listener`]) - Own the OS sockets and report shutdown
//!   as a distinct `Closed` outcome
//! * **Transports** ([`transport`]) - Bind a socket and launch the serving
//!   loop for one run
//! * **Stream peers** ([`connection`]) - One handler task per accepted peer,
//!   sending a length-prefixed frame every send interval
//! * **Datagram peers** ([`datagram`]) - A registry of sender addresses,
//!   broadcast on every receive and on demand in numbered batches
//! * **Lifecycle controller** ([`server`]) - Serializes start, stop and
//!   address changes; publishes status without blocking readers
//! * **Control plane** ([`control`]) - Validates operator commands and shapes
//!   JSON replies with HTTP-like status codes
//!
//! ## Shutdown
//!
//! Every run owns a cancellation token and a task tracker. Stopping cancels
//! the token, which every blocking call races, then joins the tracked tasks
//! within `shutdown_timeout`. Peer state is cleared either way.
//!
//! ## Wire Format
//!
//! Stream peers receive a 4-byte big-endian length followed by the UTF-8
//! message. Datagram peers receive the raw UTF-8 message.

pub use config::{ServerConfig, ServerTimings, TransportKind};
pub use control::{ControlCommand, ControlPlane, ControlResponse, ManagedServer};
pub use datagram::BatchReport;
pub use error::ServerError;
pub use server::{AddressChange, DatagramServerManager, ServerManager, ServerStatus, StreamServerManager};
pub use transport::{DatagramTransport, StreamTransport, Transport};
pub use utils::{create_datagram_server, create_server, create_stream_server};

pub mod codec;
pub mod config;
pub mod connection;
pub mod control;
pub mod datagram;
pub mod error;
pub mod listener;
pub mod server;
pub mod transport;
pub mod utils;
