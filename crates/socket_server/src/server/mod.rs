//! Server lifecycle management.
//!
//! [`ServerManager`] owns one server instance at a time: it binds through a
//! [`Transport`](crate::transport::Transport), tracks the run's tasks and
//! tears everything down on stop.

pub mod core;
pub mod status;

pub use self::core::{DatagramServerManager, ServerManager, StreamServerManager};
pub use status::{AddressChange, ServerStatus};
