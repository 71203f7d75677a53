//! Transport listeners.
//!
//! Owns the raw OS sockets. Both listeners race their blocking calls against
//! the run's cancellation token and report cancellation as
//! [`ListenerError::Closed`], which the serving loops treat as the normal end
//! of their work rather than as a fault.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ServerError;

const LISTEN_BACKLOG: i32 = 1024;

/// Outcome of a failed accept or receive.
#[derive(Debug)]
pub enum ListenerError {
    /// The listener was closed by shutdown
    Closed,
    /// A genuine I/O fault; the caller backs off and retries
    Io(io::Error),
}

/// Listening stream socket.
#[derive(Debug)]
pub struct StreamListener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl StreamListener {
    /// Binds a listening socket at `addr`.
    ///
    /// Address reuse is enabled so a port released by a previous run can be
    /// bound again straight away. Must be called from within the runtime.
    pub fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::bind(addr, e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::bind(addr, e))?;
        socket.bind(&addr.into()).map_err(|e| ServerError::bind(addr, e))?;
        socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| ServerError::bind(addr, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::bind(addr, e))?;

        let std_listener: StdTcpListener = socket.into();
        let inner = TcpListener::from_std(std_listener).map_err(|e| ServerError::bind(addr, e))?;
        let local_addr = inner.local_addr().map_err(|e| ServerError::bind(addr, e))?;

        debug!(%local_addr, "Stream listener bound");
        Ok(Self { inner, local_addr })
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the next peer, or for `cancel`.
    pub async fn accept(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(TcpStream, SocketAddr), ListenerError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ListenerError::Closed),
            result = self.inner.accept() => result.map_err(ListenerError::Io),
        }
    }
}

/// Bound datagram socket, shared between the receive loop and the batch
/// dispatcher.
#[derive(Debug, Clone)]
pub struct DatagramListener {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl DatagramListener {
    /// Binds a datagram socket at `addr`.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))?;
        let local_addr = socket.local_addr().map_err(|e| ServerError::bind(addr, e))?;

        debug!(%local_addr, "Datagram socket bound");
        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the next datagram, or for `cancel`.
    pub async fn recv_from(
        &self,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<(usize, SocketAddr), ListenerError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ListenerError::Closed),
            result = self.socket.recv_from(buf) => result.map_err(ListenerError::Io),
        }
    }

    /// Sends one unframed datagram to `target`.
    pub async fn send_to(&self, payload: &[u8], target: SocketAddr) -> io::Result<()> {
        let sent = self.socket.send_to(payload, target).await?;
        if sent != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {sent} of {} bytes", payload.len()),
            ));
        }
        Ok(())
    }
}
