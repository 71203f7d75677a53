//! Per-peer loop for the stream transport.

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::codec::encode_frame;
use crate::error::ServerError;
use crate::transport::ServeContext;

/// Serves one stream peer until it disconnects, faults, or the run is
/// cancelled.
///
/// Each cycle sends the current message as a length-prefixed frame, then
/// waits `send_interval` while draining and logging whatever the peer sends.
/// A zero-byte read or cancellation ends the loop with `Ok`; any read or
/// write fault ends it with [`ServerError::PeerIo`].
pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    ctx: ServeContext,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.split();
    let mut buf = vec![0u8; ctx.timings.read_buffer_size.max(1)];
    let mut sequence: u64 = 1;

    loop {
        let message = ctx.current_message();
        let frame = encode_frame(&message).map_err(|e| ServerError::peer_io(peer, e))?;

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                debug!(%peer, "Peer handler cancelled before send");
                return Ok(());
            }
            written = writer.write_all(&frame) => {
                written.map_err(|e| ServerError::peer_io(peer, e))?;
            }
        }
        info!(%peer, sequence, bytes = frame.len(), "Sent message");
        sequence += 1;

        let wait = tokio::time::sleep(ctx.timings.send_interval);
        tokio::pin!(wait);

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    debug!(%peer, "Peer handler cancelled");
                    return Ok(());
                }
                _ = &mut wait => break,
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        info!(%peer, "Peer closed the connection");
                        return Ok(());
                    }
                    Ok(n) => {
                        info!(%peer, data = %String::from_utf8_lossy(&buf[..n]), "Received data");
                    }
                    Err(e) => return Err(ServerError::peer_io(peer, e)),
                },
            }
        }
    }
}
