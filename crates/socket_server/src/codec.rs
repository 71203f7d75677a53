//! Wire framing for the stream transport.
//!
//! Every outbound message is a 4-byte big-endian length followed by the UTF-8
//! payload. Inbound bytes are not framed. Datagrams carry the raw payload.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Encodes `message` as a length-prefixed frame.
pub fn encode_frame(message: &str) -> io::Result<Vec<u8>> {
    let payload = message.as_bytes();
    let len = u32::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message of {} bytes does not fit a 32-bit length prefix", payload.len()),
        )
    })?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Reads one length-prefixed frame.
///
/// Returns `Ok(None)` when the stream ends before any prefix byte. A stream
/// that ends inside the prefix or the payload is an `UnexpectedEof` error.
/// Payloads larger than `max_len` are rejected.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        match reader.read(&mut prefix[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended after {filled} of {LENGTH_PREFIX_LEN} prefix bytes"),
                ))
            }
            n => filled += n,
        }
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {len} exceeds limit {max_len}"),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    String::from_utf8(payload)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
