//! Line-delimited JSON control console.
//!
//! Each input line is one tagged command, e.g.
//! `{"command":"change-address","newHost":"127.0.0.1","newPort":9200}`; each
//! reply is written as one JSON line.

use anyhow::Result;
use socket_server::ControlPlane;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Serves commands from stdin until it is closed.
pub async fn run_console(plane: ControlPlane) -> Result<()> {
    info!("Control console ready; send one JSON command per line");
    let served = serve_lines(
        &plane,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    info!(served, "Control console input closed");
    Ok(())
}

/// Answers every non-blank line of `reader` on `writer`.
///
/// Returns the number of commands handled.
pub async fn serve_lines<R, W>(plane: &ControlPlane, reader: R, mut writer: W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut served = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = plane.handle_line(line).await;
        if response.is_success() {
            debug!(status_code = response.status_code, "Control command handled");
        } else {
            warn!(status_code = response.status_code, body = %response.body, "Control command rejected");
        }

        let mut reply = serde_json::to_vec(&response)?;
        reply.push(b'\n');
        writer.write_all(&reply).await?;
        writer.flush().await?;
        served += 1;
    }

    Ok(served)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use socket_server::{create_datagram_server, ManagedServer};

    #[tokio::test]
    async fn test_serve_lines_answers_each_command() {
        let plane = ControlPlane::new(ManagedServer::Datagram(create_datagram_server()));
        let input = concat!(
            "{\"command\":\"status\"}\n",
            "\n",
            "{\"command\":\"update-message\",\"message\":\"hi\"}\n",
            "garbage\n",
        );
        let mut output = Vec::new();

        let served = serve_lines(&plane, input.as_bytes(), &mut output).await.unwrap();
        assert_eq!(served, 3);

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["statusCode"], 200);
        assert_eq!(replies[0]["body"]["isRunning"], false);
        assert_eq!(replies[1]["body"]["newMessage"], "hi");
        assert_eq!(replies[2]["statusCode"], 400);
    }
}
