//! Unix domain socket server for IPC
//!
//! The server never touches the timer itself. Each command is forwarded to
//! the UI loop, which owns the engine, and the reply comes back over a
//! oneshot channel.

use anyhow::{Context, Result};
use leaven_ipc::{Command, Response};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// A command waiting for the UI loop, with the channel to answer on.
pub type Request = (Command, oneshot::Sender<Response>);

pub async fn start(path: PathBuf, requests: mpsc::UnboundedSender<Request>) -> Result<()> {
    // Remove old socket if it exists
    let _ = std::fs::remove_file(&path);

    let listener = UnixListener::bind(&path)
        .with_context(|| format!("Failed to bind IPC socket at {:?}", path))?;
    info!("IPC server listening on {:?}", path);

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let requests = requests.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, requests).await {
                        error!("Error handling client: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
            }
        }
    }
}

async fn handle_client(stream: UnixStream, requests: mpsc::UnboundedSender<Request>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader.read_line(&mut line).await?;
    let response = match serde_json::from_str::<Command>(&line) {
        Ok(command) => {
            debug!(?command, "IPC command");
            dispatch(command, &requests).await
        }
        Err(e) => Response::Error(format!("Malformed command: {}", e)),
    };

    let mut response_json = serde_json::to_vec(&response)?;
    response_json.push(b'\n');
    writer.write_all(&response_json).await?;
    writer.shutdown().await?;

    Ok(())
}

async fn dispatch(command: Command, requests: &mpsc::UnboundedSender<Request>) -> Response {
    let (reply_tx, reply_rx) = oneshot::channel();
    if requests.send((command, reply_tx)).is_err() {
        return Response::Error("leaven is shutting down".to_string());
    }
    reply_rx
        .await
        .unwrap_or_else(|_| Response::Error("leaven dropped the request".to_string()))
}

/// Removes the socket file when the app exits.
pub struct SocketGuard(pub PathBuf);

impl SocketGuard {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn roundtrip(path: &Path, payload: &[u8]) -> Response {
        let mut stream = UnixStream::connect(path).await.unwrap();
        stream.write_all(payload).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        serde_json::from_slice(&buf).unwrap()
    }

    #[tokio::test]
    async fn forwards_commands_and_returns_replies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaven.sock");
        let (tx, mut rx) = mpsc::unbounded_channel::<Request>();
        tokio::spawn(start(path.clone(), tx));

        // stand-in for the UI loop
        tokio::spawn(async move {
            while let Some((command, reply)) = rx.recv().await {
                let response = match command {
                    Command::Pause => Response::Ok,
                    _ => Response::Error("unsupported".into()),
                };
                let _ = reply.send(response);
            }
        });

        for _ in 0..50 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let payload = [serde_json::to_vec(&Command::Pause).unwrap(), b"\n".to_vec()].concat();
        assert!(matches!(roundtrip(&path, &payload).await, Response::Ok));
        assert!(matches!(
            roundtrip(&path, b"{\"Bogus\":1}\n").await,
            Response::Error(msg) if msg.starts_with("Malformed")
        ));
    }

    #[tokio::test]
    async fn dropped_loop_is_reported() {
        let (tx, rx) = mpsc::unbounded_channel::<Request>();
        drop(rx);
        let response = dispatch(Command::Status, &tx).await;
        assert!(matches!(response, Response::Error(_)));
    }
}
