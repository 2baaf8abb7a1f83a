//! Line-delimited JSON-RPC over stdio: one request per line in, one
//! response per line out. The transport is deliberately thin; everything
//! interesting happens in the router.

use crate::router::{Request, Response, Router};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

/// Handle to signal server shutdown
#[derive(Clone)]
pub struct ShutdownHandle {
  tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
  pub fn shutdown(&self) {
    let _ = self.tx.send(());
  }
}

/// stdio JSON-RPC server
pub struct Server {
  router: Arc<Router>,
  shutdown_tx: broadcast::Sender<()>,
}

impl Server {
  pub fn new(router: Arc<Router>) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    Self { router, shutdown_tx }
  }

  pub fn shutdown_handle(&self) -> ShutdownHandle {
    ShutdownHandle {
      tx: self.shutdown_tx.clone(),
    }
  }

  /// Serve requests from stdin, writing responses to stdout
  pub async fn run(&self) -> Result<(), ServerError> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    info!("Daemon serving on stdio");
    self.serve(stdin, stdout).await
  }

  /// Serve requests from any reader/writer pair (tests use buffers)
  pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), ServerError>
  where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
  {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut shutdown_rx = self.shutdown_tx.subscribe();

    loop {
      line.clear();

      let read = tokio::select! {
        read = reader.read_line(&mut line) => read?,
        _ = shutdown_rx.recv() => {
          info!("Shutdown signal received");
          break;
        }
      };

      if read == 0 {
        debug!("Input closed");
        break;
      }

      let trimmed = line.trim();
      if trimmed.is_empty() {
        continue;
      }

      let response = match serde_json::from_str::<Request>(trimmed) {
        Ok(request) => self.router.handle(request).await,
        Err(e) => {
          warn!("Invalid request JSON: {}", e);
          Response::error(None, -32700, &format!("Parse error: {}", e))
        }
      };

      let json = serde_json::to_string(&response)?;
      writer.write_all(json.as_bytes()).await?;
      writer.write_all(b"\n").await?;
      writer.flush().await?;
    }

    Ok(())
  }
}
