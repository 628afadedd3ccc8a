//! Daemon client over the Unix socket.
//!
//! One request, one reply, newline-delimited JSON in both directions.
//! The client holds the daemon's arbitration lock for as long as the
//! connection stays open, so one-shot callers should drop the client
//! promptly after the reply.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

use hwa_protocol::{Action, Reply, Request, Target};

/// Timeout for a single request/reply exchange.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client connection to the hwad daemon.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    /// Connects to the daemon at the given socket path.
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|source| ClientError::Connect {
                path: socket_path.to_path_buf(),
                source,
            })?;

        debug!(socket = %socket_path.display(), "Connected to daemon");

        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Sends one request and reads the reply.
    pub async fn request(&mut self, target: Target, action: Action) -> Result<Reply, ClientError> {
        let request = Request::new(target, action);
        let json = serde_json::to_string(&request).map_err(ClientError::Encode)?;

        timeout(REQUEST_TIMEOUT, async {
            self.writer.write_all(json.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        .map_err(|_| ClientError::Timeout)??;

        self.read_reply().await
    }

    /// Reads one reply line from the daemon.
    ///
    /// The daemon may also send an unsolicited `busy` line right after
    /// connect, before any request; callers can use this to read it.
    pub async fn read_reply(&mut self) -> Result<Reply, ClientError> {
        let mut line = String::new();
        let n = timeout(REQUEST_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .map_err(|_| ClientError::Timeout)??;

        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }

        serde_json::from_str(&line).map_err(|source| ClientError::Decode {
            line: line.trim_end().to_string(),
            source,
        })
    }
}

/// Errors that can occur talking to the daemon.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to daemon at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("daemon closed the connection")]
    ConnectionClosed,

    #[error("request timed out")]
    Timeout,

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("unparseable reply from daemon: {line}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
