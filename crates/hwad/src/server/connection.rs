//! Connection handler for the single locked client.
//!
//! Each accepted client gets a `ConnectionHandler` that:
//! - Holds the arbitration lock for the life of the connection
//! - Parses newline-delimited JSON requests
//! - Routes actions to the executor
//! - Writes one reply line per request
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use hwa_core::{Capability, ResourceMap};
use hwa_protocol::{Action, ErrorCode, ProtocolVersion, Reply, Request, StatusEntry, Target};

use crate::executor::{ExecuteError, ExecutorHandle};

/// Maximum request line size (64 KB)
const MAX_REQUEST_SIZE: usize = 65_536;

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection handler for the client currently holding the lock.
///
/// The semaphore permit is held for the life of this handler; dropping
/// it (on disconnect, error, or idle timeout) releases the lock to the
/// next client.
pub struct ConnectionHandler {
    /// Buffered reader for incoming requests
    reader: BufReader<OwnedReadHalf>,

    /// Buffered writer for replies
    writer: BufWriter<OwnedWriteHalf>,

    /// Handle to the hardware executor
    executor: ExecutorHandle,

    /// Static resource map, for `all` expansion and validation
    map: Arc<ResourceMap>,

    /// Idle-session timeout from the daemon configuration
    idle_timeout: Duration,

    /// Unique number for this connection (for logging)
    connection_number: u64,

    /// The arbitration lock. Released when the handler is dropped.
    _permit: OwnedSemaphorePermit,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        executor: ExecutorHandle,
        map: Arc<ResourceMap>,
        idle_timeout: Duration,
        connection_number: u64,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            executor,
            map,
            idle_timeout,
            connection_number,
            _permit: permit,
        }
    }

    /// Runs the connection handler.
    ///
    /// Reads and serves requests until the client disconnects, the idle
    /// timeout fires, or an I/O error occurs. Returns when the
    /// connection closes; the lock is released on return.
    pub async fn run(mut self) {
        info!(connection = self.connection_number, "Client acquired lock");

        if let Err(e) = self.serve_requests().await {
            match e {
                ConnectionError::Eof => {
                    debug!(connection = self.connection_number, "Client disconnected");
                }
                ConnectionError::IdleTimeout => {
                    info!(
                        connection = self.connection_number,
                        timeout_secs = self.idle_timeout.as_secs(),
                        "Idle session timed out, releasing lock"
                    );
                }
                other => {
                    warn!(
                        connection = self.connection_number,
                        error = %other,
                        "Connection closed with error"
                    );
                }
            }
        }

        info!(connection = self.connection_number, "Lock released");
    }

    /// Main request loop.
    async fn serve_requests(&mut self) -> Result<(), ConnectionError> {
        loop {
            let line = match timeout(self.idle_timeout, self.read_line()).await {
                Ok(result) => result?,
                Err(_) => return Err(ConnectionError::IdleTimeout),
            };

            let reply = match serde_json::from_str::<Request>(&line) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    debug!(
                        connection = self.connection_number,
                        error = %e,
                        "Malformed request"
                    );
                    Reply::error(format!("malformed request: {e}"), ErrorCode::Malformed)
                }
            };

            self.send_reply(&reply).await?;
        }
    }

    /// Reads one request line.
    async fn read_line(&mut self) -> Result<String, ConnectionError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(ConnectionError::Eof);
        }
        if line.len() > MAX_REQUEST_SIZE {
            return Err(ConnectionError::RequestTooLarge { size: line.len() });
        }
        Ok(line)
    }

    /// Serializes and writes one reply line.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let json = serde_json::to_string(reply).map_err(ConnectionError::Serialize)?;

        timeout(WRITE_TIMEOUT, async {
            self.writer.write_all(json.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        .map_err(|_| ConnectionError::WriteTimeout)??;

        Ok(())
    }

    /// Dispatches one parsed request.
    async fn handle_request(&self, request: Request) -> Reply {
        if !request
            .protocol_version
            .is_compatible_with(&ProtocolVersion::CURRENT)
        {
            return Reply::error(
                format!(
                    "protocol version {} not compatible with {}",
                    request.protocol_version,
                    ProtocolVersion::CURRENT
                ),
                ErrorCode::Version,
            );
        }

        debug!(
            connection = self.connection_number,
            resource = %request.resource,
            action = %request.action,
            "Request"
        );

        match (request.resource, request.action) {
            (Target::Named(name), action) => {
                match self.executor.execute(name.clone(), action).await {
                    Ok(value) => Reply::single(name.as_str(), value.render()),
                    Err(e) => error_reply(e),
                }
            }

            // Switching everything on at once is never allowed: inrush
            // on a fully loaded relay board can brown out the supply.
            (Target::All, Action::On) => Reply::error(
                "'all' cannot be switched on; address resources individually",
                ErrorCode::IncompatibleAction,
            ),

            (Target::All, Action::Off) => self.all_off().await,
            (Target::All, Action::Status) => self.all_status().await,
        }
    }

    /// Switches every switchable off, in declaration order.
    ///
    /// A hardware failure on one resource yields an "error" entry for it
    /// and does not stop the sweep; an emergency off must reach as many
    /// outputs as it can.
    async fn all_off(&self) -> Reply {
        let mut entries = Vec::new();
        for resource in self
            .map
            .iter()
            .filter(|r| r.capability == Capability::Switchable)
        {
            let value = match self
                .executor
                .execute(resource.name.clone(), Action::Off)
                .await
            {
                Ok(value) => value.render(),
                Err(e) => {
                    warn!(resource = %resource.name, error = %e, "all-off entry failed");
                    "error".to_string()
                }
            };
            entries.push(StatusEntry::new(resource.name.as_str(), value));
        }
        Reply::status(entries)
    }

    /// Reports the status of every resource, in declaration order.
    async fn all_status(&self) -> Reply {
        let mut entries = Vec::new();
        for resource in self.map.iter() {
            let value = match self
                .executor
                .execute(resource.name.clone(), Action::Status)
                .await
            {
                Ok(value) => value.render(),
                Err(e) => {
                    warn!(resource = %resource.name, error = %e, "all-status entry failed");
                    "error".to_string()
                }
            };
            entries.push(StatusEntry::new(resource.name.as_str(), value));
        }
        Reply::status(entries)
    }
}

/// Maps an executor error to the wire error reply.
fn error_reply(e: ExecuteError) -> Reply {
    let code = match &e {
        ExecuteError::UnknownResource { .. } => ErrorCode::UnknownResource,
        ExecuteError::IncompatibleAction { .. } => ErrorCode::IncompatibleAction,
        ExecuteError::Hardware { .. } => ErrorCode::Hardware,
        ExecuteError::ChannelClosed => ErrorCode::Hardware,
    };
    Reply::error(e.to_string(), code)
}

/// Errors that can occur on a client connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Client closed the connection")]
    Eof,

    #[error("Idle session timed out")]
    IdleTimeout,

    #[error("Request too large ({size} bytes)")]
    RequestTooLarge { size: usize },

    #[error("Write timed out")]
    WriteTimeout,

    #[error("Failed to serialize reply: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
