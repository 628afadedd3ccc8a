//! Unix socket server for the HWA daemon.
//!
//! The server:
//! - Listens on a Unix socket for client connections
//! - Grants the arbitration lock to exactly one client at a time
//! - Rejects further clients with a `busy` reply and closes them
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   DaemonServer  │
//! │                 │
//! │  UnixListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//!    Semaphore(1) ──── busy? ──▶ Reply::Busy, close
//!         │
//!         ▼ permit
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  ExecutorHandle │
//! │ (locked client) │     │                 │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hwa_core::ResourceMap;
use hwa_protocol::Reply;

use crate::executor::ExecutorHandle;

/// Socket file mode: any local user may connect. Arbitration, not
/// authentication, is the daemon's job.
const SOCKET_MODE: u32 = 0o666;

/// Unix socket server for the HWA daemon.
///
/// Owns the listener and the single-client arbitration lock.
pub struct DaemonServer {
    /// Path to the Unix socket
    socket_path: PathBuf,

    /// Handle to the hardware executor
    executor: ExecutorHandle,

    /// Static resource map
    map: Arc<ResourceMap>,

    /// Idle-session timeout for locked clients
    idle_timeout: Duration,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for logging
    connection_counter: AtomicU64,

    /// The arbitration lock: one permit, one client
    client_lock: Arc<Semaphore>,
}

impl DaemonServer {
    /// Creates a new daemon server.
    pub fn new(
        socket_path: impl Into<PathBuf>,
        executor: ExecutorHandle,
        map: Arc<ResourceMap>,
        idle_timeout: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            executor,
            map,
            idle_timeout,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            client_lock: Arc::new(Semaphore::new(1)),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs the server.
    ///
    /// Listens for connections until the cancellation token is triggered.
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        // Remove existing socket file if present
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| ServerError::SocketSetup {
                path: self.socket_path.clone(),
                error: e.to_string(),
            })?;
        }

        // Create parent directory if needed
        if let Some(parent) = self.socket_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ServerError::SocketSetup {
                    path: self.socket_path.clone(),
                    error: e.to_string(),
                })?;
            }
        }

        // Bind to the Unix socket
        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| ServerError::SocketSetup {
                path: self.socket_path.clone(),
                error: e.to_string(),
            })?;

        // Open the socket to all local users
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))
            .map_err(|e| ServerError::SocketSetup {
                path: self.socket_path.clone(),
                error: e.to_string(),
            })?;

        info!(
            socket = %self.socket_path.display(),
            resources = self.map.len(),
            "Daemon server listening"
        );

        // Accept connections until cancelled
        loop {
            tokio::select! {
                // Check for cancellation
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                // Accept new connection
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        // Cleanup
        self.cleanup();
        Ok(())
    }

    /// Handles a new client: grant the lock or turn it away busy.
    ///
    /// The lock is never queued. A client that arrives while another
    /// holds it gets an immediate `busy` reply and a closed connection,
    /// so it can back off on its own terms instead of blocking.
    fn handle_connection(&self, stream: UnixStream, connection_number: u64) {
        match Arc::clone(&self.client_lock).try_acquire_owned() {
            Ok(permit) => {
                let (reader, writer) = stream.into_split();
                let handler = ConnectionHandler::new(
                    reader,
                    writer,
                    self.executor.clone(),
                    Arc::clone(&self.map),
                    self.idle_timeout,
                    connection_number,
                    permit,
                );
                tokio::spawn(handler.run());
            }
            Err(_) => {
                debug!(connection = connection_number, "Lock held, turning client away");
                tokio::spawn(reject_busy(stream, connection_number));
            }
        }
    }

    /// Performs cleanup on shutdown.
    fn cleanup(&self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }

        info!("Server cleanup complete");
    }
}

/// Sends a `busy` reply and closes the connection.
async fn reject_busy(mut stream: UnixStream, connection_number: u64) {
    let reply = Reply::busy("another client holds the hardware lock");
    let json = match serde_json::to_string(&reply) {
        Ok(j) => j,
        Err(e) => {
            error!(error = %e, "Failed to serialize busy reply");
            return;
        }
    };

    let send = async {
        stream.write_all(json.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok::<(), std::io::Error>(())
    };

    if let Err(e) = send.await {
        debug!(
            connection = connection_number,
            error = %e,
            "Failed to send busy reply"
        );
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to setup socket at {path}: {error}")]
    SocketSetup { path: PathBuf, error: String },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}
