//! Client interface for interacting with the ExecutorActor.
//!
//! The `ExecutorHandle` provides a cheap-to-clone interface for sending
//! commands to the executor actor.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `ExecuteError::ChannelClosed`

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use hwa_core::{ResourceName, StatusValue};
use hwa_protocol::Action;

use super::commands::{ExecuteError, ExecutorCommand};

/// Handle for interacting with the executor actor.
///
/// Cheap to clone; shared by connection handlers and monitor tasks.
#[derive(Clone)]
pub struct ExecutorHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<ExecutorCommand>,
}

impl ExecutorHandle {
    /// Create a new executor handle.
    pub fn new(sender: mpsc::Sender<ExecutorCommand>) -> Self {
        Self { sender }
    }

    /// Executes one action against one resource.
    ///
    /// # Errors
    ///
    /// - `ExecuteError::UnknownResource` if the resource is not managed
    /// - `ExecuteError::IncompatibleAction` if the action does not fit
    /// - `ExecuteError::Hardware` if the bus transaction failed
    /// - `ExecuteError::ChannelClosed` if the actor has shut down
    pub async fn execute(
        &self,
        resource: ResourceName,
        action: Action,
    ) -> Result<StatusValue, ExecuteError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(ExecutorCommand::Execute {
                resource,
                action,
                respond_to: tx,
            })
            .await
            .map_err(|_| ExecuteError::ChannelClosed)?;

        rx.await.map_err(|_| ExecuteError::ChannelClosed)?
    }

    /// Records an observed edge. Fire-and-forget.
    pub async fn record_edge(&self, resource: ResourceName, level: bool, at: DateTime<Utc>) {
        // Ignore send errors - the actor may be shutting down
        let _ = self
            .sender
            .send(ExecutorCommand::RecordEdge {
                resource,
                level,
                at,
            })
            .await;
    }

    /// Records a computed frequency. Fire-and-forget.
    pub async fn record_frequency(&self, resource: ResourceName, hz: f64) {
        let _ = self
            .sender
            .send(ExecutorCommand::RecordFrequency { resource, hz })
            .await;
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
