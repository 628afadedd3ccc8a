//! Command and error types for the executor actor.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

use hwa_core::{Capability, ResourceName, StatusValue};
use hwa_protocol::Action;

/// Commands processed by the executor actor.
#[derive(Debug)]
pub enum ExecutorCommand {
    /// Client-originated action against one resource.
    Execute {
        resource: ResourceName,
        action: Action,
        respond_to: oneshot::Sender<Result<StatusValue, ExecuteError>>,
    },

    /// Edge observed by the background monitor on an edge input.
    RecordEdge {
        resource: ResourceName,
        level: bool,
        at: DateTime<Utc>,
    },

    /// Frequency computed by the background monitor.
    RecordFrequency { resource: ResourceName, hz: f64 },
}

/// Errors produced while executing a client action.
#[derive(Debug, Clone, Error)]
pub enum ExecuteError {
    #[error("no such resource '{name}'")]
    UnknownResource { name: ResourceName },

    #[error("action '{action}' is not valid for '{name}' (capability: {capability})")]
    IncompatibleAction {
        name: ResourceName,
        action: Action,
        capability: Capability,
    },

    #[error("hardware transaction failed for '{name}': {message}")]
    Hardware { name: ResourceName, message: String },

    #[error("executor has shut down")]
    ChannelClosed,
}
