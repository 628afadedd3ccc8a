//! Hardware executor using the actor pattern.
//!
//! The executor is the single serialization point for the bus. Every
//! hardware transaction in the daemon flows through one actor task, so
//! mutual exclusion between clients and the background monitor is a
//! structural property, not a lock discipline.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  ExecutorActor  │────▶│ HardwareAdapter │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!         ▲                       ▲
//!         │   ExecutorCommand     │   RecordEdge / RecordFrequency
//!         │   (mpsc channel)      │
//!         │               ┌───────┴───────┐
//!         │               │ Edge monitors │
//!         │               └───────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

use hwa_core::ResourceMap;
use hwa_hal::HardwareAdapter;

mod actor;
mod commands;
mod handle;

pub use actor::ExecutorActor;
pub use commands::{ExecuteError, ExecutorCommand};
pub use handle::ExecutorHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawn the executor actor and return a handle for interaction.
pub fn spawn_executor(
    map: Arc<ResourceMap>,
    adapter: Arc<dyn HardwareAdapter>,
) -> ExecutorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = ExecutorActor::new(cmd_rx, map, adapter);
    tokio::spawn(actor.run());

    ExecutorHandle::new(cmd_tx)
}
