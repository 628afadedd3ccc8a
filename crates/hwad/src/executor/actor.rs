//! Executor actor - the single hardware serialization point.
//!
//! The ExecutorActor is the only task that touches the bus. It owns the
//! hardware adapter and the status cache, receives commands via an mpsc
//! channel, and processes them strictly one at a time. Two transactions
//! can therefore never overlap, by construction rather than by locking.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use hwa_core::{Capability, ResourceMap, ResourceName, StateStore, StatusValue};
use hwa_hal::HardwareAdapter;
use hwa_protocol::Action;

use super::commands::{ExecuteError, ExecutorCommand};

/// The executor actor - owns the adapter and the status cache.
///
/// Runs in a single task and processes commands sequentially. All bus
/// transactions and all cache mutations happen inside this task.
pub struct ExecutorActor {
    /// Command receiver
    receiver: mpsc::Receiver<ExecutorCommand>,

    /// Static resource map, validated at startup
    map: Arc<ResourceMap>,

    /// The hardware backend
    adapter: Arc<dyn HardwareAdapter>,

    /// Last-known status per resource
    store: StateStore,
}

impl ExecutorActor {
    /// Creates a new executor actor.
    pub fn new(
        receiver: mpsc::Receiver<ExecutorCommand>,
        map: Arc<ResourceMap>,
        adapter: Arc<dyn HardwareAdapter>,
    ) -> Self {
        Self {
            receiver,
            map,
            adapter,
            store: StateStore::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!(resources = self.map.len(), "Executor actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Executor actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    async fn handle_command(&mut self, cmd: ExecutorCommand) {
        match cmd {
            ExecutorCommand::Execute {
                resource,
                action,
                respond_to,
            } => {
                let result = self.handle_execute(resource, action).await;
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            ExecutorCommand::RecordEdge {
                resource,
                level,
                at,
            } => {
                self.handle_record_edge(resource, level, at);
            }
            ExecutorCommand::RecordFrequency { resource, hz } => {
                self.handle_record_frequency(resource, hz);
            }
        }
    }

    /// Executes one client action against one resource.
    ///
    /// Validation happens before any hardware is touched: an unknown
    /// resource or incompatible action costs zero bus transactions.
    async fn handle_execute(
        &mut self,
        name: ResourceName,
        action: Action,
    ) -> Result<StatusValue, ExecuteError> {
        let resource = match self.map.lookup(&name) {
            Some(r) => r.clone(),
            None => {
                debug!(resource = %name, "Request for unknown resource");
                return Err(ExecuteError::UnknownResource { name });
            }
        };

        match (action, resource.capability) {
            (Action::On | Action::Off, Capability::Switchable) => {
                let on = action == Action::On;
                match self.adapter.write_pin(resource.address, on).await {
                    Ok(()) => {
                        let value = StatusValue::Switch(on);
                        self.store.set(name.clone(), value);
                        debug!(resource = %name, %action, "Switch written");
                        Ok(value)
                    }
                    Err(e) => {
                        warn!(resource = %name, error = %e, "Pin write failed");
                        self.store.mark_unknown(name.clone());
                        Err(ExecuteError::Hardware {
                            name,
                            message: e.to_string(),
                        })
                    }
                }
            }

            // Analog channels are sampled fresh on every status request;
            // a cached voltage would be stale the moment it was stored.
            (Action::Status, Capability::AnalogRead) => {
                match self.adapter.read_channel(resource.address).await {
                    Ok(volts) => {
                        let value = StatusValue::Analog(volts);
                        self.store.set(name, value);
                        Ok(value)
                    }
                    Err(e) => {
                        warn!(resource = %name, error = %e, "Channel read failed");
                        self.store.mark_unknown(name.clone());
                        Err(ExecuteError::Hardware {
                            name,
                            message: e.to_string(),
                        })
                    }
                }
            }

            // Switch and edge-driven status comes from the cache: the
            // daemon is the only writer, so the cache is authoritative
            // and the bus stays idle.
            (Action::Status, _) => Ok(self.store.get(&name)),

            (Action::On | Action::Off, capability) => {
                debug!(resource = %name, %action, %capability, "Incompatible action");
                Err(ExecuteError::IncompatibleAction {
                    name,
                    action,
                    capability,
                })
            }
        }
    }

    /// Records an edge observed by the background monitor.
    fn handle_record_edge(&mut self, name: ResourceName, level: bool, at: DateTime<Utc>) {
        if self.map.lookup(&name).is_none() {
            warn!(resource = %name, "Edge for unknown resource, dropping");
            return;
        }
        self.store.set(name, StatusValue::Edge { level, at });
    }

    /// Records a frequency computed by the background monitor.
    fn handle_record_frequency(&mut self, name: ResourceName, hz: f64) {
        if self.map.lookup(&name).is_none() {
            warn!(resource = %name, "Frequency for unknown resource, dropping");
            return;
        }
        self.store.set(name, StatusValue::Frequency(hz));
    }
}
