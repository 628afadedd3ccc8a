//! Background edge monitors.
//!
//! One task per edge-driven resource sits in `wait_for_edge` and feeds
//! observations to the executor. The monitors never touch the bus: an
//! interrupt wait is not a bus transaction, and the resulting cache
//! updates go through the executor like everything else. Edge inputs
//! therefore stay live even while a client holds the arbitration lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hwa_core::{Capability, FrequencyConfig, FrequencyWindow, Resource, ResourceMap};
use hwa_hal::HardwareAdapter;

use crate::executor::ExecutorHandle;

/// Pause after a failed edge wait before retrying.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Spawns one monitor task per edge-driven resource.
///
/// Returns the number of monitors spawned. Resources with the
/// `frequency` capability additionally fold their edges into a rolling
/// frequency window; configuration validation guarantees `freq_config`
/// is present when any such resource exists.
pub fn spawn_edge_monitors(
    map: &ResourceMap,
    adapter: Arc<dyn HardwareAdapter>,
    freq_config: Option<FrequencyConfig>,
    executor: ExecutorHandle,
    cancel_token: CancellationToken,
) -> usize {
    let mut spawned = 0;

    for resource in map.iter() {
        match resource.capability {
            Capability::EdgeInput => {
                tokio::spawn(monitor_edge_input(
                    resource.clone(),
                    Arc::clone(&adapter),
                    executor.clone(),
                    cancel_token.clone(),
                ));
                spawned += 1;
            }
            Capability::Frequency => {
                let Some(cfg) = freq_config else {
                    warn!(resource = %resource.name, "No frequency config, monitor not started");
                    continue;
                };
                tokio::spawn(monitor_frequency(
                    resource.clone(),
                    cfg,
                    Arc::clone(&adapter),
                    executor.clone(),
                    cancel_token.clone(),
                ));
                spawned += 1;
            }
            Capability::Switchable | Capability::AnalogRead => {}
        }
    }

    if spawned > 0 {
        info!(monitors = spawned, "Edge monitors started");
    }
    spawned
}

/// Monitors a plain edge input, caching level and timestamp per edge.
async fn monitor_edge_input(
    resource: Resource,
    adapter: Arc<dyn HardwareAdapter>,
    executor: ExecutorHandle,
    cancel_token: CancellationToken,
) {
    debug!(resource = %resource.name, "Edge monitor starting");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(resource = %resource.name, "Edge monitor shutting down");
                return;
            }

            result = adapter.wait_for_edge(resource.address) => {
                match result {
                    Ok(level) => {
                        executor
                            .record_edge(resource.name.clone(), level, Utc::now())
                            .await;
                    }
                    Err(e) => {
                        warn!(
                            resource = %resource.name,
                            error = %e,
                            "Edge wait failed, backing off"
                        );
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                }
            }
        }
    }
}

/// Monitors a frequency-sense input, publishing the rolling measurement.
async fn monitor_frequency(
    resource: Resource,
    cfg: FrequencyConfig,
    adapter: Arc<dyn HardwareAdapter>,
    executor: ExecutorHandle,
    cancel_token: CancellationToken,
) {
    debug!(
        resource = %resource.name,
        window_secs = cfg.window_secs,
        "Frequency monitor starting"
    );

    let mut window = FrequencyWindow::new(cfg.window(), cfg.min_hz, cfg.max_hz);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(resource = %resource.name, "Frequency monitor shutting down");
                return;
            }

            result = adapter.wait_for_edge(resource.address) => {
                match result {
                    Ok(_level) => {
                        if window.record_edge(Instant::now()) {
                            if let Some(hz) = window.frequency() {
                                executor
                                    .record_frequency(resource.name.clone(), hz)
                                    .await;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            resource = %resource.name,
                            error = %e,
                            "Edge wait failed, backing off"
                        );
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                }
            }
        }
    }
}
