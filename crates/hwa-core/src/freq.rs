//! Rolling-window powerline frequency measurement.
//!
//! The background monitor feeds zero-crossing edge timestamps into a
//! `FrequencyWindow`. Frequency is the number of edges inside the window
//! divided by the window duration. Edges implying an instantaneous rate
//! outside the configured Hz bounds are treated as electrical noise:
//! too-fast edges are discarded, and a too-slow interval (signal dropout)
//! resets the window so stale edges cannot skew the next measurement.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

/// Rolling window of edge timestamps with outlier rejection.
#[derive(Debug)]
pub struct FrequencyWindow {
    /// Window over which edges are counted.
    window: Duration,

    /// Lower bound of plausible signal frequency.
    min_hz: f64,

    /// Upper bound of plausible signal frequency.
    max_hz: f64,

    /// Accepted edge timestamps, oldest first.
    edges: VecDeque<Instant>,

    /// Edges discarded as noise since startup.
    rejected: u64,
}

impl FrequencyWindow {
    /// Creates a window with the given size and plausible Hz bounds.
    pub fn new(window: Duration, min_hz: f64, max_hz: f64) -> Self {
        Self {
            window,
            min_hz,
            max_hz,
            edges: VecDeque::new(),
            rejected: 0,
        }
    }

    /// Records one edge. Returns `true` if the edge was accepted.
    pub fn record_edge(&mut self, at: Instant) -> bool {
        if let Some(&last) = self.edges.back() {
            let interval = at.saturating_duration_since(last);
            let secs = interval.as_secs_f64();

            if secs <= 0.0 || 1.0 / secs > self.max_hz {
                // Noise spike: an edge arriving faster than the signal can.
                self.rejected = self.rejected.saturating_add(1);
                debug!(
                    interval_us = interval.as_micros() as u64,
                    max_hz = self.max_hz,
                    "Discarding edge above frequency bound"
                );
                return false;
            }

            if 1.0 / secs < self.min_hz {
                // Signal dropout: start a fresh window from this edge so
                // the stale edges do not distort the next measurement.
                debug!(
                    interval_ms = interval.as_millis() as u64,
                    min_hz = self.min_hz,
                    "Edge interval below frequency bound, resetting window"
                );
                self.edges.clear();
            }
        }

        self.edges.push_back(at);
        self.prune(at);
        true
    }

    /// Current frequency, or `None` until the window holds enough edges.
    pub fn frequency(&self) -> Option<f64> {
        if self.edges.len() < 2 {
            return None;
        }
        Some(self.edges.len() as f64 / self.window.as_secs_f64())
    }

    /// Edges discarded as noise since startup.
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Accepted edges currently inside the window.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Drops edges older than the window, relative to `now`.
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.edges.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.edges.pop_front();
            } else {
                break;
            }
        }
    }
}
