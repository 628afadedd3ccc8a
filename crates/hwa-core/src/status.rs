//! Cached status values and the daemon-owned state store.
//!
//! The store is a cache of the last hardware transaction or observed edge
//! per resource, not a live view. It is owned by the executor actor and
//! mutated only from that single task.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::resource::ResourceName;

/// Last-known logical state of one resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusValue {
    /// On/off state of a switchable output, as last written by this daemon.
    Switch(bool),

    /// Last analog reading (volts).
    Analog(f64),

    /// Last computed powerline frequency (Hz).
    Frequency(f64),

    /// Level and timestamp of the last captured edge on a digital input.
    Edge { level: bool, at: DateTime<Utc> },

    /// No successful transaction yet, or the last one failed (degraded).
    Unknown,
}

impl StatusValue {
    /// Wire rendering used in status replies.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch(true) => write!(f, "on"),
            Self::Switch(false) => write!(f, "off"),
            Self::Analog(volts) => write!(f, "{volts:.4}"),
            Self::Frequency(hz) => write!(f, "{hz:.2}"),
            Self::Edge { level, .. } => {
                if *level {
                    write!(f, "high")
                } else {
                    write!(f, "low")
                }
            }
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// In-daemon cache of last-known status per resource.
///
/// Single-writer discipline: only the executor actor calls `set`. The
/// background monitor feeds updates through the executor rather than
/// touching the store directly.
#[derive(Debug, Default)]
pub struct StateStore {
    values: HashMap<ResourceName, StatusValue>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value, or `Unknown` before the first successful
    /// transaction for that resource.
    pub fn get(&self, name: &ResourceName) -> StatusValue {
        self.values
            .get(name)
            .copied()
            .unwrap_or(StatusValue::Unknown)
    }

    /// Records the result of a hardware transaction or observed edge.
    pub fn set(&mut self, name: ResourceName, value: StatusValue) {
        self.values.insert(name, value);
    }

    /// Marks a resource degraded after a failed hardware transaction.
    pub fn mark_unknown(&mut self, name: ResourceName) {
        self.values.insert(name, StatusValue::Unknown);
    }

    /// Number of resources with a recorded status.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
