//! HWA Core - Shared domain types for the hardware arbiter suite
//!
//! This crate provides the types shared between the daemon (hwad) and
//! the client CLI (hwa): the resource map, the status cache, the
//! frequency measurement window, and the daemon configuration.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod error;
pub mod freq;
pub mod resource;
pub mod status;

// Re-exports for convenience
pub use config::{DaemonConfig, FrequencyConfig, HardwareBackend, ResourceEntry};
pub use error::{ConfigError, ConfigResult};
pub use freq::FrequencyWindow;
pub use resource::{Capability, ChipId, Direction, PinAddress, Resource, ResourceMap, ResourceName};
pub use status::{StateStore, StatusValue};
