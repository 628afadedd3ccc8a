//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::resource::{Capability, Direction, PinAddress, ResourceName};

/// Errors raised while loading or validating the daemon configuration.
///
/// All of these are fatal at startup: the daemon refuses to run with a
/// configuration it cannot fully validate.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("duplicate resource name '{name}'")]
    DuplicateName { name: ResourceName },

    #[error("resources '{first}' and '{second}' both claim pin {address}")]
    DuplicateAddress {
        address: PinAddress,
        first: ResourceName,
        second: ResourceName,
    },

    #[error(
        "resource '{resource}' declares capability '{capability}' with \
         direction '{direction}', but '{capability}' requires '{required}'"
    )]
    CapabilityMismatch {
        resource: ResourceName,
        capability: Capability,
        direction: Direction,
        required: Direction,
    },

    #[error(
        "resource '{resource}' has capability 'frequency' but no [frequency] \
         section is configured"
    )]
    MissingFrequencyConfig { resource: ResourceName },

    #[error("configuration declares no resources")]
    NoResources,

    #[error("invalid frequency bounds: min_hz {min_hz} must be below max_hz {max_hz}")]
    InvalidFrequencyBounds { min_hz: f64, max_hz: f64 },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
