//! Daemon configuration: TOML schema, loading, and validation.
//!
//! One daemon instance is entirely described by one TOML file. The same
//! binary serves relay boards, ADCs, or expander inputs depending on the
//! `[[resource]]` tables it is pointed at; nothing about the hardware
//! layout is compiled in.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::resource::{Capability, Direction, PinAddress, Resource, ResourceMap, ResourceName};

/// Default Unix socket path when the config omits `socket_path`.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/hwad.sock";

/// Default idle-session timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Environment variable overriding the socket path from the config file.
pub const ENV_SOCKET: &str = "HWA_SOCKET";

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Unix socket the daemon listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Seconds a locked client may stay silent before its session is
    /// closed and the lock released.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Hardware backend selection.
    #[serde(default)]
    pub hardware: HardwareConfig,

    /// Frequency measurement tuning. Required iff any resource declares
    /// the `frequency` capability.
    pub frequency: Option<FrequencyConfig>,

    /// Managed resources, in declaration order.
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceEntry>,
}

/// `[hardware]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardwareConfig {
    #[serde(default)]
    pub backend: HardwareBackend,
}

/// Which hardware adapter the daemon drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareBackend {
    /// In-process simulator. The only in-tree backend; real chip drivers
    /// plug in through the same adapter trait.
    #[default]
    Sim,
}

/// `[frequency]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrequencyConfig {
    /// Rolling window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Lowest plausible signal frequency.
    #[serde(default = "default_min_hz")]
    pub min_hz: f64,

    /// Highest plausible signal frequency.
    #[serde(default = "default_max_hz")]
    pub max_hz: f64,
}

impl FrequencyConfig {
    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs_f64(self.window_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.min_hz <= 0.0 || self.min_hz >= self.max_hz {
            return Err(ConfigError::InvalidFrequencyBounds {
                min_hz: self.min_hz,
                max_hz: self.max_hz,
            });
        }
        Ok(())
    }
}

/// One `[[resource]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    /// Logical name clients address this resource by.
    pub name: String,

    /// Bus address of the chip, e.g. `0x27`.
    pub chip: u8,

    /// Pin or channel index on the chip.
    pub pin: u8,

    /// Electrical direction.
    pub direction: Direction,

    /// Capability tag.
    pub capability: Capability,
}

impl From<&ResourceEntry> for Resource {
    fn from(entry: &ResourceEntry) -> Self {
        Resource {
            name: ResourceName::new(entry.name.as_str()),
            address: PinAddress::new(entry.chip, entry.pin),
            direction: entry.direction,
            capability: entry.capability,
        }
    }
}

impl DaemonConfig {
    /// Loads and validates a configuration file.
    ///
    /// `HWA_SOCKET`, when set, overrides the configured socket path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Ok(socket) = std::env::var(ENV_SOCKET) {
            debug!(socket, "Socket path overridden from environment");
            config.socket_path = PathBuf::from(socket);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration without touching the filesystem.
    pub fn validate(&self) -> ConfigResult<()> {
        let map = self.resource_map()?;

        let needs_frequency = map
            .iter()
            .find(|r| r.capability == Capability::Frequency)
            .map(|r| r.name.clone());

        match (&self.frequency, needs_frequency) {
            (None, Some(resource)) => {
                return Err(ConfigError::MissingFrequencyConfig { resource });
            }
            (Some(freq), _) => freq.validate()?,
            (None, None) => {}
        }

        Ok(())
    }

    /// Builds the immutable resource map from the declared entries.
    pub fn resource_map(&self) -> ConfigResult<ResourceMap> {
        ResourceMap::from_resources(self.resources.iter().map(Resource::from).collect())
    }

    /// Idle-session timeout as a `Duration`.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}

fn default_window_secs() -> f64 {
    1.0
}

fn default_min_hz() -> f64 {
    40.0
}

fn default_max_hz() -> f64 {
    80.0
}
