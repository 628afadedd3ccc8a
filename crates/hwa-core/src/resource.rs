//! Resource identity and the static resource map.
//!
//! A `Resource` binds a logical name (e.g. `valve1`) to a physical pin or
//! channel on a specific chip, together with its direction and capability
//! tag. The `ResourceMap` is built once at daemon startup and is immutable
//! afterwards; every request is validated against it before any hardware
//! is touched.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// Identity types
// ============================================================================

/// Logical name of a managed hardware resource, unique per daemon instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    /// Creates a new resource name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Bus address of a hardware chip (e.g. `0x27` for an I2C expander).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChipId(pub u8);

impl fmt::Display for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// Physical address of a pin or analog channel: chip plus index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinAddress {
    /// The chip the pin lives on.
    pub chip: ChipId,

    /// Pin number (digital) or channel number (analog) on that chip.
    pub pin: u8,
}

impl PinAddress {
    pub const fn new(chip: u8, pin: u8) -> Self {
        Self {
            chip: ChipId(chip),
            pin,
        }
    }
}

impl fmt::Display for PinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chip, self.pin)
    }
}

// ============================================================================
// Direction and capability
// ============================================================================

/// Electrical direction of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Output pin (relays, valves, pumps).
    Output,

    /// Digital input pin.
    Input,

    /// Analog input channel.
    Analog,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output => write!(f, "output"),
            Self::Input => write!(f, "input"),
            Self::Analog => write!(f, "analog"),
        }
    }
}

/// What a resource can do, driving request validation and status semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Output pin that can be switched on and off (relay, valve, pump).
    Switchable,

    /// Analog channel read on demand (ADC voltage).
    AnalogRead,

    /// Interrupt-capable digital input; level captured on each edge.
    EdgeInput,

    /// Interrupt-capable input whose edge rate is folded into a
    /// frequency measurement (AC powerline sense).
    Frequency,
}

impl Capability {
    /// The direction a resource with this capability must declare.
    pub fn required_direction(&self) -> Direction {
        match self {
            Self::Switchable => Direction::Output,
            Self::AnalogRead => Direction::Analog,
            Self::EdgeInput | Self::Frequency => Direction::Input,
        }
    }

    /// True for capabilities serviced by the background edge monitor.
    pub fn is_edge_driven(&self) -> bool {
        matches!(self, Self::EdgeInput | Self::Frequency)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switchable => write!(f, "switchable"),
            Self::AnalogRead => write!(f, "analog_read"),
            Self::EdgeInput => write!(f, "edge_input"),
            Self::Frequency => write!(f, "frequency"),
        }
    }
}

// ============================================================================
// Resource and ResourceMap
// ============================================================================

/// A logical hardware endpoint managed by one daemon instance.
///
/// Immutable after daemon startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Logical name, unique within the daemon instance.
    pub name: ResourceName,

    /// Physical chip + pin/channel address, unique within the instance.
    pub address: PinAddress,

    /// Electrical direction.
    pub direction: Direction,

    /// Capability tag.
    pub capability: Capability,
}

impl Resource {
    /// Validates that the capability tag is consistent with the direction.
    pub fn check_consistent(&self) -> Result<(), ConfigError> {
        let required = self.capability.required_direction();
        if self.direction != required {
            return Err(ConfigError::CapabilityMismatch {
                resource: self.name.clone(),
                capability: self.capability,
                direction: self.direction,
                required,
            });
        }
        Ok(())
    }
}

/// Static map of all resources managed by one daemon instance.
///
/// Preserves declaration order so that `all` responses are deterministic.
#[derive(Debug, Clone)]
pub struct ResourceMap {
    /// Resources in declaration order.
    resources: Vec<Resource>,

    /// Index for name lookups.
    by_name: HashMap<ResourceName, usize>,
}

impl ResourceMap {
    /// Builds a resource map, failing fast on configuration errors.
    ///
    /// Rejects duplicate names, duplicate physical addresses, and
    /// capability/direction mismatches. An empty map is also rejected:
    /// a daemon with nothing to arbitrate is a misconfiguration.
    pub fn from_resources(resources: Vec<Resource>) -> Result<Self, ConfigError> {
        if resources.is_empty() {
            return Err(ConfigError::NoResources);
        }

        let mut by_name = HashMap::with_capacity(resources.len());
        let mut by_address: HashMap<PinAddress, ResourceName> =
            HashMap::with_capacity(resources.len());

        for (idx, resource) in resources.iter().enumerate() {
            resource.check_consistent()?;

            if by_name.insert(resource.name.clone(), idx).is_some() {
                return Err(ConfigError::DuplicateName {
                    name: resource.name.clone(),
                });
            }

            if let Some(other) = by_address.insert(resource.address, resource.name.clone()) {
                return Err(ConfigError::DuplicateAddress {
                    address: resource.address,
                    first: other,
                    second: resource.name.clone(),
                });
            }
        }

        Ok(Self { resources, by_name })
    }

    /// Looks up a resource by name.
    pub fn lookup(&self, name: &ResourceName) -> Option<&Resource> {
        self.by_name
            .get(name)
            .and_then(|idx| self.resources.get(*idx))
    }

    /// Iterates resources in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Number of managed resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// True if any resource needs the background edge monitor.
    pub fn has_edge_resources(&self) -> bool {
        self.resources.iter().any(|r| r.capability.is_edge_driven())
    }
}
