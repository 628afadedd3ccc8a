//! HWA HAL - Hardware abstraction for the arbiter daemon
//!
//! The daemon drives all hardware through the [`HardwareAdapter`] trait.
//! Pin writes, pin reads, and analog channel reads are bus transactions
//! and must never overlap; the daemon guarantees this by funneling them
//! through a single executor task, so adapters do not need internal
//! locking. `wait_for_edge` is an interrupt wait, not a bus transaction,
//! and may be in flight concurrently with bus traffic.
//!
//! The only in-tree backend is [`SimAdapter`], an in-process simulator
//! used in tests and on machines without the real chips. Real drivers
//! (I2C expanders, SPI ADCs) implement the same trait out of tree.

pub mod sim;

use async_trait::async_trait;
use thiserror::Error;

use hwa_core::PinAddress;

pub use sim::SimAdapter;

/// Errors surfaced by a hardware backend.
#[derive(Debug, Error)]
pub enum HalError {
    /// The bus transaction itself failed (NAK, timeout, device fault).
    #[error("bus transaction failed at {address}: {reason}")]
    Bus { address: PinAddress, reason: String },

    /// No device is mapped at the given address.
    #[error("no hardware mapped at {address}")]
    Unmapped { address: PinAddress },
}

/// Result alias for adapter operations.
pub type HalResult<T> = Result<T, HalError>;

/// Uniform interface to a hardware backend.
///
/// Implementations may assume that `write_pin`, `read_pin`, and
/// `read_channel` are never called concurrently with each other.
#[async_trait]
pub trait HardwareAdapter: Send + Sync {
    /// Drives an output pin high or low. Bus transaction.
    async fn write_pin(&self, address: PinAddress, value: bool) -> HalResult<()>;

    /// Reads the current level of a digital pin. Bus transaction.
    async fn read_pin(&self, address: PinAddress) -> HalResult<bool>;

    /// Samples an analog channel, returning volts. Bus transaction.
    async fn read_channel(&self, address: PinAddress) -> HalResult<f64>;

    /// Waits for the next edge on an interrupt-capable input and returns
    /// the level after the edge. Not a bus transaction; one waiter per
    /// address at a time.
    async fn wait_for_edge(&self, address: PinAddress) -> HalResult<bool>;
}
