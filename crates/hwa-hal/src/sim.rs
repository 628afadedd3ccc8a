//! In-process hardware simulator.
//!
//! `SimAdapter` stands in for the real chips in tests and on development
//! machines. Beyond simulating pins and channels it instruments the bus:
//! it counts transactions and detects overlapping transactions, which
//! lets tests assert the daemon's serialization guarantees instead of
//! trusting them.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::trace;

use hwa_core::PinAddress;

use crate::{HalError, HalResult, HardwareAdapter};

#[derive(Debug, Default)]
struct SimState {
    /// Output pin levels, as last written.
    outputs: HashMap<PinAddress, bool>,

    /// Preloaded input pin levels.
    inputs: HashMap<PinAddress, bool>,

    /// Preloaded analog channel voltages.
    channels: HashMap<PinAddress, f64>,

    /// Injected edges not yet consumed by a waiter, per address.
    pending_edges: HashMap<PinAddress, VecDeque<bool>>,

    /// Addresses whose next bus transaction fails (one-shot).
    fail_next: HashMap<PinAddress, String>,
}

/// Simulated hardware backend with bus instrumentation.
#[derive(Debug, Default)]
pub struct SimAdapter {
    state: Mutex<SimState>,

    /// Wakes edge waiters after an injection.
    edge_notify: Notify,

    /// Total bus transactions since construction.
    transactions: AtomicU64,

    /// Set while a bus transaction is in flight.
    bus_busy: AtomicBool,

    /// Latched if two bus transactions ever overlapped.
    overlap: AtomicBool,

    /// Artificial per-transaction latency, widening the race window in
    /// concurrency tests. Nanoseconds; zero by default.
    op_delay_nanos: AtomicU64,
}

impl SimAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preloads the level of a digital input pin.
    pub fn set_input(&self, address: PinAddress, level: bool) {
        self.lock_state().inputs.insert(address, level);
    }

    /// Preloads the voltage of an analog channel.
    pub fn set_channel(&self, address: PinAddress, volts: f64) {
        self.lock_state().channels.insert(address, volts);
    }

    /// Injects an edge on an input pin, waking any pending waiter.
    pub fn inject_edge(&self, address: PinAddress, level: bool) {
        {
            let mut state = self.lock_state();
            state.inputs.insert(address, level);
            state.pending_edges.entry(address).or_default().push_back(level);
        }
        self.edge_notify.notify_waiters();
    }

    /// Makes the next bus transaction at `address` fail with `reason`.
    pub fn fail_next(&self, address: PinAddress, reason: impl Into<String>) {
        self.lock_state().fail_next.insert(address, reason.into());
    }

    /// Adds artificial latency to every bus transaction.
    pub fn set_op_delay(&self, delay: Duration) {
        self.op_delay_nanos
            .store(delay.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Bus transactions performed since construction.
    pub fn transaction_count(&self) -> u64 {
        self.transactions.load(Ordering::SeqCst)
    }

    /// True if two bus transactions ever ran concurrently.
    pub fn overlap_detected(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }

    /// Last value written to an output pin, if any.
    pub fn output_level(&self, address: PinAddress) -> Option<bool> {
        self.lock_state().outputs.get(&address).copied()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SimState> {
        // Lock poisoning cannot happen: no code path panics while holding
        // the lock. Recover the guard either way.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Runs one bus transaction with counting and overlap detection.
    async fn transact<T>(
        &self,
        address: PinAddress,
        op: impl FnOnce(&mut SimState) -> HalResult<T>,
    ) -> HalResult<T> {
        if self.bus_busy.swap(true, Ordering::SeqCst) {
            self.overlap.store(true, Ordering::SeqCst);
        }
        self.transactions.fetch_add(1, Ordering::SeqCst);

        let delay = self.op_delay_nanos.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_nanos(delay)).await;
        }

        let result = {
            let mut state = self.lock_state();
            if let Some(reason) = state.fail_next.remove(&address) {
                Err(HalError::Bus { address, reason })
            } else {
                op(&mut state)
            }
        };

        self.bus_busy.store(false, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl HardwareAdapter for SimAdapter {
    async fn write_pin(&self, address: PinAddress, value: bool) -> HalResult<()> {
        trace!(%address, value, "sim write_pin");
        self.transact(address, |state| {
            state.outputs.insert(address, value);
            Ok(())
        })
        .await
    }

    async fn read_pin(&self, address: PinAddress) -> HalResult<bool> {
        trace!(%address, "sim read_pin");
        self.transact(address, |state| {
            Ok(state
                .inputs
                .get(&address)
                .or_else(|| state.outputs.get(&address))
                .copied()
                .unwrap_or(false))
        })
        .await
    }

    async fn read_channel(&self, address: PinAddress) -> HalResult<f64> {
        trace!(%address, "sim read_channel");
        self.transact(address, |state| {
            state
                .channels
                .get(&address)
                .copied()
                .ok_or(HalError::Unmapped { address })
        })
        .await
    }

    async fn wait_for_edge(&self, address: PinAddress) -> HalResult<bool> {
        loop {
            // Arm the notification before checking, so an injection
            // between the check and the await is not lost.
            let notified = self.edge_notify.notified();

            if let Some(level) = self
                .lock_state()
                .pending_edges
                .get_mut(&address)
                .and_then(VecDeque::pop_front)
            {
                trace!(%address, level, "sim edge consumed");
                return Ok(level);
            }

            notified.await;
        }
    }
}
