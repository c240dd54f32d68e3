//! Simulated peripheral clock.
//!
//! Wraps a shared atomic tick counter together with the clock frequency, so
//! the simulation loop can advance time while stimuli, traces and the
//! benchmark binary read a consistent time reference.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SimulationError;

/// Simulated clock backed by a shared atomic tick counter.
///
/// Clones share the same counter.
#[derive(Debug, Clone)]
pub struct SimClock {
    ticks: Arc<AtomicU64>,
    clock_hz: u32,
}

impl SimClock {
    /// Create a clock at tick zero.
    pub fn new(clock_hz: u32) -> Result<Self, SimulationError> {
        if clock_hz == 0 {
            return Err(SimulationError::ZeroClock);
        }
        Ok(Self {
            ticks: Arc::new(AtomicU64::new(0)),
            clock_hz,
        })
    }

    /// Clock frequency in Hz.
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Current time in clock ticks.
    pub fn now_ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Current time in microseconds (truncated).
    pub fn now_us(&self) -> u64 {
        self.ticks_to_us(self.now_ticks())
    }

    /// Advance the clock by the given number of ticks.
    pub fn advance(&self, ticks: u64) {
        self.ticks.fetch_add(ticks, Ordering::Relaxed);
    }

    /// Rewind to tick zero.
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
    }

    /// Convert microseconds to clock ticks (rounded down).
    pub fn us_to_ticks(&self, us: u64) -> u64 {
        (us as u128 * self.clock_hz as u128 / 1_000_000) as u64
    }

    /// Convert clock ticks to microseconds (rounded down).
    pub fn ticks_to_us(&self, ticks: u64) -> u64 {
        (ticks as u128 * 1_000_000 / self.clock_hz as u128) as u64
    }

    /// Simulated duration of a number of ticks.
    pub fn duration(&self, ticks: u64) -> Duration {
        let nanos = ticks as u128 * 1_000_000_000 / self.clock_hz as u128;
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }
}
