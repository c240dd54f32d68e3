//! Fault monitor
//!
//! Forces the protected outputs to a safe level when a subscribed fault
//! input is triggered. The monitor is a two-state machine:
//!
//! ```text
//!            masked event
//!   Armed ─────────────────▶ Faulted
//!     ▲                         │
//!     └── clear() (latched) ────┤
//!     └── period boundary ──────┘ (cycle-by-cycle)
//! ```
//!
//! Under latched restart only `clear()` leaves `Faulted`. Outputs stay forced
//! until the next carrier period boundary after the monitor re-arms, so
//! normal switching always resumes on a period boundary.
//!
//! The register lives in a `critical_section::Mutex`, so detection and
//! output forcing happen as one step and a monitor can be shared between
//! interrupt and application context (including as a `static`).

use core::cell::Cell;

use bitflags::bitflags;
use critical_section::Mutex;

use crate::{log_info, log_warn};

bitflags! {
    /// Fault inputs of the output stage
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FaultInputs: u8 {
        /// Fault input A
        const A = 1 << 0;
        /// Fault input B
        const B = 1 << 1;
        /// Fault input C
        const C = 1 << 2;
    }
}

/// How the monitor leaves the faulted state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartMode {
    /// Re-arm automatically at the next period boundary
    CycleByCycle,
    /// Stay faulted until `clear()`
    #[default]
    Latched,
}

impl RestartMode {
    /// Convert from a parameter value (0 = cycle-by-cycle, 1 = latched)
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RestartMode::CycleByCycle),
            1 => Some(RestartMode::Latched),
            _ => None,
        }
    }
}

/// Level forced onto protected outputs while faulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SafeLevel {
    #[default]
    DriveLow,
    DriveHigh,
}

impl SafeLevel {
    /// Convert from a parameter value (0 = low, 1 = high)
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SafeLevel::DriveLow),
            1 => Some(SafeLevel::DriveHigh),
            _ => None,
        }
    }

    /// Pin level corresponding to this safe state
    pub const fn is_high(self) -> bool {
        matches!(self, SafeLevel::DriveHigh)
    }
}

/// Fault monitor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultConfig {
    pub restart_mode: RestartMode,
    pub safe_level: SafeLevel,
    /// Fault inputs the monitor reacts to
    pub inputs: FaultInputs,
    /// Raise the fault interrupt on detection
    pub interrupt: bool,
}

impl FaultConfig {
    /// Latched, drive-low protection on input A
    pub const fn latched() -> Self {
        Self {
            restart_mode: RestartMode::Latched,
            safe_level: SafeLevel::DriveLow,
            inputs: FaultInputs::A,
            interrupt: true,
        }
    }

    /// Cycle-by-cycle, drive-low protection on input A
    pub const fn cycle_by_cycle() -> Self {
        Self {
            restart_mode: RestartMode::CycleByCycle,
            ..Self::latched()
        }
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::latched()
    }
}

/// Monitor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultState {
    #[default]
    Armed,
    Faulted,
}

#[derive(Debug, Clone, Copy)]
struct FaultRegister {
    config: FaultConfig,
    state: FaultState,
    /// Outputs are held at the safe level
    forcing: bool,
    detections: u32,
}

/// Fault latch shared between interrupt and application context
pub struct FaultMonitor {
    register: Mutex<Cell<FaultRegister>>,
}

impl FaultMonitor {
    /// Create an armed monitor
    pub const fn new(config: FaultConfig) -> Self {
        Self {
            register: Mutex::new(Cell::new(FaultRegister {
                config,
                state: FaultState::Armed,
                forcing: false,
                detections: 0,
            })),
        }
    }

    fn read(&self) -> FaultRegister {
        critical_section::with(|cs| self.register.borrow(cs).get())
    }

    fn update<R>(&self, f: impl FnOnce(&mut FaultRegister) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.register.borrow(cs);
            let mut reg = cell.get();
            let result = f(&mut reg);
            cell.set(reg);
            result
        })
    }

    /// Replace the configuration and re-arm
    ///
    /// The detection counter is kept.
    pub fn configure(&self, config: FaultConfig) {
        self.update(|reg| {
            reg.config = config;
            reg.state = FaultState::Armed;
            reg.forcing = false;
        });
    }

    /// Current configuration
    pub fn config(&self) -> FaultConfig {
        self.read().config
    }

    /// Current state
    pub fn status(&self) -> FaultState {
        self.read().state
    }

    /// Outputs are currently forced to the safe level
    pub fn is_forcing(&self) -> bool {
        self.read().forcing
    }

    /// Forced pin level, `None` while outputs switch normally
    pub fn forced_level(&self) -> Option<bool> {
        let reg = self.read();
        reg.forcing.then(|| reg.config.safe_level.is_high())
    }

    /// Number of Armed → Faulted transitions seen
    pub fn detections(&self) -> u32 {
        self.read().detections
    }

    /// Deliver fault input activity
    ///
    /// Returns `true` when this call tripped the monitor. Inputs outside the
    /// configured mask and events while already faulted have no effect.
    pub fn notify(&self, inputs: FaultInputs) -> bool {
        let tripped = self.update(|reg| {
            if reg.state == FaultState::Faulted || !reg.config.inputs.intersects(inputs) {
                return None;
            }
            reg.state = FaultState::Faulted;
            reg.forcing = true;
            reg.detections = reg.detections.saturating_add(1);
            Some(reg.detections)
        });

        match tripped {
            Some(count) => {
                log_warn!("Fault detected, outputs forced safe (#{})", count);
                true
            }
            None => false,
        }
    }

    /// Leave the faulted state
    ///
    /// Returns `true` if the monitor was faulted. Clearing an armed monitor
    /// is a no-op. Outputs are released at the next period boundary.
    pub fn clear(&self) -> bool {
        let cleared = self.update(|reg| {
            if reg.state != FaultState::Faulted {
                return false;
            }
            reg.state = FaultState::Armed;
            true
        });
        if cleared {
            log_info!("Fault cleared, outputs resume at next period boundary");
        }
        cleared
    }

    /// Period boundary processing
    ///
    /// Re-arms a cycle-by-cycle monitor and releases forced outputs of an
    /// armed monitor. Returns `true` when outputs were released.
    pub fn on_period_boundary(&self) -> bool {
        self.update(|reg| {
            if reg.state == FaultState::Faulted
                && reg.config.restart_mode == RestartMode::CycleByCycle
            {
                reg.state = FaultState::Armed;
            }
            if reg.state == FaultState::Armed && reg.forcing {
                reg.forcing = false;
                return true;
            }
            false
        })
    }
}

impl Default for FaultMonitor {
    fn default() -> Self {
        Self::new(FaultConfig::default())
    }
}

impl core::fmt::Debug for FaultMonitor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let reg = self.read();
        f.debug_struct("FaultMonitor")
            .field("config", &reg.config)
            .field("state", &reg.state)
            .field("forcing", &reg.forcing)
            .field("detections", &reg.detections)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    static SHARED_MONITOR: FaultMonitor = FaultMonitor::new(FaultConfig::latched());

    #[test]
    fn test_masked_event_trips_and_forces() {
        let monitor = FaultMonitor::default();
        assert_eq!(monitor.status(), FaultState::Armed);
        assert_eq!(monitor.forced_level(), None);

        assert!(monitor.notify(FaultInputs::A));
        assert_eq!(monitor.status(), FaultState::Faulted);
        assert_eq!(monitor.forced_level(), Some(false));
        assert_eq!(monitor.detections(), 1);
    }

    #[test]
    fn test_unmasked_input_ignored() {
        let monitor = FaultMonitor::default();
        assert!(!monitor.notify(FaultInputs::B | FaultInputs::C));
        assert_eq!(monitor.status(), FaultState::Armed);
    }

    #[test]
    fn test_event_while_faulted_is_idempotent() {
        let monitor = FaultMonitor::default();
        assert!(monitor.notify(FaultInputs::A));
        assert!(!monitor.notify(FaultInputs::A));
        assert_eq!(monitor.detections(), 1);
    }

    #[test]
    fn test_clear_when_armed_is_noop() {
        let monitor = FaultMonitor::default();
        assert!(!monitor.clear());
        assert_eq!(monitor.status(), FaultState::Armed);
        assert!(!monitor.is_forcing());
    }

    #[test]
    fn test_latched_survives_boundaries() {
        let monitor = FaultMonitor::default();
        monitor.notify(FaultInputs::A);
        for _ in 0..1000 {
            assert!(!monitor.on_period_boundary());
        }
        assert_eq!(monitor.status(), FaultState::Faulted);
        assert!(monitor.is_forcing());
    }

    #[test]
    fn test_latched_release_waits_for_boundary() {
        let monitor = FaultMonitor::default();
        monitor.notify(FaultInputs::A);

        assert!(monitor.clear());
        assert_eq!(monitor.status(), FaultState::Armed);
        assert!(monitor.is_forcing());

        assert!(monitor.on_period_boundary());
        assert!(!monitor.is_forcing());
        assert!(!monitor.on_period_boundary());
    }

    #[test]
    fn test_cycle_by_cycle_rearms_at_boundary() {
        let monitor = FaultMonitor::new(FaultConfig::cycle_by_cycle());
        monitor.notify(FaultInputs::A);
        assert_eq!(monitor.status(), FaultState::Faulted);

        assert!(monitor.on_period_boundary());
        assert_eq!(monitor.status(), FaultState::Armed);
        assert!(!monitor.is_forcing());
    }

    #[test]
    fn test_drive_high_safe_level() {
        let monitor = FaultMonitor::new(FaultConfig {
            safe_level: SafeLevel::DriveHigh,
            ..FaultConfig::latched()
        });
        monitor.notify(FaultInputs::A);
        assert_eq!(monitor.forced_level(), Some(true));
    }

    #[test]
    fn test_configure_rearms() {
        let monitor = FaultMonitor::default();
        monitor.notify(FaultInputs::A);
        monitor.configure(FaultConfig::cycle_by_cycle());
        assert_eq!(monitor.status(), FaultState::Armed);
        assert!(!monitor.is_forcing());
        assert_eq!(monitor.detections(), 1);
    }

    #[test]
    #[serial]
    fn test_shared_static_monitor_trip() {
        SHARED_MONITOR.configure(FaultConfig::latched());
        assert!(SHARED_MONITOR.notify(FaultInputs::A));
        assert_eq!(SHARED_MONITOR.status(), FaultState::Faulted);
        SHARED_MONITOR.clear();
        SHARED_MONITOR.on_period_boundary();
    }

    #[test]
    #[serial]
    fn test_shared_static_monitor_from_thread() {
        SHARED_MONITOR.configure(FaultConfig::latched());
        let handle = std::thread::spawn(|| SHARED_MONITOR.notify(FaultInputs::A));
        assert!(handle.join().unwrap());
        assert!(SHARED_MONITOR.is_forcing());
        assert!(SHARED_MONITOR.clear());
        assert!(SHARED_MONITOR.on_period_boundary());
    }

    #[test]
    fn test_from_u8() {
        assert_eq!(RestartMode::from_u8(0), Some(RestartMode::CycleByCycle));
        assert_eq!(RestartMode::from_u8(1), Some(RestartMode::Latched));
        assert_eq!(RestartMode::from_u8(9), None);
        assert_eq!(SafeLevel::from_u8(1), Some(SafeLevel::DriveHigh));
    }
}
