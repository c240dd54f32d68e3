//! Carrier counter
//!
//! The carrier is the timing reference of the whole subsystem: a periodic
//! counter running at `clock / divisor` that reloads every carrier period.
//!
//! | Waveform     | Direction | Count sequence          | Ticks per period |
//! |--------------|-----------|-------------------------|------------------|
//! | Single slope | Down      | `TOP, TOP-1, .., 0`     | `TOP + 1`        |
//! | Single slope | Up        | `0, 1, .., TOP`         | `TOP + 1`        |
//! | Dual slope   | (ignored) | `0, 1, .., TOP, .., 1`  | `2 * TOP`        |
//!
//! The step that reloads the counter (back to the start value of the
//! sequence) is the period boundary. Double-buffered compare values are
//! promoted on that step.

use crate::error::ConfigError;

/// Counting direction for single-slope operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CountDirection {
    /// Count from 0 up to TOP
    Up,
    /// Count from TOP down to 0
    #[default]
    Down,
}

/// Waveform generation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaveformMode {
    /// Saw-tooth carrier, one reload per period
    #[default]
    SingleSlope,
    /// Triangle carrier, period boundary at the bottom
    DualSlope,
}

/// Counter clock prescaler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockDivisor {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div256,
    Div1024,
}

impl ClockDivisor {
    /// Number of clock ticks per counter step
    pub const fn ratio(self) -> u16 {
        match self {
            ClockDivisor::Div1 => 1,
            ClockDivisor::Div2 => 2,
            ClockDivisor::Div4 => 4,
            ClockDivisor::Div8 => 8,
            ClockDivisor::Div16 => 16,
            ClockDivisor::Div64 => 64,
            ClockDivisor::Div256 => 256,
            ClockDivisor::Div1024 => 1024,
        }
    }

    /// Convert from a raw ratio; `None` for unsupported ratios
    pub fn from_ratio(ratio: u16) -> Option<Self> {
        match ratio {
            1 => Some(ClockDivisor::Div1),
            2 => Some(ClockDivisor::Div2),
            4 => Some(ClockDivisor::Div4),
            8 => Some(ClockDivisor::Div8),
            16 => Some(ClockDivisor::Div16),
            64 => Some(ClockDivisor::Div64),
            256 => Some(ClockDivisor::Div256),
            1024 => Some(ClockDivisor::Div1024),
            _ => None,
        }
    }
}

/// Carrier configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CarrierConfig {
    /// Period register (TOP value) in counter ticks
    pub period: u16,
    /// Counting direction (single slope only)
    pub direction: CountDirection,
    /// Counter clock prescaler
    pub divisor: ClockDivisor,
    /// Waveform generation mode
    pub waveform: WaveformMode,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            period: 999, // 50us at 20 MHz, single slope
            direction: CountDirection::Down,
            divisor: ClockDivisor::Div1,
            waveform: WaveformMode::SingleSlope,
        }
    }
}

impl CarrierConfig {
    /// Reject parameters the counter cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }

    /// Counter steps in one carrier period
    pub const fn steps_per_period(&self) -> u32 {
        match self.waveform {
            WaveformMode::SingleSlope => self.period as u32 + 1,
            WaveformMode::DualSlope => self.period as u32 * 2,
        }
    }

    /// Clock ticks in one carrier period
    pub const fn ticks_per_period(&self) -> u32 {
        self.steps_per_period() * self.divisor.ratio() as u32
    }
}

/// One advance of the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CounterStep {
    /// Counter value after the step
    pub count: u16,
    /// The step reloaded the counter and started a new carrier period
    pub boundary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slope {
    Rising,
    Falling,
}

/// Free-running periodic counter
#[derive(Debug, Clone)]
pub struct CarrierCounter {
    config: Option<CarrierConfig>,
    count: u16,
    slope: Slope,
    prescale: u16,
    running: bool,
    periods: u64,
}

impl CarrierCounter {
    /// Create an unconfigured, stopped counter
    pub const fn new() -> Self {
        Self {
            config: None,
            count: 0,
            slope: Slope::Falling,
            prescale: 0,
            running: false,
            periods: 0,
        }
    }

    /// Apply a new configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ZeroPeriod` for a zero period and
    /// `ConfigError::CounterRunning` if the counter has been started.
    pub fn configure(&mut self, config: CarrierConfig) -> Result<(), ConfigError> {
        if self.running {
            return Err(ConfigError::CounterRunning);
        }
        config.validate()?;
        self.config = Some(config);
        self.reload();
        Ok(())
    }

    /// Current configuration, if any
    pub fn config(&self) -> Option<&CarrierConfig> {
        self.config.as_ref()
    }

    /// Start counting from the beginning of a period
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::CarrierNotConfigured` before `configure`.
    pub fn start(&mut self) -> Result<(), ConfigError> {
        if self.config.is_none() {
            return Err(ConfigError::CarrierNotConfigured);
        }
        self.reload();
        self.prescale = 0;
        self.periods = 0;
        self.running = true;
        Ok(())
    }

    /// Stop counting; the counter value is held
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the counter is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current counter value
    pub fn count(&self) -> u16 {
        self.count
    }

    /// Number of completed carrier periods since `start`
    pub fn periods(&self) -> u64 {
        self.periods
    }

    /// Feed one clock tick to the counter
    ///
    /// Returns `Some(step)` when the prescaler lets the counter advance,
    /// `None` when the counter is stopped or the prescaler is still counting.
    pub fn clock(&mut self) -> Option<CounterStep> {
        if !self.running {
            return None;
        }
        let config = self.config?;

        self.prescale += 1;
        if self.prescale < config.divisor.ratio() {
            return None;
        }
        self.prescale = 0;

        let top = config.period;
        let boundary = match config.waveform {
            WaveformMode::SingleSlope => match config.direction {
                CountDirection::Down => {
                    if self.count == 0 || self.count > top {
                        self.count = top;
                        true
                    } else {
                        self.count -= 1;
                        false
                    }
                }
                CountDirection::Up => {
                    if self.count >= top {
                        self.count = 0;
                        true
                    } else {
                        self.count += 1;
                        false
                    }
                }
            },
            WaveformMode::DualSlope => match self.slope {
                Slope::Rising => {
                    self.count = (self.count + 1).min(top);
                    if self.count == top {
                        self.slope = Slope::Falling;
                    }
                    false
                }
                Slope::Falling => {
                    self.count = self.count.saturating_sub(1);
                    if self.count == 0 {
                        self.slope = Slope::Rising;
                        true
                    } else {
                        false
                    }
                }
            },
        };

        if boundary {
            self.periods = self.periods.saturating_add(1);
        }

        Some(CounterStep {
            count: self.count,
            boundary,
        })
    }

    /// Load the first value of the count sequence
    fn reload(&mut self) {
        let Some(config) = self.config else {
            return;
        };
        match config.waveform {
            WaveformMode::SingleSlope => {
                self.count = match config.direction {
                    CountDirection::Down => config.period,
                    CountDirection::Up => 0,
                };
            }
            WaveformMode::DualSlope => {
                self.count = 0;
                self.slope = Slope::Rising;
            }
        }
    }
}

impl Default for CarrierCounter {
    fn default() -> Self {
        Self::new()
    }
}
