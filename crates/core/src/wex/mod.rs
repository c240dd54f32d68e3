//! Waveform extension (output stage)
//!
//! Turns the raw compare-channel waveforms into pin levels. Each clock tick
//! the stage applies, lowest to highest priority:
//!
//! 1. raw waveform (direct mode) or complementary pair generation
//! 2. dead-time insertion (complementary mode)
//! 3. pattern override
//! 4. fault forcing
//!
//! Pins outside the output-enable mask always read low.

pub mod deadtime;
pub mod fault;
pub mod pattern;

pub use deadtime::{DeadTimeConfig, DeadTimeUnit, GatedPair, Side};
pub use fault::{FaultConfig, FaultInputs, FaultMonitor, FaultState, RestartMode, SafeLevel};
pub use pattern::{PatternConfig, PatternGenerator};

use crate::error::ConfigError;
use crate::pins::Pins;
use crate::timer::{PairId, COMPARE_CHANNELS};

/// Number of complementary output pairs
pub const OUTPUT_PAIRS: usize = 4;

/// How compare channels map onto pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    /// Pin `n` follows channel `n`, no dead time
    Direct,
    /// Pair `n` drives pins `2n`/`2n+1` with dead time
    #[default]
    Complementary,
}

impl OutputMode {
    /// Convert from a parameter value (0 = direct, 1 = complementary)
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OutputMode::Direct),
            1 => Some(OutputMode::Complementary),
            _ => None,
        }
    }
}

/// Output stage state
#[derive(Debug)]
pub struct OutputStage {
    mode: OutputMode,
    deadtime: [DeadTimeUnit; OUTPUT_PAIRS],
    pattern: PatternGenerator,
    fault: FaultMonitor,
    enabled: Pins,
    /// Dead-time gated levels before pattern and fault
    gated: Pins,
    pins: Pins,
}

impl OutputStage {
    /// Complementary mode, zero dead time, all pins disabled
    pub fn new(fault: FaultConfig) -> Self {
        Self {
            mode: OutputMode::Complementary,
            deadtime: Default::default(),
            pattern: PatternGenerator::new(),
            fault: FaultMonitor::new(fault),
            enabled: Pins::empty(),
            gated: Pins::empty(),
            pins: Pins::empty(),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
        self.reset();
    }

    /// Set the output-enable mask
    pub fn enable(&mut self, pins: Pins) {
        self.enabled = pins;
        self.refresh();
    }

    pub fn enabled(&self) -> Pins {
        self.enabled
    }

    /// Dead time of a pair
    pub fn deadtime(&self, pair: PairId) -> Option<DeadTimeConfig> {
        self.deadtime.get(pair as usize).map(DeadTimeUnit::config)
    }

    /// Replace the dead time of a pair
    ///
    /// Period checks are the caller's job.
    pub fn configure_deadtime(
        &mut self,
        pair: PairId,
        config: DeadTimeConfig,
    ) -> Result<(), ConfigError> {
        let unit = self
            .deadtime
            .get_mut(pair as usize)
            .ok_or(ConfigError::InvalidPair(pair))?;
        unit.configure(config);
        Ok(())
    }

    /// Advance one pair's dead-time unit by one tick
    pub fn apply(
        &mut self,
        pair: PairId,
        raw_high: bool,
        raw_low: bool,
    ) -> Result<GatedPair, ConfigError> {
        let unit = self
            .deadtime
            .get_mut(pair as usize)
            .ok_or(ConfigError::InvalidPair(pair))?;
        Ok(unit.apply(raw_high, raw_low))
    }

    pub fn pattern(&self) -> &PatternGenerator {
        &self.pattern
    }

    pub fn pattern_mut(&mut self) -> &mut PatternGenerator {
        &mut self.pattern
    }

    pub fn fault(&self) -> &FaultMonitor {
        &self.fault
    }

    /// Current pin levels
    pub fn pins(&self) -> Pins {
        self.pins
    }

    /// Compute pin levels for one clock tick
    ///
    /// `channels[n]` is the raw level of channel `n` (`None` when the
    /// channel is not configured); `pairs[p]` is the raw level of the channel
    /// driving pair `p`.
    pub fn update(
        &mut self,
        channels: [Option<bool>; COMPARE_CHANNELS],
        pairs: [Option<bool>; OUTPUT_PAIRS],
    ) -> Pins {
        let mut gated = Pins::empty();
        match self.mode {
            OutputMode::Direct => {
                for (index, level) in channels.iter().enumerate() {
                    if *level == Some(true) {
                        gated |= Pins::pin(index);
                    }
                }
            }
            OutputMode::Complementary => {
                for (pair, (unit, raw)) in self.deadtime.iter_mut().zip(pairs).enumerate() {
                    let out = match raw {
                        Some(level) => unit.apply(level, !level),
                        None => unit.apply(false, false),
                    };
                    if out.high {
                        gated |= Pins::high_side(pair as u8);
                    }
                    if out.low {
                        gated |= Pins::low_side(pair as u8);
                    }
                }
            }
        }
        self.gated = gated;
        self.pins = self.gate(gated);
        self.pins
    }

    /// Re-apply pattern and fault forcing to the last gated levels
    ///
    /// Used when the fault state or pattern changes between clock ticks.
    pub fn refresh(&mut self) -> Pins {
        self.pins = self.gate(self.gated);
        self.pins
    }

    fn gate(&self, gated: Pins) -> Pins {
        let levels = match self.fault.forced_level() {
            Some(true) => Pins::all(),
            Some(false) => Pins::empty(),
            None => self.pattern.apply(gated),
        };
        levels & self.enabled
    }

    /// Drop all dead-time state and drive pins low
    pub fn reset(&mut self) {
        for unit in self.deadtime.iter_mut() {
            unit.reset();
        }
        self.gated = Pins::empty();
        self.pins = self.gate(Pins::empty());
    }
}

impl Default for OutputStage {
    fn default() -> Self {
        Self::new(FaultConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> OutputStage {
        let mut stage = OutputStage::default();
        stage.enable(Pins::all());
        stage
    }

    #[test]
    fn test_complementary_pins() {
        let mut stage = stage();
        let pins = stage.update([None; 4], [Some(true), Some(false), None, None]);
        assert_eq!(pins, Pins::P0 | Pins::P3);
    }

    #[test]
    fn test_direct_pins() {
        let mut stage = stage();
        stage.set_mode(OutputMode::Direct);
        let pins = stage.update([Some(true), Some(false), Some(true), None], [None; 4]);
        assert_eq!(pins, Pins::P0 | Pins::P2);
    }

    #[test]
    fn test_disabled_pins_read_low() {
        let mut stage = OutputStage::default();
        stage.enable(Pins::P0);
        let pins = stage.update([None; 4], [Some(false), Some(true), None, None]);
        assert_eq!(pins, Pins::empty());
    }

    #[test]
    fn test_fault_overrides_pattern() {
        let mut stage = stage();
        stage.pattern_mut().enable(PatternConfig::all_pins(0xFF));
        assert_eq!(stage.update([None; 4], [None; 4]), Pins::all());

        stage.fault().notify(FaultInputs::A);
        assert_eq!(stage.refresh(), Pins::empty());
        assert_eq!(stage.update([None; 4], [None; 4]), Pins::empty());
    }

    #[test]
    fn test_deadtime_pair_out_of_range() {
        let mut stage = stage();
        assert_eq!(
            stage.configure_deadtime(4, DeadTimeConfig::default()),
            Err(ConfigError::InvalidPair(4))
        );
        assert_eq!(stage.apply(7, true, false), Err(ConfigError::InvalidPair(7)));
    }

    #[test]
    fn test_output_mode_from_u8() {
        assert_eq!(OutputMode::from_u8(0), Some(OutputMode::Direct));
        assert_eq!(OutputMode::from_u8(1), Some(OutputMode::Complementary));
        assert_eq!(OutputMode::from_u8(2), None);
    }
}
