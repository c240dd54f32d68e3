//! Pattern generation
//!
//! Overrides selected output pins with the bits of a raw 8-bit pattern.
//! Pins outside the override mask keep their dead-time gated level. Fault
//! forcing is applied after the pattern and always wins.

use crate::pins::Pins;

/// Pattern generator setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatternConfig {
    /// Pins taken over by the pattern
    pub overrides: Pins,
    /// Initial pattern value (bit n drives pin n)
    pub pattern: u8,
}

impl PatternConfig {
    /// Override all eight pins
    pub const fn all_pins(pattern: u8) -> Self {
        Self {
            overrides: Pins::all(),
            pattern,
        }
    }
}

/// Output override stage
#[derive(Debug, Clone, Default)]
pub struct PatternGenerator {
    overrides: Pins,
    pattern: Pins,
    enabled: bool,
}

impl PatternGenerator {
    pub const fn new() -> Self {
        Self {
            overrides: Pins::empty(),
            pattern: Pins::empty(),
            enabled: false,
        }
    }

    pub fn enable(&mut self, config: PatternConfig) {
        self.overrides = config.overrides;
        self.pattern = Pins::from_bits_retain(config.pattern);
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Replace the pattern value; takes effect on the next output update
    pub fn set_pattern(&mut self, pattern: u8) {
        self.pattern = Pins::from_bits_retain(pattern);
    }

    pub fn pattern(&self) -> u8 {
        self.pattern.bits()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Merge the pattern into the gated pin levels
    pub fn apply(&self, gated: Pins) -> Pins {
        if !self.enabled {
            return gated;
        }
        (gated - self.overrides) | (self.pattern & self.overrides)
    }
}
