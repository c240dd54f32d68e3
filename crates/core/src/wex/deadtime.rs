//! Dead-time insertion
//!
//! A dead-time unit sits between a raw complementary pair and the output
//! pins. Whenever one side is about to turn on, both sides are held off for
//! that side's delay first. The gated pair therefore never has both sides
//! active, and every hand-over between sides is separated by an idle band
//! of `low_side_ticks` (turning the low side on) or `high_side_ticks`
//! (turning the high side on).

/// Dead time of one complementary pair, in clock ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeadTimeConfig {
    /// Delay inserted before the low side turns on
    pub low_side_ticks: u16,
    /// Delay inserted before the high side turns on
    pub high_side_ticks: u16,
}

impl DeadTimeConfig {
    /// Combined dead time of both hand-overs in one period
    pub const fn total(&self) -> u32 {
        self.low_side_ticks as u32 + self.high_side_ticks as u32
    }

    fn delay(&self, side: Side) -> u16 {
        match side {
            Side::High => self.high_side_ticks,
            Side::Low => self.low_side_ticks,
        }
    }
}

/// One side of a complementary pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Side {
    High,
    Low,
}

/// Gated levels of a complementary pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GatedPair {
    pub high: bool,
    pub low: bool,
}

impl GatedPair {
    /// Both sides off
    pub const OFF: Self = Self {
        high: false,
        low: false,
    };

    fn driving(side: Option<Side>) -> Self {
        match side {
            Some(Side::High) => Self {
                high: true,
                low: false,
            },
            Some(Side::Low) => Self {
                high: false,
                low: true,
            },
            None => Self::OFF,
        }
    }
}

/// Dead-time generator for one pair
#[derive(Debug, Clone, Default)]
pub struct DeadTimeUnit {
    config: DeadTimeConfig,
    asserted: Option<Side>,
    /// Side waiting to turn on and the remaining idle ticks
    pending: Option<(Side, u16)>,
}

impl DeadTimeUnit {
    /// Create a unit with the given delays and both sides off
    pub const fn new(config: DeadTimeConfig) -> Self {
        Self {
            config,
            asserted: None,
            pending: None,
        }
    }

    /// Configured delays
    pub fn config(&self) -> DeadTimeConfig {
        self.config
    }

    /// Replace the delays; the pair restarts with both sides off
    pub fn configure(&mut self, config: DeadTimeConfig) {
        self.config = config;
        self.reset();
    }

    /// Drop both sides and any countdown in progress
    pub fn reset(&mut self) {
        self.asserted = None;
        self.pending = None;
    }

    /// Advance one clock tick with the given raw levels
    ///
    /// Exactly one raw side high selects that side; conflicting or empty raw
    /// inputs turn both sides off at once.
    pub fn apply(&mut self, raw_high: bool, raw_low: bool) -> GatedPair {
        let target = match (raw_high, raw_low) {
            (true, false) => Some(Side::High),
            (false, true) => Some(Side::Low),
            _ => None,
        };

        let Some(side) = target else {
            self.reset();
            return GatedPair::OFF;
        };

        if self.asserted == Some(side) {
            self.pending = None;
            return GatedPair::driving(self.asserted);
        }

        // The opposite side (if any) drops immediately.
        self.asserted = None;
        let remaining = match self.pending {
            Some((waiting, remaining)) if waiting == side => remaining,
            _ => self.config.delay(side),
        };

        if remaining == 0 {
            self.pending = None;
            self.asserted = Some(side);
        } else {
            self.pending = Some((side, remaining - 1));
        }
        GatedPair::driving(self.asserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(low: u16, high: u16) -> DeadTimeUnit {
        DeadTimeUnit::new(DeadTimeConfig {
            low_side_ticks: low,
            high_side_ticks: high,
        })
    }

    #[test]
    fn test_high_side_waits_high_side_ticks() {
        let mut dt = unit(3, 5);
        for _ in 0..5 {
            assert_eq!(dt.apply(true, false), GatedPair::OFF);
        }
        assert_eq!(
            dt.apply(true, false),
            GatedPair {
                high: true,
                low: false
            }
        );
    }

    #[test]
    fn test_hand_over_inserts_low_side_band() {
        let mut dt = unit(3, 5);
        for _ in 0..6 {
            dt.apply(true, false);
        }
        assert!(dt.apply(true, false).high);

        // High side drops at once, low side waits 3 ticks.
        for _ in 0..3 {
            assert_eq!(dt.apply(false, true), GatedPair::OFF);
        }
        assert!(dt.apply(false, true).low);
    }

    #[test]
    fn test_zero_dead_time_passes_through() {
        let mut dt = unit(0, 0);
        assert!(dt.apply(true, false).high);
        assert!(dt.apply(false, true).low);
        assert!(dt.apply(true, false).high);
    }

    #[test]
    fn test_conflicting_inputs_gate_off() {
        let mut dt = unit(0, 0);
        assert!(dt.apply(true, false).high);
        assert_eq!(dt.apply(true, true), GatedPair::OFF);
        assert_eq!(dt.apply(false, false), GatedPair::OFF);
    }

    #[test]
    fn test_short_pulse_is_swallowed() {
        let mut dt = unit(2, 2);
        for _ in 0..3 {
            dt.apply(false, true);
        }
        assert!(dt.apply(false, true).low);

        // A 2-tick high request never survives the 2-tick band.
        assert_eq!(dt.apply(true, false), GatedPair::OFF);
        assert_eq!(dt.apply(true, false), GatedPair::OFF);
        assert_eq!(dt.apply(false, true), GatedPair::OFF);
        assert_eq!(dt.apply(false, true), GatedPair::OFF);
        assert!(dt.apply(false, true).low);
    }

    #[test]
    fn test_reconfigure_resets_outputs() {
        let mut dt = unit(0, 0);
        assert!(dt.apply(true, false).high);
        dt.configure(DeadTimeConfig {
            low_side_ticks: 1,
            high_side_ticks: 1,
        });
        assert_eq!(dt.apply(true, false), GatedPair::OFF);
        assert!(dt.apply(true, false).high);
    }

    #[test]
    fn test_total() {
        assert_eq!(
            DeadTimeConfig {
                low_side_ticks: 3,
                high_side_ticks: 5
            }
            .total(),
            8
        );
    }
}
