//! Double-buffered compare channels
//!
//! Each channel holds an active compare value, used against the carrier
//! counter, and an optional pending value written by software. The pending
//! value is promoted only on a carrier period boundary, so a write made
//! during period `k` takes effect from the first tick of period `k + 1`.

use super::ramp::RampWrap;
use crate::error::ConfigError;
use bitflags::bitflags;

/// Number of compare channels
pub const COMPARE_CHANNELS: usize = 4;

/// Compare channel index (0..COMPARE_CHANNELS)
pub type ChannelId = u8;

/// Complementary output pair index (0..OUTPUT_PAIRS)
pub type PairId = u8;

bitflags! {
    /// Set of compare channels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Channels: u8 {
        const CH0 = 1 << 0;
        const CH1 = 1 << 1;
        const CH2 = 1 << 2;
        const CH3 = 1 << 3;
    }
}

impl Channels {
    /// Single channel by index (empty set when out of range)
    pub const fn channel(id: ChannelId) -> Self {
        if (id as usize) < COMPARE_CHANNELS {
            Self::from_bits_retain(1 << id)
        } else {
            Self::empty()
        }
    }
}

/// Static configuration of one compare channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    /// Compare value loaded at configuration time (ticks)
    pub initial_duty: u16,
    /// Largest compare value the channel accepts (ticks)
    pub max_duty: u16,
    /// Increment applied on every compare match, `None` for a fixed duty
    pub ramp_step: Option<u16>,
    /// How the ramp wraps at `max_duty`
    pub wrap: RampWrap,
    /// Complementary pair driven by this channel, `None` when unprotected
    pub output_pair: Option<PairId>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            initial_duty: 0,
            max_duty: 990,
            ramp_step: None,
            wrap: RampWrap::Modulo,
            output_pair: None,
        }
    }
}

impl ChannelConfig {
    /// Channel-local checks against the carrier period
    ///
    /// Pair margins are checked by the controller, which knows the dead time.
    pub fn validate(&self, channel: ChannelId, period: u16) -> Result<(), ConfigError> {
        if self.max_duty >= period {
            return Err(ConfigError::MaxDutyNotBelowPeriod {
                channel,
                max_duty: self.max_duty,
                period,
            });
        }
        if self.initial_duty > self.max_duty {
            return Err(ConfigError::DutyOutOfRange {
                channel,
                duty: self.initial_duty,
                max_duty: self.max_duty,
            });
        }
        if self.ramp_step.is_some() && self.max_duty == 0 {
            return Err(ConfigError::EmptyDutyRange { channel });
        }
        Ok(())
    }
}

/// Runtime state of one compare channel
#[derive(Debug, Clone, Copy)]
pub struct CompareChannel {
    id: ChannelId,
    active: u16,
    pending: Option<u16>,
    max_duty: u16,
    output_pair: Option<PairId>,
    matched: bool,
}

impl CompareChannel {
    /// Create a channel with `initial_duty` already active
    ///
    /// The configuration must have been validated.
    pub fn new(id: ChannelId, config: &ChannelConfig) -> Self {
        Self {
            id,
            active: config.initial_duty,
            pending: None,
            max_duty: config.max_duty,
            output_pair: config.output_pair,
            matched: false,
        }
    }

    /// Channel index
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Value currently compared against the counter
    pub fn active(&self) -> u16 {
        self.active
    }

    /// Value waiting for the next period boundary
    pub fn pending(&self) -> Option<u16> {
        self.pending
    }

    /// Largest accepted compare value
    pub fn max_duty(&self) -> u16 {
        self.max_duty
    }

    /// Complementary pair driven by this channel
    pub fn output_pair(&self) -> Option<PairId> {
        self.output_pair
    }

    /// Write the pending buffer
    ///
    /// A second write before the boundary replaces the first.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DutyOutOfRange` when `duty > max_duty`; the
    /// pending buffer is left unchanged.
    pub fn write(&mut self, duty: u16) -> Result<(), ConfigError> {
        if duty > self.max_duty {
            return Err(ConfigError::DutyOutOfRange {
                channel: self.id,
                duty,
                max_duty: self.max_duty,
            });
        }
        self.pending = Some(duty);
        Ok(())
    }

    /// Period boundary: promote pending to active and re-arm matching
    ///
    /// Returns `true` if a pending value was promoted.
    pub fn on_period_boundary(&mut self) -> bool {
        self.matched = false;
        match self.pending.take() {
            Some(duty) => {
                self.active = duty;
                true
            }
            None => false,
        }
    }

    /// Check the counter against the active value
    ///
    /// Reports a match at most once per carrier period.
    pub fn check_match(&mut self, count: u16) -> bool {
        if self.matched || count != self.active {
            return false;
        }
        self.matched = true;
        true
    }

    /// Raw (ungated) waveform level for the given counter value
    pub fn raw_output(&self, count: u16) -> bool {
        count < self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(initial_duty: u16) -> CompareChannel {
        CompareChannel::new(
            0,
            &ChannelConfig {
                initial_duty,
                max_duty: 990,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_validate_rejects_max_at_period() {
        let config = ChannelConfig {
            max_duty: 1000,
            ..Default::default()
        };
        assert_eq!(
            config.validate(1, 1000),
            Err(ConfigError::MaxDutyNotBelowPeriod {
                channel: 1,
                max_duty: 1000,
                period: 1000
            })
        );
    }

    #[test]
    fn test_validate_rejects_initial_above_max() {
        let config = ChannelConfig {
            initial_duty: 991,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(0, 999),
            Err(ConfigError::DutyOutOfRange { duty: 991, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_ramp_without_range() {
        let config = ChannelConfig {
            max_duty: 0,
            ramp_step: Some(5),
            ..Default::default()
        };
        assert_eq!(
            config.validate(2, 999),
            Err(ConfigError::EmptyDutyRange { channel: 2 })
        );
    }

    #[test]
    fn test_pending_write_waits_for_boundary() {
        let mut ch = channel(100);
        ch.write(200).unwrap();
        assert_eq!(ch.active(), 100);
        assert_eq!(ch.pending(), Some(200));

        assert!(ch.on_period_boundary());
        assert_eq!(ch.active(), 200);
        assert_eq!(ch.pending(), None);
        assert!(!ch.on_period_boundary());
    }

    #[test]
    fn test_last_write_wins() {
        let mut ch = channel(0);
        ch.write(10).unwrap();
        ch.write(20).unwrap();
        ch.on_period_boundary();
        assert_eq!(ch.active(), 20);
    }

    #[test]
    fn test_write_above_max_rejected() {
        let mut ch = channel(0);
        ch.write(5).unwrap();
        assert!(ch.write(991).is_err());
        assert_eq!(ch.pending(), Some(5));
        assert!(ch.write(990).is_ok());
    }

    #[test]
    fn test_match_once_per_period() {
        let mut ch = channel(3);
        assert!(!ch.check_match(4));
        assert!(ch.check_match(3));
        assert!(!ch.check_match(3));
        ch.on_period_boundary();
        assert!(ch.check_match(3));
    }

    #[test]
    fn test_raw_output_level() {
        let ch = channel(3);
        assert!(ch.raw_output(0));
        assert!(ch.raw_output(2));
        assert!(!ch.raw_output(3));

        let zero = channel(0);
        assert!(!zero.raw_output(0));
    }

    #[test]
    fn test_channel_mask() {
        assert_eq!(Channels::channel(2), Channels::CH2);
        assert_eq!(Channels::channel(4), Channels::empty());
    }
}
