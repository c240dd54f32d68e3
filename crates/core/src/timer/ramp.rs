//! Duty-cycle ramps
//!
//! A ramp is the update task bound to a compare channel: on every compare
//! match it derives the next pending value from the active one. Channels with
//! different increments produce independently phased ramps.

use crate::error::ConfigError;

use super::compare::ChannelId;

/// Behaviour when a ramp reaches the channel's maximum duty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RampWrap {
    /// `next = (active + increment) mod max_duty`
    #[default]
    Modulo,
    /// `next = active + increment`, or 0 once that reaches `max_duty`
    ResetToZero,
}

impl RampWrap {
    /// Convert from a parameter value (0 = modulo, 1 = reset to zero)
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RampWrap::Modulo),
            1 => Some(RampWrap::ResetToZero),
            _ => None,
        }
    }
}

/// Ramp parameters for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyRamp {
    /// Added to the active value on every compare match
    pub increment: u16,
    /// Wrap point (the channel's max duty)
    pub max_duty: u16,
    /// Wrap behaviour
    pub wrap: RampWrap,
}

impl DutyRamp {
    /// Build a ramp, rejecting an empty wrap range
    pub fn new(
        channel: ChannelId,
        increment: u16,
        max_duty: u16,
        wrap: RampWrap,
    ) -> Result<Self, ConfigError> {
        if max_duty == 0 {
            return Err(ConfigError::EmptyDutyRange { channel });
        }
        Ok(Self {
            increment,
            max_duty,
            wrap,
        })
    }

    /// Next pending value for the given active value
    ///
    /// The result is always below `max_duty`.
    pub fn next(&self, active: u16) -> u16 {
        let sum = active as u32 + self.increment as u32;
        let max = self.max_duty as u32;
        let next = match self.wrap {
            RampWrap::Modulo => sum % max,
            RampWrap::ResetToZero => {
                if sum >= max {
                    0
                } else {
                    sum
                }
            }
        };
        next as u16
    }
}
