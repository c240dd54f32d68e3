//! Configuration error types
//!
//! Static parameters are validated when a `configure_*` call is made. A
//! rejected call leaves the previous configuration untouched. Fault
//! conditions are not errors; they are reported through
//! [`FaultState`](crate::wex::fault::FaultState).

use core::fmt;

/// Errors reported by configuration calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Carrier period (TOP) must be positive
    ZeroPeriod,
    /// A duty cycle value is above the channel's maximum
    DutyOutOfRange {
        /// Channel index
        channel: u8,
        /// Rejected duty cycle (ticks)
        duty: u16,
        /// Configured maximum duty cycle (ticks)
        max_duty: u16,
    },
    /// Maximum duty cycle must stay below the carrier period
    MaxDutyNotBelowPeriod {
        /// Channel index
        channel: u8,
        /// Configured maximum duty cycle (ticks)
        max_duty: u16,
        /// Carrier period (ticks)
        period: u16,
    },
    /// A duty ramp needs a non-empty range to wrap in
    EmptyDutyRange {
        /// Channel index
        channel: u8,
    },
    /// Total dead time of a pair must be shorter than the carrier period
    DeadTimeExceedsPeriod {
        /// Output pair index
        pair: u8,
        /// Low-side plus high-side dead time (ticks)
        dead_time: u32,
        /// Carrier period (ticks)
        period: u16,
    },
    /// Gap between max duty and period cannot hold the pair's dead time
    InsufficientDutyMargin {
        /// Channel index
        channel: u8,
        /// `period - max_duty` (ticks)
        margin: u16,
        /// Low-side plus high-side dead time of the driven pair (ticks)
        dead_time: u32,
    },
    /// Another channel already drives this complementary pair
    PairAlreadyDriven {
        /// Output pair index
        pair: u8,
        /// Channel currently driving the pair
        channel: u8,
    },
    /// Compare channel index out of range
    InvalidChannel(u8),
    /// Output pair index out of range
    InvalidPair(u8),
    /// Event channel index out of range
    InvalidEventChannel(u8),
    /// Compare channel has not been configured
    ChannelNotConfigured(u8),
    /// Carrier must be configured before this operation
    CarrierNotConfigured,
    /// Amplitude scaling has not been configured
    ScalingNotConfigured,
    /// Static configuration cannot change while the counter runs
    CounterRunning,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroPeriod => write!(f, "carrier period must be positive"),
            ConfigError::DutyOutOfRange {
                channel,
                duty,
                max_duty,
            } => write!(
                f,
                "channel {}: duty cycle {} exceeds maximum {}",
                channel, duty, max_duty
            ),
            ConfigError::MaxDutyNotBelowPeriod {
                channel,
                max_duty,
                period,
            } => write!(
                f,
                "channel {}: max duty {} must be below period {}",
                channel, max_duty, period
            ),
            ConfigError::EmptyDutyRange { channel } => {
                write!(f, "channel {}: duty ramp needs a max duty above zero", channel)
            }
            ConfigError::DeadTimeExceedsPeriod {
                pair,
                dead_time,
                period,
            } => write!(
                f,
                "pair {}: dead time {} ticks does not fit in period {}",
                pair, dead_time, period
            ),
            ConfigError::InsufficientDutyMargin {
                channel,
                margin,
                dead_time,
            } => write!(
                f,
                "channel {}: duty margin {} ticks cannot hold dead time {}",
                channel, margin, dead_time
            ),
            ConfigError::PairAlreadyDriven { pair, channel } => {
                write!(f, "pair {} is already driven by channel {}", pair, channel)
            }
            ConfigError::InvalidChannel(ch) => write!(f, "invalid compare channel {}", ch),
            ConfigError::InvalidPair(pair) => write!(f, "invalid output pair {}", pair),
            ConfigError::InvalidEventChannel(ch) => write!(f, "invalid event channel {}", ch),
            ConfigError::ChannelNotConfigured(ch) => {
                write!(f, "compare channel {} is not configured", ch)
            }
            ConfigError::CarrierNotConfigured => write!(f, "carrier counter is not configured"),
            ConfigError::ScalingNotConfigured => write!(f, "amplitude scaling is not configured"),
            ConfigError::CounterRunning => {
                write!(f, "static configuration cannot change while the counter runs")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            format!("{}", ConfigError::ZeroPeriod),
            "carrier period must be positive"
        );

        let error = ConfigError::DeadTimeExceedsPeriod {
            pair: 1,
            dead_time: 12,
            period: 10,
        };
        assert_eq!(
            format!("{}", error),
            "pair 1: dead time 12 ticks does not fit in period 10"
        );

        let error = ConfigError::DutyOutOfRange {
            channel: 2,
            duty: 995,
            max_duty: 990,
        };
        assert_eq!(
            format!("{}", error),
            "channel 2: duty cycle 995 exceeds maximum 990"
        );
    }
}
