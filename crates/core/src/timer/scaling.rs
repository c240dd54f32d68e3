//! Amplitude/offset scaling
//!
//! In scaled mode duty cycles are written as Q15 fractions of the carrier
//! period (`0x8000` = 100 %). The effective fraction is
//! `offset + raw * amplitude / 0x8000`, so an amplitude of `0x4000` halves
//! every channel and `0xC000` stretches it by 1.5. The result is converted to
//! ticks against the period and clamped to the channel's max duty.

/// Q15 representation of 1.0
pub const Q15_ONE: u16 = 0x8000;

/// Amplitude and offset registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AmplitudeScaler {
    /// Q15 gain applied to every scaled duty
    pub amplitude: u16,
    /// Q15 offset added after the gain
    pub offset: u16,
}

impl Default for AmplitudeScaler {
    fn default() -> Self {
        Self {
            amplitude: Q15_ONE,
            offset: 0,
        }
    }
}

impl AmplitudeScaler {
    /// Effective Q15 fraction for a raw Q15 duty
    pub fn fraction(&self, raw: u16) -> u32 {
        ((raw as u32 * self.amplitude as u32) >> 15) + self.offset as u32
    }

    /// Compare value in ticks, clamped to `max_duty`
    pub fn to_ticks(&self, raw: u16, period: u16, max_duty: u16) -> u16 {
        let ticks = (self.fraction(raw) as u64 * period as u64) >> 15;
        ticks.min(max_duty as u64) as u16
    }
}
