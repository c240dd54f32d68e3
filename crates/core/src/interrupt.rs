//! Interrupt flags
//!
//! The hardware raises a flag for every compare match, period boundary
//! (overflow) and fault detection. A flag is requested only while its
//! interrupt is enabled, and stays raised until acknowledged. Pending
//! requests are served in a fixed priority order: fault first, then compare
//! channels 0 to 3, then overflow.

use bitflags::bitflags;

use crate::timer::{ChannelId, COMPARE_CHANNELS};

bitflags! {
    /// Interrupt flag register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InterruptFlags: u8 {
        const CMP0 = 1 << 0;
        const CMP1 = 1 << 1;
        const CMP2 = 1 << 2;
        const CMP3 = 1 << 3;
        /// Period boundary
        const OVF = 1 << 4;
        const FAULT = 1 << 5;
    }
}

impl InterruptFlags {
    /// Compare flag of a channel (empty when out of range)
    pub const fn compare(channel: ChannelId) -> Self {
        if (channel as usize) < COMPARE_CHANNELS {
            Self::from_bits_retain(1 << channel)
        } else {
            Self::empty()
        }
    }
}

/// Interrupt source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    Fault,
    CompareMatch(ChannelId),
    Overflow,
}

impl Interrupt {
    /// Sources in service order
    pub const PRIORITY: [Interrupt; 6] = [
        Interrupt::Fault,
        Interrupt::CompareMatch(0),
        Interrupt::CompareMatch(1),
        Interrupt::CompareMatch(2),
        Interrupt::CompareMatch(3),
        Interrupt::Overflow,
    ];

    pub const fn flag(self) -> InterruptFlags {
        match self {
            Interrupt::Fault => InterruptFlags::FAULT,
            Interrupt::CompareMatch(ch) => InterruptFlags::compare(ch),
            Interrupt::Overflow => InterruptFlags::OVF,
        }
    }
}

/// Flag and enable registers
#[derive(Debug, Clone, Default)]
pub struct InterruptController {
    enabled: InterruptFlags,
    raised: InterruptFlags,
}

impl InterruptController {
    pub const fn new() -> Self {
        Self {
            enabled: InterruptFlags::empty(),
            raised: InterruptFlags::empty(),
        }
    }

    /// Set the enable mask
    pub fn enable(&mut self, flags: InterruptFlags) {
        self.enabled = flags;
    }

    pub fn enabled(&self) -> InterruptFlags {
        self.enabled
    }

    /// Hardware sets flags regardless of the enable mask
    pub fn raise(&mut self, flags: InterruptFlags) {
        self.raised |= flags;
    }

    /// Raised flags, enabled or not
    pub fn raised(&self) -> InterruptFlags {
        self.raised
    }

    /// Raised and enabled flags
    pub fn requested(&self) -> InterruptFlags {
        self.raised & self.enabled
    }

    /// Highest-priority requested interrupt
    pub fn next_pending(&self) -> Option<Interrupt> {
        let requested = self.requested();
        Interrupt::PRIORITY
            .into_iter()
            .find(|irq| requested.contains(irq.flag()))
    }

    /// Clear a flag (done by its handler)
    pub fn acknowledge(&mut self, irq: Interrupt) {
        self.raised.remove(irq.flag());
    }

    /// Clear every flag
    pub fn clear_all(&mut self) {
        self.raised = InterruptFlags::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_flag_not_requested() {
        let mut irq = InterruptController::new();
        irq.raise(InterruptFlags::CMP0);
        assert_eq!(irq.next_pending(), None);
        assert_eq!(irq.raised(), InterruptFlags::CMP0);

        irq.enable(InterruptFlags::CMP0);
        assert_eq!(irq.next_pending(), Some(Interrupt::CompareMatch(0)));
    }

    #[test]
    fn test_fault_served_first() {
        let mut irq = InterruptController::new();
        irq.enable(InterruptFlags::all());
        irq.raise(InterruptFlags::OVF | InterruptFlags::CMP2 | InterruptFlags::FAULT);

        assert_eq!(irq.next_pending(), Some(Interrupt::Fault));
        irq.acknowledge(Interrupt::Fault);
        assert_eq!(irq.next_pending(), Some(Interrupt::CompareMatch(2)));
        irq.acknowledge(Interrupt::CompareMatch(2));
        assert_eq!(irq.next_pending(), Some(Interrupt::Overflow));
        irq.acknowledge(Interrupt::Overflow);
        assert_eq!(irq.next_pending(), None);
    }

    #[test]
    fn test_clear_all_keeps_enable_mask() {
        let mut irq = InterruptController::new();
        irq.enable(InterruptFlags::CMP1 | InterruptFlags::FAULT);
        irq.raise(InterruptFlags::CMP1 | InterruptFlags::OVF);

        irq.clear_all();
        assert_eq!(irq.raised(), InterruptFlags::empty());
        assert_eq!(irq.next_pending(), None);
        assert_eq!(irq.enabled(), InterruptFlags::CMP1 | InterruptFlags::FAULT);
    }

    #[test]
    fn test_compare_flag_lookup() {
        assert_eq!(InterruptFlags::compare(3), InterruptFlags::CMP3);
        assert_eq!(InterruptFlags::compare(4), InterruptFlags::empty());
        assert_eq!(Interrupt::CompareMatch(1).flag(), InterruptFlags::CMP1);
    }
}
