//! Output pin map
//!
//! The output stage drives eight pins. In complementary mode pair `n` drives
//! pin `2n` (high side) and pin `2n + 1` (low side). In direct mode pin `n`
//! follows compare channel `n`.

use bitflags::bitflags;

/// Number of physical output pins
pub const OUTPUT_PINS: usize = 8;

bitflags! {
    /// Set of output pins
    ///
    /// Used both as a mask (enables, overrides) and as a level snapshot,
    /// where a set bit means the pin is driven high.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Pins: u8 {
        const P0 = 1 << 0;
        const P1 = 1 << 1;
        const P2 = 1 << 2;
        const P3 = 1 << 3;
        const P4 = 1 << 4;
        const P5 = 1 << 5;
        const P6 = 1 << 6;
        const P7 = 1 << 7;
    }
}

impl Pins {
    /// Single pin by index (empty set when out of range)
    pub const fn pin(index: usize) -> Self {
        if index < OUTPUT_PINS {
            Self::from_bits_retain(1 << index)
        } else {
            Self::empty()
        }
    }

    /// High-side pin of a complementary pair
    pub const fn high_side(pair: u8) -> Self {
        Self::pin(pair as usize * 2)
    }

    /// Low-side pin of a complementary pair
    pub const fn low_side(pair: u8) -> Self {
        Self::pin(pair as usize * 2 + 1)
    }

    /// Both pins of a complementary pair
    pub const fn pair(pair: u8) -> Self {
        Self::high_side(pair).union(Self::low_side(pair))
    }

    /// Level of a single pin
    pub fn is_high(self, index: usize) -> bool {
        index < OUTPUT_PINS && self.contains(Self::pin(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_pin_map() {
        assert_eq!(Pins::high_side(0), Pins::P0);
        assert_eq!(Pins::low_side(0), Pins::P1);
        assert_eq!(Pins::pair(3), Pins::P6 | Pins::P7);
    }

    #[test]
    fn test_out_of_range_pin_is_empty() {
        assert_eq!(Pins::pin(8), Pins::empty());
        assert!(!Pins::all().is_high(8));
        assert!(Pins::all().is_high(7));
    }
}
