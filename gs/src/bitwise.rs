use std::ops::RangeInclusive;

/// Helpers to pull register fields out of raw register words.
/// The index (`bit_idx`) goes from lsb to msb (right to left).
pub trait Bits: Copy + Into<u64> {
    fn is_bit_on(self, bit_idx: u8) -> bool {
        debug_assert!(u32::from(bit_idx) < Self::width());
        (self.into() >> bit_idx) & 0b1 == 1
    }

    fn get_bit(self, bit_idx: u8) -> bool {
        self.is_bit_on(bit_idx)
    }

    /// Extracts the inclusive `bits_range` and moves it down to bit 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> u64 {
        let start = *bits_range.start();
        let length = u32::from(*bits_range.end() - start) + 1;
        debug_assert!(u32::from(start) + length <= Self::width());

        // `length` ones, e.g. 1..=10 gives a mask of ten ones.
        let mask = if length == 64 {
            u64::MAX
        } else {
            (1_u64 << length) - 1
        };

        (self.into() >> start) & mask
    }

    fn width() -> u32 {
        (std::mem::size_of::<Self>() * 8) as u32
    }
}

impl Bits for u8 {}
impl Bits for u16 {}
impl Bits for u32 {}
impl Bits for u64 {}

/// Returns `value` with the inclusive `bits_range` replaced by the low bits of `field`.
#[must_use]
pub const fn with_bits(value: u64, start: u8, len: u8, field: u64) -> u64 {
    let mask = if len >= 64 {
        u64::MAX
    } else {
        ((1_u64 << len) - 1) << start
    };
    (value & !mask) | ((field << start) & mask)
}
