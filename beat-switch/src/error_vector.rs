// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Sticky error flags with an interrupt mask.

use num_derive::FromPrimitive;

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum ErrorBit {
    Checksum = 0,
    Runt = 1,
    Oversize = 2,
    /// A learn evicted an entry.
    TableFull = 3,
    IngressOverflow = 4,
    EgressOverflow = 5,
    PauseTimeout = 6,
    /// A scrub request was raised before the previous one was serviced.
    ScrubOverrun = 7,
}

impl ErrorBit {
    #[must_use]
    pub fn mask(self) -> u32 {
        1 << self as u32
    }
}

/// Bits stay set until written back as ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorVector {
    bits: u32,
    mask: u32,
}

impl ErrorVector {
    pub fn raise(&mut self, bit: ErrorBit) {
        self.bits |= bit.mask();
    }

    #[must_use]
    pub fn is_set(&self, bit: ErrorBit) -> bool {
        self.bits & bit.mask() != 0
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.bits
    }

    /// Clear every bit that is set in `value`.
    pub fn write_one_to_clear(&mut self, value: u32) {
        self.bits &= !value;
    }

    #[must_use]
    pub fn interrupt_mask(&self) -> u32 {
        self.mask
    }

    pub fn set_interrupt_mask(&mut self, mask: u32) {
        self.mask = mask;
    }

    /// State of the interrupt line.
    #[must_use]
    pub fn irq(&self) -> bool {
        self.bits & self.mask != 0
    }
}

#[cfg(test)]
mod tests {
    use num_traits::FromPrimitive;

    use super::*;

    #[test]
    fn sticky_until_cleared() {
        let mut errors = ErrorVector::default();
        errors.raise(ErrorBit::Checksum);
        errors.raise(ErrorBit::PauseTimeout);
        assert_eq!(errors.value(), 0b0100_0001);
        assert!(!errors.irq());

        errors.set_interrupt_mask(ErrorBit::PauseTimeout.mask());
        assert!(errors.irq());

        errors.write_one_to_clear(ErrorBit::PauseTimeout.mask());
        assert!(!errors.irq());
        assert!(errors.is_set(ErrorBit::Checksum));
        assert_eq!(ErrorBit::from_u32(7), Some(ErrorBit::ScrubOverrun));
    }
}
