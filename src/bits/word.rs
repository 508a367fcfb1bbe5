//! 16-bit views over pairs of byte cells.
//!
//! Two flavors share the same value model `(high << 8) | low`:
//! - `Word16` owns its two cells. The program counter and stack pointer
//!   are Word16s; they additionally wrap around as a unit when stepped.
//! - `PairView` borrows two cells it does not own. The BC/DE/HL register
//!   pairs and the PSW pairing (flags high, accumulator low) are
//!   PairViews: mutating the view mutates the underlying cells.

use crate::bits::ByteCell;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dedicated 16-bit register built from two owned byte cells.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Word16 {
    high: ByteCell,
    low: ByteCell,
}

impl Word16 {
    /// Width in bits, used by flag-computation routines.
    pub const WIDTH: u32 = 16;

    /// Create a register holding zero.
    #[inline]
    pub const fn zero() -> Self {
        Self {
            high: ByteCell::zero(),
            low: ByteCell::zero(),
        }
    }

    /// Create a register holding the given value.
    pub fn new(value: u16) -> Self {
        let mut word = Self::zero();
        word.set(value);
        word
    }

    /// The combined 16-bit value.
    #[inline]
    pub const fn get(&self) -> u16 {
        ((self.high.get() as u16) << 8) | self.low.get() as u16
    }

    /// Store a 16-bit value across both cells.
    #[inline]
    pub fn set(&mut self, value: u16) {
        self.low.set((value & 0xFF) as u8);
        self.high.set((value >> 8) as u8);
    }

    /// Read the high byte.
    #[inline]
    pub const fn get_high(&self) -> u8 {
        self.high.get()
    }

    /// Read the low byte.
    #[inline]
    pub const fn get_low(&self) -> u8 {
        self.low.get()
    }

    /// Write the high byte.
    #[inline]
    pub fn set_high(&mut self, value: u8) {
        self.high.set(value);
    }

    /// Write the low byte.
    #[inline]
    pub fn set_low(&mut self, value: u8) {
        self.low.set(value);
    }

    /// Increment by one, wrapping 0xFFFF to 0x0000.
    ///
    /// Returns the pre-increment value (handy for a fetch that also
    /// needs the address it fetched from).
    pub fn advance(&mut self) -> u16 {
        let old = self.get();
        if self.low.get() == 0xFF {
            self.low.set(0x00);
            self.high.set(self.high.get().wrapping_add(1));
        } else {
            self.low.set(self.low.get() + 1);
        }
        old
    }

    /// Decrement by one, wrapping 0x0000 to 0xFFFF.
    pub fn rewind(&mut self) -> u16 {
        let old = self.get();
        if self.low.get() == 0x00 {
            self.low.set(0xFF);
            self.high.set(self.high.get().wrapping_sub(1));
        } else {
            self.low.set(self.low.get() - 1);
        }
        old
    }
}

impl fmt::Debug for Word16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word16(0x{:04X})", self.get())
    }
}

impl From<u16> for Word16 {
    fn from(value: u16) -> Self {
        Self::new(value)
    }
}

/// A 16-bit projection over two byte cells it does not own.
///
/// The view holds no value of its own; `get` derives it from the
/// cells and `set` writes straight through to them. Two disjoint
/// views may be formed over the same cells at different times
/// (e.g. the accumulator participates in both PSW and plain loads).
pub struct PairView<'a> {
    high: &'a mut ByteCell,
    low: &'a mut ByteCell,
}

impl<'a> PairView<'a> {
    /// Width in bits, used by flag-computation routines.
    pub const WIDTH: u32 = 16;

    /// Form a view over a (high, low) cell pair.
    pub fn new(high: &'a mut ByteCell, low: &'a mut ByteCell) -> Self {
        Self { high, low }
    }

    /// The combined 16-bit value.
    #[inline]
    pub fn get(&self) -> u16 {
        ((self.high.get() as u16) << 8) | self.low.get() as u16
    }

    /// Store a 16-bit value into the underlying cells.
    #[inline]
    pub fn set(&mut self, value: u16) {
        self.high.set((value >> 8) as u8);
        self.low.set((value & 0xFF) as u8);
    }

    /// Read the high byte.
    #[inline]
    pub fn get_high(&self) -> u8 {
        self.high.get()
    }

    /// Read the low byte.
    #[inline]
    pub fn get_low(&self) -> u8 {
        self.low.get()
    }

    /// Write the high byte.
    #[inline]
    pub fn set_high(&mut self, value: u8) {
        self.high.set(value);
    }

    /// Write the low byte.
    #[inline]
    pub fn set_low(&mut self, value: u8) {
        self.low.set(value);
    }

    /// Increment the pair by one, wrapping 0xFFFF to 0x0000 (INX).
    ///
    /// Touches no flags; 16-bit stepping never reports a carry.
    pub fn advance(&mut self) {
        let next = self.get().wrapping_add(1);
        self.set(next);
    }

    /// Decrement the pair by one, wrapping 0x0000 to 0xFFFF (DCX).
    pub fn rewind(&mut self) {
        let next = self.get().wrapping_sub(1);
        self.set(next);
    }
}

impl fmt::Debug for PairView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PairView(0x{:04X})", self.get())
    }
}
