//! Single 8-bit storage cell.
//!
//! Every register and memory byte in the machine is a `ByteCell`.
//! A cell is owned by exactly one register or memory slot and is
//! mutated only through `get`/`set`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A mutable 8-bit storage unit.
///
/// Values are masked by the `u8` type itself: there is no overflow
/// error, only the low 8 bits are ever stored.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ByteCell {
    value: u8,
}

impl ByteCell {
    /// Width in bits, used by flag-computation routines.
    pub const WIDTH: u32 = 8;

    /// Create a cell holding zero.
    #[inline]
    pub const fn zero() -> Self {
        Self { value: 0 }
    }

    /// Create a cell holding the given byte.
    #[inline]
    pub const fn new(value: u8) -> Self {
        Self { value }
    }

    /// Read the stored byte.
    #[inline]
    pub const fn get(&self) -> u8 {
        self.value
    }

    /// Store a byte.
    #[inline]
    pub fn set(&mut self, value: u8) {
        self.value = value;
    }

    /// Store the low 8 bits of a wider value.
    #[inline]
    pub fn set_truncated(&mut self, value: u16) {
        self.value = (value & 0xFF) as u8;
    }

    /// Invert every bit in place (used by CMA).
    #[inline]
    pub fn complement(&mut self) {
        self.value ^= 0xFF;
    }
}

impl fmt::Debug for ByteCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteCell(0x{:02X})", self.value)
    }
}

impl From<u8> for ByteCell {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<ByteCell> for u8 {
    fn from(cell: ByteCell) -> Self {
        cell.get()
    }
}
