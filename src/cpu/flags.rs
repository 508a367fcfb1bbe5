//! The 5-bit condition (status) register.
//!
//! Five independent bits: Carry, Sign, Zero, Parity, Aux-Carry. They
//! are packed into one byte for storage and for the PSW stack pairing,
//! but every instruction manipulates them individually. Only documented
//! instructions touch Aux-Carry (INR/DCR, DAA) or Carry (carry-bit ops,
//! DAD, DAA, PSW restore).

use crate::bits::ByteCell;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five condition bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    /// Set when an operation carries out of bit 7 (or borrows into it).
    Carry,
    /// Mirrors bit 7 of a result: set for negative two's-complement values.
    Sign,
    /// Set when a result is exactly zero.
    Zero,
    /// Set when a result has an even number of one bits.
    Parity,
    /// Carry out of bit 3; touched only by INR, DCR, and DAA.
    AuxCarry,
}

impl Flag {
    /// All five flags in mask order.
    pub const ALL: [Flag; 5] = [
        Flag::Carry,
        Flag::Sign,
        Flag::Zero,
        Flag::Parity,
        Flag::AuxCarry,
    ];

    /// The bit this flag occupies in the packed status byte.
    #[inline]
    pub const fn mask(self) -> u8 {
        match self {
            Flag::Carry => 0x01,
            Flag::Sign => 0x02,
            Flag::Zero => 0x04,
            Flag::Parity => 0x08,
            Flag::AuxCarry => 0x10,
        }
    }
}

/// The packed status register.
///
/// Invariant: only the low five bits are ever set. Whole-byte restores
/// (POP PSW) are masked so an undocumented bit cannot appear.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusFlags {
    bits: ByteCell,
}

impl StatusFlags {
    /// The five documented bits.
    pub const MASK: u8 = 0x1F;

    /// Create a status register with every flag clear.
    pub const fn new() -> Self {
        Self {
            bits: ByteCell::zero(),
        }
    }

    /// Test a flag.
    #[inline]
    pub fn get(&self, flag: Flag) -> bool {
        self.bits.get() & flag.mask() != 0
    }

    /// Set a flag, leaving the other four untouched.
    #[inline]
    pub fn set(&mut self, flag: Flag) {
        self.bits.set(self.bits.get() | flag.mask());
    }

    /// Clear a flag, leaving the other four untouched.
    #[inline]
    pub fn clear(&mut self, flag: Flag) {
        self.bits.set(self.bits.get() & (Self::MASK ^ flag.mask()));
    }

    /// Flip a flag, leaving the other four untouched.
    #[inline]
    pub fn toggle(&mut self, flag: Flag) {
        self.bits.set(self.bits.get() ^ flag.mask());
    }

    /// Set or clear a flag from a boolean.
    #[inline]
    pub fn assign(&mut self, flag: Flag, value: bool) {
        if value {
            self.set(flag);
        } else {
            self.clear(flag);
        }
    }

    /// The packed byte, as pushed for PUSH PSW.
    #[inline]
    pub fn as_byte(&self) -> u8 {
        self.bits.get()
    }

    /// Restore all five flags from a packed byte (POP PSW).
    ///
    /// Bits above the documented five are discarded.
    #[inline]
    pub fn set_byte(&mut self, value: u8) {
        self.bits.set(value & Self::MASK);
    }

    /// The backing cell, for forming the PSW pairing with the accumulator.
    #[inline]
    pub fn cell(&mut self) -> &mut ByteCell {
        &mut self.bits
    }
}

impl fmt::Debug for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatusFlags(S={} Z={} A={} P={} C={})",
            u8::from(self.get(Flag::Sign)),
            u8::from(self.get(Flag::Zero)),
            u8::from(self.get(Flag::AuxCarry)),
            u8::from(self.get(Flag::Parity)),
            u8::from(self.get(Flag::Carry)),
        )
    }
}
