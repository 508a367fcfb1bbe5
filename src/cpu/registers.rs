//! The 8080 register file.
//!
//! - A: 8-bit accumulator
//! - B, C, D, E, H, L: general registers, pairable as BC, DE, HL
//! - IR: instruction register (last fetched opcode)
//! - PC, SP: dedicated 16-bit registers with unit wraparound
//! - StatusFlags: the 5-bit condition register
//!
//! Register pairs are projections over the byte cells, not separate
//! storage: writing through a pair view writes the cells themselves.

use crate::bits::{ByteCell, PairView, Word16};
use crate::cpu::flags::StatusFlags;
use serde::{Deserialize, Serialize};

/// The complete register file, zero-initialized at construction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Registers {
    /// Last fetched opcode.
    pub ir: ByteCell,
    /// Accumulator.
    pub a: ByteCell,
    pub b: ByteCell,
    pub c: ByteCell,
    pub d: ByteCell,
    pub e: ByteCell,
    pub h: ByteCell,
    pub l: ByteCell,
    /// Condition register.
    pub flags: StatusFlags,
    /// Program counter.
    pub pc: Word16,
    /// Stack pointer.
    pub sp: Word16,
}

impl Registers {
    /// Create a register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The 16-bit value of the B/C pair.
    #[inline]
    pub fn bc(&self) -> u16 {
        ((self.b.get() as u16) << 8) | self.c.get() as u16
    }

    /// The 16-bit value of the D/E pair.
    #[inline]
    pub fn de(&self) -> u16 {
        ((self.d.get() as u16) << 8) | self.e.get() as u16
    }

    /// The 16-bit value of the H/L pair.
    #[inline]
    pub fn hl(&self) -> u16 {
        ((self.h.get() as u16) << 8) | self.l.get() as u16
    }

    /// Writable projection over B (high) and C (low).
    pub fn bc_mut(&mut self) -> PairView<'_> {
        PairView::new(&mut self.b, &mut self.c)
    }

    /// Writable projection over D (high) and E (low).
    pub fn de_mut(&mut self) -> PairView<'_> {
        PairView::new(&mut self.d, &mut self.e)
    }

    /// Writable projection over H (high) and L (low).
    pub fn hl_mut(&mut self) -> PairView<'_> {
        PairView::new(&mut self.h, &mut self.l)
    }

    /// Writable projection over the PSW pairing: flags high, accumulator low.
    ///
    /// Aliases the same cells the flags register and accumulator use;
    /// mutating the view mutates both halves immediately. Restores that
    /// must respect the 5-bit flag invariant go through
    /// [`StatusFlags::set_byte`] instead.
    pub fn psw_mut(&mut self) -> PairView<'_> {
        PairView::new(self.flags.cell(), &mut self.a)
    }

    /// The PSW as (flags byte, accumulator), in push order.
    #[inline]
    pub fn psw(&self) -> (u8, u8) {
        (self.flags.as_byte(), self.a.get())
    }
}
