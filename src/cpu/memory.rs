//! Flat byte-addressable memory.
//!
//! Memory is an ordered sequence of `ByteCell`s. The stack is not a
//! separate structure; it is ordinary memory addressed through the
//! stack pointer. Addresses beyond the configured capacity are a
//! defect of the running program, surfaced as an error and never
//! wrapped (register arithmetic wraps, the memory array does not).

use crate::bits::{ByteCell, Word16};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default memory capacity in bytes.
pub const DEFAULT_MEMORY_SIZE: usize = 8096;

/// Flat fixed-capacity memory.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<ByteCell>,
}

impl Memory {
    /// Create a zeroed memory of the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_SIZE)
    }

    /// Create a zeroed memory of the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: vec![ByteCell::zero(); capacity],
        }
    }

    /// Number of addressable bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    fn index(&self, addr: u16) -> Result<usize, MemoryError> {
        let index = addr as usize;
        if index >= self.cells.len() {
            return Err(MemoryError::AddressOutOfRange {
                addr,
                capacity: self.cells.len(),
            });
        }
        Ok(index)
    }

    /// Read the byte at an absolute address.
    pub fn get(&self, addr: u16) -> Result<u8, MemoryError> {
        Ok(self.cells[self.index(addr)?].get())
    }

    /// Write the byte at an absolute address.
    pub fn set(&mut self, addr: u16, value: u8) -> Result<(), MemoryError> {
        let index = self.index(addr)?;
        self.cells[index].set(value);
        Ok(())
    }

    /// Read the byte addressed by a 16-bit register (indirect access).
    pub fn get_at(&self, reg: &Word16) -> Result<u8, MemoryError> {
        self.get(reg.get())
    }

    /// Write the byte addressed by a 16-bit register (indirect access).
    pub fn set_at(&mut self, reg: &Word16, value: u8) -> Result<(), MemoryError> {
        self.set(reg.get(), value)
    }

    /// A mutable handle to the cell at an absolute address.
    ///
    /// This is what lets memory-through-HL stand in for a plain
    /// register in the single-register operand resolver.
    pub fn cell_mut(&mut self, addr: u16) -> Result<&mut ByteCell, MemoryError> {
        let index = self.index(addr)?;
        Ok(&mut self.cells[index])
    }

    /// A mutable handle to the cell addressed by a register plus offset.
    ///
    /// The offset wraps in 16-bit address arithmetic before the bounds
    /// check, matching how the stack pointer walks memory.
    pub fn cell_at_mut(
        &mut self,
        reg: &Word16,
        offset: u16,
    ) -> Result<&mut ByteCell, MemoryError> {
        self.cell_mut(reg.get().wrapping_add(offset))
    }

    /// Reset every byte to zero.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.set(0);
        }
    }

    /// Copy a program image into memory starting at the given origin.
    pub fn load_program(&mut self, origin: u16, program: &[u8]) -> Result<(), MemoryError> {
        let start = origin as usize;
        if start + program.len() > self.cells.len() {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: self.cells.len().saturating_sub(start),
            });
        }

        for (i, &byte) in program.iter().enumerate() {
            self.cells[start + i].set(byte);
        }

        Ok(())
    }

    /// Dump a region of memory (for diagnostics).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let end = (start + count).min(self.cells.len());
        (start..end).map(|i| (i, self.cells[i].get())).collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let non_zero = self.cells.iter().filter(|cell| cell.get() != 0).count();
        f.debug_struct("Memory")
            .field("non_zero_bytes", &non_zero)
            .field("capacity", &self.cells.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory address 0x{addr:04X} out of range (capacity {capacity})")]
    AddressOutOfRange { addr: u16, capacity: usize },

    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
