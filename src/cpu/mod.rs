//! The 8080 processor model.
//!
//! Split the way the hardware is: `flags` (condition register),
//! `registers` (register file), `memory` (flat storage), `decode`
//! (opcode to instruction), `execute` (the engine).

pub mod decode;
pub mod execute;
pub mod flags;
pub mod memory;
pub mod registers;

pub use decode::{decode, encode, DecodeError, Instruction, Pair, StackPair, Target};
pub use execute::{Cpu, CpuError, CpuState, InterruptLine};
pub use flags::{Flag, StatusFlags};
pub use memory::{Memory, MemoryError, DEFAULT_MEMORY_SIZE};
pub use registers::Registers;
