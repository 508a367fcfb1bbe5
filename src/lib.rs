//! # i8080 Emulator
//!
//! An instruction-level emulator of the Intel 8080's documented
//! instruction subset: I/O, interrupt control, machine control,
//! carry-bit, single-register and register-pair operations.
//!
//! The machine is a [`Cpu`] holding a register file, flat memory, and
//! a pluggable device bus. Interrupts arrive over a cloneable
//! [`InterruptLine`] handle from any thread; a halted machine parks
//! until one is signaled.

pub mod bits;
pub mod bus;
pub mod cpu;

// Re-export commonly used types
pub use bits::{ByteCell, PairView, Word16};
pub use bus::{BusLeds, NullBus, PortBus};
pub use cpu::{
    Cpu, CpuError, CpuState, Flag, Instruction, InterruptLine, Memory, Registers, StatusFlags,
};
