//! External collaborators at the machine boundary.
//!
//! The core never simulates devices. IN/OUT reach a [`PortBus`]
//! implementation supplied by the host, and the front-panel bus-state
//! indicators are exported as a [`BusLeds`] bit set that nothing in
//! the core ever reads back.

use bitflags::bitflags;
use std::fmt;

/// The device bus behind the IN/OUT ports.
///
/// The core consumes the port number from the instruction stream and
/// delegates the actual transfer here.
pub trait PortBus {
    /// Read a byte from an input device.
    fn input(&mut self, port: u8) -> u8;

    /// Write a byte to an output device.
    fn output(&mut self, port: u8, value: u8);
}

/// A bus with nothing attached: reads float to zero, writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBus;

impl PortBus for NullBus {
    fn input(&mut self, _port: u8) -> u8 {
        0
    }

    fn output(&mut self, _port: u8, _value: u8) {}
}

bitflags! {
    /// The eight documented bus-state indicators.
    ///
    /// Refreshed once per executed instruction; purely informational.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BusLeds: u8 {
        /// The memory bus carries memory read data.
        const MEMR = 1 << 0;
        /// The address bus carries an input device address.
        const INP = 1 << 1;
        /// First machine cycle of an instruction.
        const M1 = 1 << 2;
        /// The address bus carries an output device address.
        const OUT = 1 << 3;
        /// A HALT instruction has been acknowledged.
        const HLTA = 1 << 4;
        /// The address bus holds the stack pointer's pushdown address.
        const STACK = 1 << 5;
        /// The current cycle is a write or output (read/input otherwise).
        const WO = 1 << 6;
        /// An interrupt request has been acknowledged.
        const INT = 1 << 7;
    }
}

impl fmt::Display for BusLeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}
