//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle, the stack protocol, and
//! all instruction behaviors of the documented subset, plus the
//! halt/interrupt handoff.

use crate::bits::{arith, ByteCell};
use crate::bus::{BusLeds, NullBus, PortBus};
use crate::cpu::decode::{self, DecodeError, Instruction, Pair, StackPair, Target};
use crate::cpu::flags::Flag;
use crate::cpu::memory::MemoryError;
use crate::cpu::{Memory, Registers};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Executing instructions.
    Running,
    /// Stopped by HLT; waiting for an interrupt.
    Halted,
}

/// Cross-thread interrupt delivery.
///
/// A cloneable handle shared between the CPU and any signaling thread.
/// It carries the interrupt-enable flip-flop (EI/DI) and a wake
/// condition the CPU parks on while halted. Delivery is level-style:
/// a signal arriving before the CPU parks is not lost.
#[derive(Clone)]
pub struct InterruptLine {
    shared: Arc<LineShared>,
}

struct LineShared {
    enabled: AtomicBool,
    pending: Mutex<bool>,
    wake: Condvar,
}

impl InterruptLine {
    fn new() -> Self {
        Self {
            shared: Arc::new(LineShared {
                enabled: AtomicBool::new(false),
                pending: Mutex::new(false),
                wake: Condvar::new(),
            }),
        }
    }

    /// Whether the interrupt flip-flop is set (EI executed last).
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Signal an interrupt from any thread.
    ///
    /// Ignored while interrupts are disabled; returns whether the
    /// signal was accepted.
    pub fn signal(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut pending = self.shared.pending.lock();
        *pending = true;
        self.shared.wake.notify_one();
        true
    }

    /// Block until a signal arrives, consuming it.
    pub(crate) fn wait(&self) {
        let mut pending = self.shared.pending.lock();
        while !*pending {
            self.shared.wake.wait(&mut pending);
        }
        *pending = false;
    }

    /// Block until a signal arrives or the timeout elapses.
    ///
    /// Host-integration hook; returns whether a signal was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut pending = self.shared.pending.lock();
        if !*pending && self.shared.wake.wait_for(&mut pending, timeout).timed_out() {
            return false;
        }
        let delivered = *pending;
        *pending = false;
        delivered
    }
}

impl std::fmt::Debug for InterruptLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptLine")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// The 8080 machine: registers, flags, memory, and the engine.
pub struct Cpu {
    /// Register file (accumulator, B-L, flags, PC, SP, instruction register).
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instructions executed so far.
    pub cycles: u64,
    int: InterruptLine,
    bus: Box<dyn PortBus + Send>,
    leds: BusLeds,
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a machine with zeroed registers and default-size memory.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            int: InterruptLine::new(),
            bus: Box::new(NullBus),
            leds: BusLeds::empty(),
            last_instr: None,
        }
    }

    /// Create a machine with a specific memory capacity.
    pub fn with_memory_size(capacity: usize) -> Self {
        let mut cpu = Self::new();
        cpu.mem = Memory::with_capacity(capacity);
        cpu
    }

    /// Attach a device bus behind the IN/OUT ports.
    pub fn set_bus(&mut self, bus: Box<dyn PortBus + Send>) {
        self.bus = bus;
    }

    /// Reset to power-on state. The attached bus is kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.int.set_enabled(false);
        self.leds = BusLeds::empty();
        self.last_instr = None;
    }

    /// Write a program image into memory at the given origin.
    pub fn load_program(&mut self, origin: u16, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(origin, program)
    }

    /// A handle for delivering interrupts from other threads.
    pub fn interrupt_line(&self) -> InterruptLine {
        self.int.clone()
    }

    /// Signal an interrupt on this machine's line.
    pub fn signal_interrupt(&self) -> bool {
        self.int.signal()
    }

    /// Whether the interrupt flip-flop is set.
    pub fn interrupts_enabled(&self) -> bool {
        self.int.is_enabled()
    }

    /// The bus-state indicators as of the last executed instruction.
    pub fn leds(&self) -> BusLeds {
        self.leds
    }

    /// The last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// Execute exactly one instruction.
    ///
    /// If the machine is halted, this blocks until an interrupt is
    /// signaled, then resumes at the next sequential instruction.
    /// Returns the instruction that was executed.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        let mut acknowledged = false;
        if self.state == CpuState::Halted {
            self.int.wait();
            self.state = CpuState::Running;
            acknowledged = true;
        }

        // Fetch
        self.leds = BusLeds::MEMR | BusLeds::M1;
        if acknowledged {
            self.leds.insert(BusLeds::INT);
        }
        let opcode = self.mem.get_at(&self.regs.pc)?;
        self.regs.ir.set(opcode);

        // Decode
        let instr = decode::decode(opcode);

        // Execute
        self.execute(instr)?;

        // HLT and RST manage the program counter themselves.
        if !matches!(instr, Instruction::Halt | Instruction::Restart { .. }) {
            self.regs.pc.advance();
        }

        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run until halt.
    ///
    /// On an already-halted machine this waits for an interrupt, then
    /// runs until the next halt. Returns the number of instructions
    /// executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        loop {
            self.step()?;
            if self.state != CpuState::Running {
                break;
            }
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions or until halt.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            // ==================== I/O ====================
            Instruction::Input => {
                self.regs.pc.advance();
                let port = self.mem.get_at(&self.regs.pc)?;
                let value = self.bus.input(port);
                self.regs.a.set(value);
                self.leds.insert(BusLeds::INP);
            }

            Instruction::Output => {
                self.regs.pc.advance();
                let port = self.mem.get_at(&self.regs.pc)?;
                self.bus.output(port, self.regs.a.get());
                self.leds.insert(BusLeds::OUT | BusLeds::WO);
            }

            // ==================== Interrupt control ====================
            Instruction::EnableInterrupts => {
                self.int.set_enabled(true);
            }

            Instruction::DisableInterrupts => {
                self.int.set_enabled(false);
            }

            // ==================== Machine control ====================
            Instruction::Halt => {
                self.regs.pc.advance();
                self.state = CpuState::Halted;
                self.leds.insert(BusLeds::HLTA);
            }

            Instruction::Restart { vector } => {
                let (high, low) = (self.regs.pc.get_high(), self.regs.pc.get_low());
                self.stack_push(high, low)?;
                self.regs.pc.set(u16::from(vector) * 8);
                self.leds.insert(BusLeds::STACK | BusLeds::WO);
            }

            Instruction::Nop => {}

            // ==================== Carry bit ====================
            Instruction::ComplementCarry => {
                self.regs.flags.toggle(Flag::Carry);
            }

            Instruction::SetCarry => {
                self.regs.flags.set(Flag::Carry);
            }

            // ==================== Single register ====================
            Instruction::Increment { target } => {
                let (value, half_carry) = {
                    let cell = self.target_cell_mut(target)?;
                    let (next, half_carry) = arith::increment(cell.get());
                    cell.set(next);
                    (next, half_carry)
                };
                self.regs.flags.assign(Flag::AuxCarry, half_carry);
                self.refresh_status(value);
                if target == Target::Memory {
                    self.leds.insert(BusLeds::WO);
                }
            }

            Instruction::Decrement { target } => {
                let (value, half_borrow) = {
                    let cell = self.target_cell_mut(target)?;
                    let (next, half_borrow) = arith::decrement(cell.get());
                    cell.set(next);
                    (next, half_borrow)
                };
                self.regs.flags.assign(Flag::AuxCarry, half_borrow);
                self.refresh_status(value);
                if target == Target::Memory {
                    self.leds.insert(BusLeds::WO);
                }
            }

            Instruction::ComplementAccumulator => {
                self.regs.a.complement();
            }

            Instruction::DecimalAdjust => {
                self.decimal_adjust();
            }

            // ==================== Register pair ====================
            Instruction::Push { pair } => {
                let (high, low) = match pair {
                    StackPair::BC => (self.regs.b.get(), self.regs.c.get()),
                    StackPair::DE => (self.regs.d.get(), self.regs.e.get()),
                    StackPair::HL => (self.regs.h.get(), self.regs.l.get()),
                    StackPair::Psw => self.regs.psw(),
                };
                self.stack_push(high, low)?;
                self.leds.insert(BusLeds::STACK | BusLeds::WO);
            }

            Instruction::Pop { pair } => {
                let (high, low) = self.stack_pop()?;
                match pair {
                    StackPair::BC => {
                        self.regs.b.set(high);
                        self.regs.c.set(low);
                    }
                    StackPair::DE => {
                        self.regs.d.set(high);
                        self.regs.e.set(low);
                    }
                    StackPair::HL => {
                        self.regs.h.set(high);
                        self.regs.l.set(low);
                    }
                    // The flag restore is masked to the documented bits.
                    StackPair::Psw => {
                        self.regs.flags.set_byte(high);
                        self.regs.a.set(low);
                    }
                }
                self.leds.insert(BusLeds::STACK);
            }

            Instruction::DoubleAdd { pair } => {
                let operand = self.pair_value(pair);
                let sum = u32::from(self.regs.hl()) + u32::from(operand);
                self.regs.flags.assign(Flag::Carry, sum > 0xFFFF);
                self.regs.hl_mut().set((sum & 0xFFFF) as u16);
            }

            Instruction::IncrementPair { pair } => {
                self.pair_view_mut(pair).advance();
            }

            Instruction::DecrementPair { pair } => {
                self.pair_view_mut(pair).rewind();
            }

            Instruction::ExchangePairs => {
                let hl = self.regs.hl();
                let de = self.regs.de();
                self.regs.hl_mut().set(de);
                self.regs.de_mut().set(hl);
            }

            Instruction::ExchangeStackTop => {
                let sp = self.regs.sp.get();
                {
                    let cell = self.mem.cell_mut(sp)?;
                    let saved = cell.get();
                    cell.set(self.regs.l.get());
                    self.regs.l.set(saved);
                }
                {
                    let cell = self.mem.cell_mut(sp.wrapping_add(1))?;
                    let saved = cell.get();
                    cell.set(self.regs.h.get());
                    self.regs.h.set(saved);
                }
                self.leds.insert(BusLeds::STACK | BusLeds::WO);
            }

            Instruction::LoadStackPointer => {
                self.regs.sp.set(self.regs.hl());
            }
        }

        Ok(())
    }

    /// Resolve a single-register operand to its backing byte cell.
    ///
    /// Selector `Memory` resolves through the H/L pair, so register
    /// and memory targets read and write identically.
    fn target_cell_mut(&mut self, target: Target) -> Result<&mut ByteCell, CpuError> {
        Ok(match target {
            Target::B => &mut self.regs.b,
            Target::C => &mut self.regs.c,
            Target::D => &mut self.regs.d,
            Target::E => &mut self.regs.e,
            Target::H => &mut self.regs.h,
            Target::L => &mut self.regs.l,
            Target::Memory => {
                let addr = self.regs.hl();
                self.mem.cell_mut(addr)?
            }
            Target::A => &mut self.regs.a,
        })
    }

    fn pair_value(&self, pair: Pair) -> u16 {
        match pair {
            Pair::BC => self.regs.bc(),
            Pair::DE => self.regs.de(),
            Pair::HL => self.regs.hl(),
        }
    }

    fn pair_view_mut(&mut self, pair: Pair) -> crate::bits::PairView<'_> {
        match pair {
            Pair::BC => self.regs.bc_mut(),
            Pair::DE => self.regs.de_mut(),
            Pair::HL => self.regs.hl_mut(),
        }
    }

    /// Refresh Sign, Zero and Parity from a result byte.
    ///
    /// Carry and Aux-Carry belong to the specific operation and are
    /// never touched here.
    fn refresh_status(&mut self, value: u8) {
        self.regs.flags.assign(Flag::Sign, value & 0x80 != 0);
        self.regs.flags.assign(Flag::Zero, value == 0);
        self.regs.flags.assign(Flag::Parity, arith::parity(value));
    }

    /// DAA: adjust the accumulator into packed BCD, one nibble at a time.
    ///
    /// Each carry flag is assigned from the carry that actually came
    /// out of its nibble addition.
    fn decimal_adjust(&mut self) {
        let (mut msn, mut lsn) = arith::split_nibbles(self.regs.a.get());

        if lsn > 9 || self.regs.flags.get(Flag::AuxCarry) {
            lsn += 6;
            self.regs.flags.assign(Flag::AuxCarry, lsn > 0x0F);
            lsn &= 0x0F;
        }
        if msn > 9 || self.regs.flags.get(Flag::Carry) {
            msn += 6;
            self.regs.flags.assign(Flag::Carry, msn > 0x0F);
            msn &= 0x0F;
        }

        let value = arith::join_nibbles(msn, lsn);
        self.regs.a.set(value);
        self.refresh_status(value);
    }

    /// Push a (high, low) byte pair.
    ///
    /// The pointer walks downward writing high then low, so the high
    /// byte lands at the higher of the two addresses.
    fn stack_push(&mut self, high: u8, low: u8) -> Result<(), CpuError> {
        self.regs.sp.rewind();
        self.mem.set_at(&self.regs.sp, high)?;
        self.regs.sp.rewind();
        self.mem.set_at(&self.regs.sp, low)?;
        Ok(())
    }

    /// Pop a (high, low) byte pair; the exact inverse of `stack_push`.
    fn stack_pop(&mut self) -> Result<(u8, u8), CpuError> {
        let low = self.mem.get_at(&self.regs.sp)?;
        self.regs.sp.advance();
        let high = self.mem.get_at(&self.regs.sp)?;
        self.regs.sp.advance();
        Ok((high, low))
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("leds", &self.leds)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn make_program(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().map(encode).collect()
    }

    fn cpu_with(program: &[u8]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(0, program).unwrap();
        cpu
    }

    #[test]
    fn test_nop_advances_pc() {
        let mut cpu = cpu_with(&[0x00]);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc.get(), 1);
        assert_eq!(cpu.cycles, 1);
    }

    #[test]
    fn test_halt_advances_pc_then_stops() {
        let mut cpu = cpu_with(&make_program(&[Instruction::Nop, Instruction::Halt]));
        let executed = cpu.run().unwrap();

        assert_eq!(executed, 2);
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.pc.get(), 2);
        assert!(cpu.leds().contains(BusLeds::HLTA));
    }

    #[test]
    fn test_increment_register_wraps_and_sets_flags() {
        // The end-to-end scenario: INR B with B=0xFF
        let mut cpu = cpu_with(&[0x04]);
        cpu.regs.b.set(0xFF);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.b.get(), 0x00);
        assert!(cpu.regs.flags.get(Flag::Zero));
        assert!(!cpu.regs.flags.get(Flag::Sign));
        assert!(cpu.regs.flags.get(Flag::Parity));
        assert_eq!(cpu.regs.pc.get(), 1);
    }

    #[test]
    fn test_increment_aux_carry_at_nibble_nine() {
        let mut cpu = cpu_with(&[0x04]);
        cpu.regs.b.set(0x09);
        cpu.step().unwrap();

        assert_eq!(cpu.regs.b.get(), 0x0A);
        assert!(cpu.regs.flags.get(Flag::AuxCarry));
    }

    #[test]
    fn test_decrement_wraps_and_sets_sign() {
        // DCR C with C=0x00
        let mut cpu = cpu_with(&[0x0D]);
        cpu.step().unwrap();

        assert_eq!(cpu.regs.c.get(), 0xFF);
        assert!(cpu.regs.flags.get(Flag::Sign));
        assert!(cpu.regs.flags.get(Flag::AuxCarry));
        assert!(!cpu.regs.flags.get(Flag::Zero));
    }

    #[test]
    fn test_increment_memory_through_hl() {
        // INR M with HL pointing past the program
        let mut cpu = cpu_with(&[0x34]);
        cpu.regs.hl_mut().set(0x0040);
        cpu.mem.set(0x0040, 0x7F).unwrap();

        cpu.step().unwrap();

        assert_eq!(cpu.mem.get(0x0040).unwrap(), 0x80);
        assert!(cpu.regs.flags.get(Flag::Sign));
        assert!(cpu.leds().contains(BusLeds::WO));
    }

    #[test]
    fn test_increment_memory_out_of_range_is_error() {
        let mut cpu = cpu_with(&[0x34]);
        cpu.regs.hl_mut().set(0xFFFF);

        assert!(matches!(
            cpu.step(),
            Err(CpuError::Memory(MemoryError::AddressOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_complement_accumulator() {
        let mut cpu = cpu_with(&[0x2F]);
        cpu.regs.a.set(0b0101_0001);
        let carry_before = cpu.regs.flags.get(Flag::Carry);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.a.get(), 0b1010_1110);
        assert_eq!(cpu.regs.flags.get(Flag::Carry), carry_before);
    }

    #[test]
    fn test_carry_bit_instructions() {
        // STC; CMC
        let mut cpu = cpu_with(&[0x37, 0x3F]);

        cpu.step().unwrap();
        assert!(cpu.regs.flags.get(Flag::Carry));

        cpu.step().unwrap();
        assert!(!cpu.regs.flags.get(Flag::Carry));
    }

    #[test]
    fn test_decimal_adjust_high_nibble_carry() {
        // A=0xA4: low nibble stays, high nibble overflows into Carry
        let mut cpu = cpu_with(&[0x27]);
        cpu.regs.a.set(0xA4);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.a.get(), 0x04);
        assert!(cpu.regs.flags.get(Flag::Carry));
        assert!(!cpu.regs.flags.get(Flag::AuxCarry));
    }

    #[test]
    fn test_decimal_adjust_low_nibble() {
        // A=0x0B: low nibble adjusts without carrying out
        let mut cpu = cpu_with(&[0x27]);
        cpu.regs.a.set(0x0B);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.a.get(), 0x11);
        assert!(cpu.regs.flags.get(Flag::AuxCarry));
        assert!(!cpu.regs.flags.get(Flag::Carry));
    }

    #[test]
    fn test_push_layout_and_pop_roundtrip() {
        // PUSH BC; POP DE
        let mut cpu = cpu_with(&[0xC5, 0xD1]);
        cpu.regs.sp.set(0x0100);
        cpu.regs.bc_mut().set(0x1234);

        cpu.step().unwrap();
        assert_eq!(cpu.regs.sp.get(), 0x00FE);
        // Low byte at the lower address, high byte above it
        assert_eq!(cpu.mem.get(0x00FE).unwrap(), 0x34);
        assert_eq!(cpu.mem.get(0x00FF).unwrap(), 0x12);
        assert!(cpu.leds().contains(BusLeds::STACK));

        cpu.step().unwrap();
        assert_eq!(cpu.regs.de(), 0x1234);
        assert_eq!(cpu.regs.sp.get(), 0x0100);
    }

    #[test]
    fn test_push_pop_psw() {
        // PUSH PSW; POP PSW restores flags and accumulator
        let mut cpu = cpu_with(&[0xF5, 0xF1]);
        cpu.regs.sp.set(0x0100);
        cpu.regs.a.set(0x42);
        cpu.regs.flags.set(Flag::Carry);
        cpu.regs.flags.set(Flag::Zero);

        cpu.step().unwrap();
        let saved_flags = cpu.regs.flags.as_byte();
        cpu.regs.a.set(0);
        cpu.regs.flags.set_byte(0);

        cpu.step().unwrap();
        assert_eq!(cpu.regs.a.get(), 0x42);
        assert_eq!(cpu.regs.flags.as_byte(), saved_flags);
    }

    #[test]
    fn test_pop_psw_masks_undocumented_bits() {
        // POP PSW from a hand-built stack frame with junk high bits
        let mut cpu = cpu_with(&[0xF1]);
        cpu.regs.sp.set(0x0100);
        cpu.mem.set(0x0100, 0x99).unwrap(); // accumulator
        cpu.mem.set(0x0101, 0xFF).unwrap(); // flags byte with junk

        cpu.step().unwrap();

        assert_eq!(cpu.regs.a.get(), 0x99);
        assert_eq!(cpu.regs.flags.as_byte(), 0x1F);
    }

    #[test]
    fn test_double_add() {
        // DAD BC: 0x00FF + 0x0001, no carry
        let mut cpu = cpu_with(&[0x09]);
        cpu.regs.hl_mut().set(0x00FF);
        cpu.regs.bc_mut().set(0x0001);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.hl(), 0x0100);
        assert!(!cpu.regs.flags.get(Flag::Carry));
    }

    #[test]
    fn test_double_add_carry() {
        // DAD BC: 0xFFFF + 0x0001 wraps with carry
        let mut cpu = cpu_with(&[0x09]);
        cpu.regs.hl_mut().set(0xFFFF);
        cpu.regs.bc_mut().set(0x0001);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.hl(), 0x0000);
        assert!(cpu.regs.flags.get(Flag::Carry));
    }

    #[test]
    fn test_double_add_leaves_other_flags() {
        let mut cpu = cpu_with(&[0x09]);
        cpu.regs.flags.set(Flag::Zero);
        cpu.regs.hl_mut().set(0x0001);
        cpu.regs.bc_mut().set(0x0001);

        cpu.step().unwrap();

        assert!(cpu.regs.flags.get(Flag::Zero));
        assert!(!cpu.regs.flags.get(Flag::Carry));
    }

    #[test]
    fn test_pair_increment_decrement_wrap() {
        // INX DE; DCX DE; DCX DE
        let mut cpu = cpu_with(&[0x13, 0x1B, 0x1B]);
        cpu.regs.de_mut().set(0xFFFF);

        cpu.step().unwrap();
        assert_eq!(cpu.regs.de(), 0x0000);

        cpu.step().unwrap();
        assert_eq!(cpu.regs.de(), 0xFFFF);

        cpu.step().unwrap();
        assert_eq!(cpu.regs.de(), 0xFFFE);
    }

    #[test]
    fn test_pair_stepping_touches_no_flags() {
        let mut cpu = cpu_with(&[0x03]);
        cpu.regs.bc_mut().set(0xFFFF);
        cpu.regs.flags.set(Flag::Carry);

        cpu.step().unwrap();

        assert!(cpu.regs.flags.get(Flag::Carry));
        assert!(!cpu.regs.flags.get(Flag::Zero));
    }

    #[test]
    fn test_exchange_pairs() {
        let mut cpu = cpu_with(&[0xEB]);
        cpu.regs.hl_mut().set(0x1234);
        cpu.regs.de_mut().set(0xABCD);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.hl(), 0xABCD);
        assert_eq!(cpu.regs.de(), 0x1234);
    }

    #[test]
    fn test_exchange_stack_top() {
        let mut cpu = cpu_with(&[0xE3]);
        cpu.regs.sp.set(0x0100);
        cpu.regs.hl_mut().set(0x0B3C);
        cpu.mem.set(0x0100, 0xF0).unwrap();
        cpu.mem.set(0x0101, 0x0D).unwrap();

        cpu.step().unwrap();

        assert_eq!(cpu.regs.hl(), 0x0DF0);
        assert_eq!(cpu.mem.get(0x0100).unwrap(), 0x3C);
        assert_eq!(cpu.mem.get(0x0101).unwrap(), 0x0B);
        assert_eq!(cpu.regs.sp.get(), 0x0100);
    }

    #[test]
    fn test_load_stack_pointer_from_hl() {
        let mut cpu = cpu_with(&[0xF9]);
        cpu.regs.hl_mut().set(0x1F9F);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.sp.get(), 0x1F9F);
        assert_eq!(cpu.regs.hl(), 0x1F9F);
    }

    #[test]
    fn test_restart_vectors_and_pushes_pc() {
        // RST 1 at address 0x0005
        let mut cpu = Cpu::new();
        cpu.mem.set(0x0005, 0xCF).unwrap();
        cpu.regs.pc.set(0x0005);
        cpu.regs.sp.set(0x0100);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.pc.get(), 8);
        assert_eq!(cpu.regs.sp.get(), 0x00FE);
        // The pre-restart program counter is on the stack
        assert_eq!(cpu.mem.get(0x00FE).unwrap(), 0x05);
        assert_eq!(cpu.mem.get(0x00FF).unwrap(), 0x00);
    }

    #[test]
    fn test_restart_zero() {
        let mut cpu = cpu_with(&[0xC7]);
        cpu.regs.sp.set(0x0100);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.pc.get(), 0);
    }

    #[test]
    fn test_instruction_register_holds_last_opcode() {
        let mut cpu = cpu_with(&[0x37]);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.ir.get(), 0x37);
        assert_eq!(cpu.last_instruction(), Some(Instruction::SetCarry));
    }

    #[test]
    fn test_unknown_opcode_is_noop() {
        // 0xC3 (JMP in the full set) is outside the documented subset
        let mut cpu = cpu_with(&[0xC3]);
        cpu.step().unwrap();

        assert_eq!(cpu.regs.pc.get(), 1);
        assert_eq!(cpu.regs.flags.as_byte(), 0);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_enable_disable_interrupts() {
        let mut cpu = cpu_with(&make_program(&[
            Instruction::EnableInterrupts,
            Instruction::DisableInterrupts,
        ]));
        assert!(!cpu.interrupts_enabled());

        cpu.step().unwrap();
        assert!(cpu.interrupts_enabled());

        cpu.step().unwrap();
        assert!(!cpu.interrupts_enabled());
    }

    #[test]
    fn test_signal_ignored_while_disabled() {
        let cpu = Cpu::new();
        assert!(!cpu.signal_interrupt());
    }

    #[derive(Clone, Default)]
    struct SharedBus {
        inputs: Arc<Mutex<Vec<u8>>>,
        outputs: Arc<Mutex<Vec<(u8, u8)>>>,
    }

    impl PortBus for SharedBus {
        fn input(&mut self, _port: u8) -> u8 {
            self.inputs.lock().pop().unwrap_or(0)
        }

        fn output(&mut self, port: u8, value: u8) {
            self.outputs.lock().push((port, value));
        }
    }

    #[test]
    fn test_input_consumes_port_byte() {
        // IN 0x10
        let mut cpu = cpu_with(&[0xDB, 0x10]);
        let bus = SharedBus::default();
        bus.inputs.lock().push(0x5A);
        cpu.set_bus(Box::new(bus));

        cpu.step().unwrap();

        assert_eq!(cpu.regs.a.get(), 0x5A);
        assert_eq!(cpu.regs.pc.get(), 2);
        assert!(cpu.leds().contains(BusLeds::INP));
    }

    #[test]
    fn test_output_sends_accumulator() {
        // OUT 0x22
        let mut cpu = cpu_with(&[0xD3, 0x22]);
        let bus = SharedBus::default();
        cpu.set_bus(Box::new(bus.clone()));
        cpu.regs.a.set(0x77);

        cpu.step().unwrap();

        assert_eq!(bus.outputs.lock().as_slice(), &[(0x22, 0x77)]);
        assert_eq!(cpu.regs.pc.get(), 2);
        assert!(cpu.leds().contains(BusLeds::OUT));
    }

    #[test]
    fn test_interrupt_wakes_halted_cpu() {
        // EI; HLT; INR B; HLT
        let mut cpu = cpu_with(&make_program(&[
            Instruction::EnableInterrupts,
            Instruction::Halt,
            Instruction::Increment { target: Target::B },
            Instruction::Halt,
        ]));
        let line = cpu.interrupt_line();

        cpu.run().unwrap();
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.pc.get(), 2);

        // Resume on another thread; the step blocks until the signal.
        let handle = std::thread::spawn(move || {
            cpu.run().unwrap();
            cpu
        });

        assert!(line.signal());
        let cpu = handle.join().unwrap();

        assert_eq!(cpu.regs.b.get(), 1);
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.pc.get(), 4);
    }

    #[test]
    fn test_signal_before_wait_is_not_lost() {
        let mut cpu = cpu_with(&make_program(&[
            Instruction::EnableInterrupts,
            Instruction::Halt,
            Instruction::Halt,
        ]));

        cpu.run().unwrap();
        assert!(cpu.is_halted());

        // Signal while nobody is waiting yet
        assert!(cpu.signal_interrupt());
        cpu.step().unwrap();

        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.pc.get(), 3);
        assert!(cpu.leds().contains(BusLeds::INT));
    }

    #[test]
    fn test_wait_timeout_expires_without_signal() {
        let cpu = Cpu::new();
        let line = cpu.interrupt_line();
        assert!(!line.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_reset() {
        let mut cpu = cpu_with(&make_program(&[
            Instruction::EnableInterrupts,
            Instruction::Halt,
        ]));
        cpu.run().unwrap();

        cpu.reset();

        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.regs.pc.get(), 0);
        assert!(!cpu.interrupts_enabled());
        assert_eq!(cpu.mem.get(0).unwrap(), 0);
    }

    proptest! {
        #[test]
        fn prop_push_pop_restores_value_and_sp(value: u16, sp in 0x0010u16..0x1F00) {
            // PUSH HL; POP BC
            let mut cpu = cpu_with(&[0xE5, 0xC1]);
            cpu.regs.sp.set(sp);
            cpu.regs.hl_mut().set(value);

            cpu.step().unwrap();
            prop_assert_eq!(cpu.regs.sp.get(), sp - 2);

            cpu.step().unwrap();
            prop_assert_eq!(cpu.regs.bc(), value);
            prop_assert_eq!(cpu.regs.sp.get(), sp);
        }

        #[test]
        fn prop_inr_dcr_are_inverse(start: u8) {
            // INR E; DCR E
            let mut cpu = cpu_with(&[0x1C, 0x1D]);
            cpu.regs.e.set(start);

            cpu.step().unwrap();
            prop_assert_eq!(cpu.regs.e.get(), start.wrapping_add(1));

            cpu.step().unwrap();
            prop_assert_eq!(cpu.regs.e.get(), start);
        }

        #[test]
        fn prop_refresh_status_matches_result(value: u8) {
            // INR A produces value+1; check the three refreshed flags
            let mut cpu = cpu_with(&[0x3C]);
            cpu.regs.a.set(value);
            cpu.step().unwrap();

            let result = value.wrapping_add(1);
            prop_assert_eq!(cpu.regs.flags.get(Flag::Sign), result & 0x80 != 0);
            prop_assert_eq!(cpu.regs.flags.get(Flag::Zero), result == 0);
            prop_assert_eq!(
                cpu.regs.flags.get(Flag::Parity),
                result.count_ones() % 2 == 0
            );
        }
    }
}
