//! Binary storage primitives for the 8080.
//!
//! This module provides the units everything else is built from:
//! - `ByteCell`: a mutable 8-bit storage cell (registers, memory bytes)
//! - `Word16`: a 16-bit register owning two ByteCells (PC, SP)
//! - `PairView`: a borrowed 16-bit projection over two ByteCells (BC, DE, HL, PSW)

pub mod cell;
pub mod word;
pub mod arith;

pub use cell::ByteCell;
pub use word::{PairView, Word16};
