//! Ricoh 2A03 CPU core (6502 without decimal mode).
//!
//! Dispatch goes through the 256-entry [`opcodes::INSTRUCTIONS`] table; documented and
//! undocumented opcodes are both implemented. Memory and I/O go through [`crate::bus::Bus`].

#[allow(clippy::module_inception)]
pub mod cpu;
pub mod disasm;
pub mod flags;
pub mod opcodes;

pub use cpu::{CPU, Interrupt};
pub use flags::Status;

#[cfg(test)]
mod tests;
