//! Kestrel: an NES (Nintendo Entertainment System) emulator core.
//!
//! Implements the NES chipset as documented on the
//! [NESdev Wiki](https://www.nesdev.org/wiki/NES_reference_guide): Ricoh 2A03 (CPU+APU),
//! 2C02 PPU, cartridge mappers, and controller I/O. The core never touches a window, an audio
//! device or a log subscriber; hosts plug those in through [`console::Console`].
//!
//! ## Modules (NESdev references)
//!
//! - **apu** – [APU](https://www.nesdev.org/wiki/APU): pulse×2, triangle, noise, DMC, frame
//!   counter, [APU Mixer](https://www.nesdev.org/wiki/APU_Mixer), [`apu::Player`] sink
//! - **bus** – [CPU memory map](https://www.nesdev.org/wiki/CPU_memory_map): RAM, PPU, APU,
//!   controllers, mapper; OAM/DMC DMA; 3 PPU cycles per CPU cycle
//! - **cartridge** – [iNES](https://www.nesdev.org/wiki/INES) / [NES 2.0](https://www.nesdev.org/wiki/NES_2.0)
//!   loading; [mappers](https://www.nesdev.org/wiki/Mapper) 0, 1, 2, 3, 4, 21, 22, 23, 25
//! - **config** – injected runtime configuration
//! - **console** – the run loop, interrupt dispatch, pacing, and a cross-thread handle
//! - **controller** – [Controller reading](https://www.nesdev.org/wiki/Controller_reading): $4016 latch, shift-out
//! - **cpu** – [6502](https://www.nesdev.org/wiki/CPU) / 2A03: full + undocumented opcodes, [NMI](https://www.nesdev.org/wiki/NMI)
//! - **debugger** – breakpoint hook consulted before every instruction
//! - **error** – crate-wide [`error::NesError`]
//! - **ppu** – [PPU](https://www.nesdev.org/wiki/PPU), [PPU registers](https://www.nesdev.org/wiki/PPU_registers), OAM, nametables, 256×240

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod config;
pub mod console;
pub mod controller;
pub mod cpu;
pub mod debugger;
pub mod error;
pub mod ppu;

pub use cartridge::cartridge::Cartridge;
pub use config::Config;
pub use console::{Console, ConsoleHandle};
pub use error::{NesError, Result};
