//! Mapper trait: PRG/CHR memory access, mirroring and IRQ line.

use crate::cartridge::mapper::Mirroring;

/// Trait for NES cartridge mappers. The CPU bus uses the PRG half ($4020–$FFFF), the PPU the
/// CHR half ($0000–$1FFF).
pub trait Mapper: Send {
    /// Read PRG RAM/ROM ($4020–$FFFF). Unmapped areas read as 0.
    fn prg_read(&self, addr: u16) -> u8;
    /// Write PRG RAM or a bank-select register.
    fn prg_write(&mut self, addr: u16, data: u8);
    /// Read a pattern table byte ($0000–$1FFF).
    fn chr_read(&self, addr: u16) -> u8;
    /// Write CHR RAM; ignored for CHR ROM.
    fn chr_write(&mut self, addr: u16, data: u8);
    /// Current nametable mirroring for the PPU.
    fn mirroring(&self) -> Mirroring;
    /// Clocked once per rendered scanline by the PPU (dot 260) for scanline counters.
    fn tick(&mut self) {}
    /// Clocked once per CPU cycle by the bus, for CPU-timed IRQ counters.
    fn cpu_tick(&mut self) {}
    /// Level of the cartridge IRQ line.
    fn irq_pending(&self) -> bool {
        false
    }
    /// Soft reset: bank registers back to their power-on state.
    fn reset(&mut self);
    /// Whole PRG ROM, for debuggers and disassembly.
    fn prg_rom(&self) -> &[u8];
}
