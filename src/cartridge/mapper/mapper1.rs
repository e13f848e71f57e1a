//! Mapper 1 (MMC1): bank switching via 5-bit shift register.
//!
//! [MMC1](https://www.nesdev.org/wiki/MMC1): writes to $8000–$9FFF (control), $A000–$BFFF (CHR0),
//! $C000–$DFFF (CHR1), $E000–$FFFF (PRG bank). Any write with bit 7 set resets the shift register.
//! Otherwise, bit 0 is shifted in (LSB first); on the fifth write the value is latched into the
//! register selected by address bits 13–14. Control (bits 0–1) = mirroring; bits 2–3 = PRG mode;
//! bit 4 = CHR mode. On 512 KiB boards (SUROM) CHR0 bit 4 selects the 256 KiB PRG half.

use tracing::debug;

use crate::cartridge::cartridge::Cartridge;
use crate::cartridge::mapper::{Mirroring, bank_index, mapper::Mapper, prg_ram};

/// Shift register value after reset: the marker bit reaches bit 0 after four more writes.
const SHIFT_RESET: u8 = 0b1_0000;

/// MMC1 state: 5-bit shift register, control byte (mirroring + PRG/CHR mode), bank selects.
pub struct Mmc1 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Vec<u8>,
    shift: u8,
    control: u8,
    chr_bank0: u8,
    chr_bank1: u8,
    /// Bits 0–3 select the 16 KiB bank, bit 4 disables PRG RAM.
    prg_bank: u8,
}

impl Mmc1 {
    /// Control powers up as $0C (PRG mode 3: $8000 switchable, $C000 fixed last).
    pub fn new(cart: &Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom.clone(),
            chr: cart.chr.clone(),
            chr_is_ram: cart.chr_is_ram,
            prg_ram: prg_ram(cart),
            shift: SHIFT_RESET,
            control: 0x0C,
            chr_bank0: 0,
            chr_bank1: 0,
            prg_bank: 0,
        }
    }

    /// PRG bank mode from control bits 2–3: 0/1 = 32 KiB; 2 = $8000 fixed first; 3 = $C000 fixed last.
    fn prg_bank_mode(&self) -> u8 {
        (self.control >> 2) & 0b11
    }

    fn prg_ram_enabled(&self) -> bool {
        self.prg_bank & 0x10 == 0
    }

    /// 16 KiB bank index visible at `addr` ($8000–$FFFF).
    fn prg_bank_at(&self, addr: u16) -> usize {
        let outer = if self.prg_rom.len() > 256 * 1024 {
            (self.chr_bank0 & 0x10) as usize
        } else {
            0
        };
        let bank = (self.prg_bank & 0x0F) as usize;
        let high = addr >= 0xC000;
        let inner = match (self.prg_bank_mode(), high) {
            (0 | 1, false) => bank & !1,
            (0 | 1, true) => bank | 1,
            (2, false) => 0,
            (2, true) => bank,
            (_, false) => bank,
            (_, true) => 0x0F,
        };
        outer + inner
    }

    /// 4 KiB CHR bank index visible at `addr` ($0000–$1FFF).
    fn chr_bank_at(&self, addr: u16) -> usize {
        let upper = addr >= 0x1000;
        if self.control & 0x10 == 0 {
            let base = (self.chr_bank0 & 0x1E) as usize;
            if upper { base | 1 } else { base }
        } else if upper {
            self.chr_bank1 as usize
        } else {
            self.chr_bank0 as usize
        }
    }

    fn chr_index(&self, addr: u16) -> usize {
        bank_index(self.chr_bank_at(addr), 0x1000, addr, self.chr.len())
    }

    fn latch(&mut self, addr: u16, value: u8) {
        match (addr >> 13) & 0b11 {
            0 => self.control = value,
            1 => self.chr_bank0 = value,
            2 => self.chr_bank1 = value,
            _ => self.prg_bank = value,
        }
        debug!(
            "MMC1 ${addr:04X} <- ${value:02X} (control ${:02X} chr ${:02X}/${:02X} prg ${:02X})",
            self.control, self.chr_bank0, self.chr_bank1, self.prg_bank
        );
    }
}

impl Mapper for Mmc1 {
    fn prg_read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled() => self.prg_ram[(addr - 0x6000) as usize],
            0x8000..=0xFFFF => {
                let index = bank_index(self.prg_bank_at(addr), 0x4000, addr, self.prg_rom.len());
                self.prg_rom[index]
            }
            _ => 0,
        }
    }

    fn prg_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled() {
                    self.prg_ram[(addr - 0x6000) as usize] = data;
                }
            }
            0x8000..=0xFFFF => {
                if data & 0x80 != 0 {
                    self.shift = SHIFT_RESET;
                    self.control |= 0x0C;
                    return;
                }
                let complete = self.shift & 1 != 0;
                self.shift = (self.shift >> 1) | ((data & 1) << 4);
                if complete {
                    let value = self.shift;
                    self.shift = SHIFT_RESET;
                    self.latch(addr, value);
                }
            }
            _ => {}
        }
    }

    fn chr_read(&self, addr: u16) -> u8 {
        self.chr[self.chr_index(addr)]
    }

    fn chr_write(&mut self, addr: u16, data: u8) {
        if self.chr_is_ram {
            let index = self.chr_index(addr);
            self.chr[index] = data;
        }
    }

    /// Mirroring from control bits 0–1: 0 = one-screen lower, 1 = one-screen upper, 2 = vertical, 3 = horizontal.
    fn mirroring(&self) -> Mirroring {
        match self.control & 0b11 {
            0 => Mirroring::OneScreenLower,
            1 => Mirroring::OneScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn reset(&mut self) {
        self.shift = SHIFT_RESET;
        self.control = 0x0C;
        self.chr_bank0 = 0;
        self.chr_bank1 = 0;
        self.prg_bank = 0;
    }

    fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }
}
