//! Mapper 4 (MMC3): bank switching, switchable mirroring, PRG RAM, scanline IRQ.
//!
//! [MMC3](https://www.nesdev.org/wiki/MMC3): Bank select at $8000–$9FFE (even), bank data at
//! $8001–$9FFF (odd). R0/R1 = 2 KiB CHR, R2–R5 = 1 KiB CHR, R6/R7 = 8 KiB PRG. Mirroring at
//! $A000–$BFFE (even), PRG RAM protect at $A001 (odd). IRQ latch $C000, reload $C001, disable
//! $E000, enable $E001. The IRQ counter is clocked once per rendered scanline through
//! [`Mapper::tick`], which the PPU calls at dot 260 in place of the A12 rising edge.

use tracing::debug;

use crate::cartridge::cartridge::Cartridge;
use crate::cartridge::mapper::{Mirroring, bank_index, mapper::Mapper, prg_ram};

/// MMC3 state: bank registers, mirroring, PRG RAM, IRQ counter/latch/enable.
pub struct Mmc3 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Vec<u8>,
    /// Bank select ($8000): bits 0–2 = register index, bit 6 = PRG mode, bit 7 = CHR A12 invert.
    bank_select: u8,
    /// R0–R5 CHR, R6–R7 PRG.
    regs: [u8; 8],
    mirroring: Mirroring,
    four_screen: bool,
    prg_ram_enabled: bool,
    prg_ram_write_protect: bool,
    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,
}

impl Mmc3 {
    pub fn new(cart: &Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom.clone(),
            chr: cart.chr.clone(),
            chr_is_ram: cart.chr_is_ram,
            prg_ram: prg_ram(cart),
            bank_select: 0,
            regs: [0, 2, 4, 5, 6, 7, 0, 1],
            mirroring: cart.mirroring,
            four_screen: cart.mirroring == Mirroring::FourScreen,
            prg_ram_enabled: true,
            prg_ram_write_protect: false,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
        }
    }

    /// 8 KiB PRG bank mapped at `addr` ($8000–$FFFF).
    fn prg_bank_at(&self, addr: u16) -> usize {
        let count = (self.prg_rom.len() / 0x2000).max(1);
        let last = count - 1;
        let second_last = count.saturating_sub(2);
        let swapped = self.bank_select & 0x40 != 0;
        let r6 = (self.regs[6] & 0x3F) as usize;
        let r7 = (self.regs[7] & 0x3F) as usize;
        match ((addr - 0x8000) >> 13, swapped) {
            (0, false) | (2, true) => r6,
            (0, true) | (2, false) => second_last,
            (1, _) => r7,
            _ => last,
        }
    }

    /// 1 KiB CHR bank mapped at `addr` ($0000–$1FFF).
    fn chr_bank_at(&self, addr: u16) -> usize {
        let mut slot = (addr >> 10) as usize & 7;
        if self.bank_select & 0x80 != 0 {
            slot ^= 4;
        }
        let bank = match slot {
            0 => self.regs[0] & 0xFE,
            1 => self.regs[0] | 0x01,
            2 => self.regs[1] & 0xFE,
            3 => self.regs[1] | 0x01,
            n => self.regs[n - 2],
        };
        bank as usize
    }

    fn chr_index(&self, addr: u16) -> usize {
        bank_index(self.chr_bank_at(addr), 0x400, addr, self.chr.len())
    }
}

impl Mapper for Mmc3 {
    fn prg_read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled => self.prg_ram[(addr - 0x6000) as usize],
            0x8000..=0xFFFF => {
                let index = bank_index(self.prg_bank_at(addr), 0x2000, addr, self.prg_rom.len());
                self.prg_rom[index]
            }
            _ => 0,
        }
    }

    fn prg_write(&mut self, addr: u16, data: u8) {
        let even = addr & 1 == 0;
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled && !self.prg_ram_write_protect {
                    self.prg_ram[(addr - 0x6000) as usize] = data;
                }
            }
            0x8000..=0x9FFF if even => self.bank_select = data,
            0x8000..=0x9FFF => {
                let r = (self.bank_select & 7) as usize;
                self.regs[r] = data;
                debug!("MMC3 R{r} = ${data:02X}");
            }
            0xA000..=0xBFFF if even => {
                if !self.four_screen {
                    self.mirroring = if data & 1 == 0 {
                        Mirroring::Vertical
                    } else {
                        Mirroring::Horizontal
                    };
                }
            }
            0xA000..=0xBFFF => {
                self.prg_ram_enabled = data & 0x80 != 0;
                self.prg_ram_write_protect = data & 0x40 != 0;
            }
            0xC000..=0xDFFF if even => self.irq_latch = data,
            0xC000..=0xDFFF => {
                self.irq_counter = 0;
                self.irq_reload = true;
            }
            0xE000..=0xFFFF if even => {
                self.irq_enabled = false;
                self.irq_pending = false;
            }
            0xE000..=0xFFFF => self.irq_enabled = true,
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

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn tick(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn reset(&mut self) {
        self.bank_select = 0;
        self.regs = [0, 2, 4, 5, 6, 7, 0, 1];
        self.irq_counter = 0;
        self.irq_reload = false;
        self.irq_enabled = false;
        self.irq_pending = false;
    }

    fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }
}
