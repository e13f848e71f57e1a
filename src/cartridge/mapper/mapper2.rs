//! Mapper 2 (UxROM): switchable 16 KiB bank at $8000, last bank fixed at $C000, CHR RAM.
//!
//! [UxROM](https://www.nesdev.org/wiki/UxROM): any write to $8000–$FFFF selects the bank from its
//! low nibble (UNROM uses 3 bits, UOROM 4).

use tracing::debug;

use crate::cartridge::cartridge::Cartridge;
use crate::cartridge::mapper::{Mirroring, bank_index, mapper::Mapper};

pub struct UxRom {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    mirroring: Mirroring,
    bank: u8,
}

impl UxRom {
    pub fn new(cart: &Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom.clone(),
            chr: cart.chr.clone(),
            chr_is_ram: cart.chr_is_ram,
            mirroring: cart.mirroring,
            bank: 0,
        }
    }

    fn last_bank(&self) -> usize {
        (self.prg_rom.len() / 0x4000).saturating_sub(1)
    }
}

impl Mapper for UxRom {
    fn prg_read(&self, addr: u16) -> u8 {
        let bank = match addr {
            0x8000..=0xBFFF => self.bank as usize,
            0xC000..=0xFFFF => self.last_bank(),
            _ => return 0,
        };
        self.prg_rom[bank_index(bank, 0x4000, addr, self.prg_rom.len())]
    }

    fn prg_write(&mut self, addr: u16, data: u8) {
        if addr >= 0x8000 {
            self.bank = data & 0x0F;
            debug!("UxROM bank {} at $8000", self.bank);
        }
    }

    fn chr_read(&self, addr: u16) -> u8 {
        self.chr[addr as usize % self.chr.len()]
    }

    fn chr_write(&mut self, addr: u16, data: u8) {
        if self.chr_is_ram {
            let len = self.chr.len();
            self.chr[addr as usize % len] = data;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.bank = 0;
    }

    fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::cartridge::tests::{ines, nes2_small};

    fn uxrom() -> UxRom {
        UxRom::new(&Cartridge::from_bytes(&ines(8, 0, 0x20, 0)).unwrap())
    }

    #[test]
    fn low_nibble_selects_bank_at_8000() {
        let mut mapper = uxrom();
        mapper.prg_write(0x8000, 0xF3);
        assert_eq!(mapper.prg_read(0x8000), 48);
        assert_eq!(mapper.prg_read(0xBFFF), 63);
    }

    #[test]
    fn c000_stays_on_last_bank() {
        let mut mapper = uxrom();
        assert_eq!(mapper.prg_read(0xC000), 112);
        mapper.prg_write(0xFFFF, 1);
        assert_eq!(mapper.prg_read(0xC000), 112);
    }

    #[test]
    fn reset_returns_to_bank_0() {
        let mut mapper = uxrom();
        mapper.prg_write(0x8000, 5);
        mapper.reset();
        assert_eq!(mapper.prg_read(0x8000), 0);
    }

    #[test]
    fn chr_ram_is_writable() {
        let mut mapper = uxrom();
        mapper.chr_write(0x1FFF, 0x99);
        assert_eq!(mapper.chr_read(0x1FFF), 0x99);
    }

    #[test]
    fn prg_smaller_than_a_bank_mirrors_inside_it() {
        // 6 KiB of PRG behind 16 KiB windows.
        let mut mapper = UxRom::new(&Cartridge::from_bytes(&nes2_small(2, 0x2D, 1)).unwrap());
        assert_eq!(mapper.prg_read(0xD400), 5);
        assert_eq!(mapper.prg_read(0xD800), 0);
        mapper.prg_write(0x8000, 7);
        assert_eq!(mapper.prg_read(0x8400), 1);
        assert_eq!(mapper.prg_read(0xBFFF), 3);

        mapper.chr_write(0x1F85, 0x42);
        assert_eq!(mapper.chr_read(0x0005), 0x42);
    }
}
