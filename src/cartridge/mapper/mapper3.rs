//! Mapper 3 (CNROM): fixed PRG like NROM, switchable 8 KiB CHR bank.
//!
//! [CNROM](https://www.nesdev.org/wiki/CNROM): any write to $8000–$FFFF selects the CHR bank,
//! masked to the number of banks on the board.

use tracing::debug;

use crate::cartridge::cartridge::Cartridge;
use crate::cartridge::mapper::{Mirroring, bank_index, mapper::Mapper};

pub struct CnRom {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    mirroring: Mirroring,
    chr_bank: u8,
}

impl CnRom {
    pub fn new(cart: &Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom.clone(),
            chr: cart.chr.clone(),
            mirroring: cart.mirroring,
            chr_bank: 0,
        }
    }
}

impl Mapper for CnRom {
    fn prg_read(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xFFFF => self.prg_rom[(addr - 0x8000) as usize % self.prg_rom.len()],
            _ => 0,
        }
    }

    fn prg_write(&mut self, addr: u16, data: u8) {
        if addr >= 0x8000 {
            let banks = (self.chr.len() / 0x2000).max(1);
            self.chr_bank = data & (banks.next_power_of_two() - 1) as u8;
            debug!("CNROM CHR bank {}", self.chr_bank);
        }
    }

    fn chr_read(&self, addr: u16) -> u8 {
        self.chr[bank_index(self.chr_bank as usize, 0x2000, addr, self.chr.len())]
    }

    fn chr_write(&mut self, _addr: u16, _data: u8) {}

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.chr_bank = 0;
    }

    fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::cartridge::tests::{ines, nes2_small};

    #[test]
    fn write_selects_8k_chr_bank() {
        let cart = Cartridge::from_bytes(&ines(2, 4, 0x30, 0)).unwrap();
        let mut mapper = CnRom::new(&cart);
        assert_eq!(mapper.chr_read(0x0000), 0x80);
        mapper.prg_write(0x8000, 0xFE);
        // Four banks: only the low two bits count.
        assert_eq!(mapper.chr_read(0x0000), 16 ^ 0x80);
        assert_eq!(mapper.chr_read(0x1C00), 23 ^ 0x80);
    }

    #[test]
    fn prg_is_fixed() {
        let cart = Cartridge::from_bytes(&ines(1, 2, 0x30, 0)).unwrap();
        let mut mapper = CnRom::new(&cart);
        mapper.prg_write(0x8000, 1);
        assert_eq!(mapper.prg_read(0xC000), 0);
        assert_eq!(mapper.prg_read(0x8400), 1);
    }

    #[test]
    fn chr_smaller_than_the_window_reads_mirrored() {
        let cart = Cartridge::from_bytes(&nes2_small(3, 0x28, 1)).unwrap();
        let mut mapper = CnRom::new(&cart);
        assert_eq!(mapper.chr_read(0x1000), 0);
        assert_eq!(mapper.chr_read(0x1FFF), 0);
        mapper.prg_write(0x8000, 3);
        assert_eq!(mapper.chr_read(0x1FFF), 0);
        assert_eq!(mapper.prg_read(0xFFFF), 0);
    }
}
