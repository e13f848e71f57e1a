//! Mapper 0 (NROM): no bank switching, 16/32 KiB PRG, 8 KiB CHR ROM or RAM.

use tracing::warn;

use crate::cartridge::cartridge::Cartridge;
use crate::cartridge::mapper::{Mirroring, mapper::Mapper, prg_ram};

/// NROM mapper: fixed PRG and CHR, 16 KiB PRG mirrored into $C000.
pub struct Nrom {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    /// Family Basic style 8 KiB work RAM at $6000.
    prg_ram: Vec<u8>,
    mirroring: Mirroring,
}

impl Nrom {
    pub fn new(cart: &Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom.clone(),
            chr: cart.chr.clone(),
            chr_is_ram: cart.chr_is_ram,
            prg_ram: prg_ram(cart),
            mirroring: cart.mirroring,
        }
    }
}

impl Mapper for Nrom {
    fn prg_read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize],
            0x8000..=0xFFFF => self.prg_rom[(addr - 0x8000) as usize % self.prg_rom.len()],
            _ => 0,
        }
    }

    fn prg_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize] = data,
            0x8000..=0xFFFF => warn!("ignored write ${data:02X} to NROM PRG ROM at ${addr:04X}"),
            _ => {}
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

    fn reset(&mut self) {}

    fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::cartridge::tests::ines;

    fn nrom(prg_banks: u8, chr_banks: u8) -> Nrom {
        Nrom::new(&Cartridge::from_bytes(&ines(prg_banks, chr_banks, 0, 0)).unwrap())
    }

    #[test]
    fn sixteen_kib_prg_is_mirrored() {
        let mapper = nrom(1, 1);
        assert_eq!(mapper.prg_read(0x8400), mapper.prg_read(0xC400));
        assert_eq!(mapper.prg_read(0xBFFF), 15);
    }

    #[test]
    fn rom_writes_are_ignored() {
        let mut mapper = nrom(2, 1);
        let before = mapper.prg_read(0x9000);
        mapper.prg_write(0x9000, before.wrapping_add(1));
        assert_eq!(mapper.prg_read(0x9000), before);
    }

    #[test]
    fn prg_ram_at_6000() {
        let mut mapper = nrom(1, 1);
        mapper.prg_write(0x6123, 0x5A);
        assert_eq!(mapper.prg_read(0x6123), 0x5A);
    }

    #[test]
    fn chr_rom_is_read_only_chr_ram_is_not() {
        let mut rom = nrom(1, 1);
        rom.chr_write(0x0010, 0x42);
        assert_eq!(rom.chr_read(0x0010), 0x80);

        let mut ram = nrom(1, 0);
        ram.chr_write(0x0010, 0x42);
        assert_eq!(ram.chr_read(0x0010), 0x42);
    }
}
