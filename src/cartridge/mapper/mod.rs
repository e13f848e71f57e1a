//! NES mappers for PRG/CHR memory mapping.
//!
//! The mapper is picked once, from the header's mapper number, by [`new_mapper`]:
//! NROM (0), MMC1 (1), UxROM (2), CNROM (3), MMC3 (4) and Konami VRC2/VRC4 (21, 22, 23, 25).
//! Anything else is an [`NesError::UnsupportedMapper`].

pub mod mapper;

pub mod mapper0;
pub mod mapper1;
pub mod mapper2;
pub mod mapper3;
pub mod mapper4;
pub mod vrc;

use tracing::debug;

use crate::cartridge::cartridge::Cartridge;
use crate::error::{NesError, Result};

use self::mapper::Mapper;

/// Nametable mirroring mode for PPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    /// $2000 = $2400, $2800 = $2C00 (vertical scrolling games).
    Horizontal,
    /// $2000 = $2800, $2400 = $2C00 (horizontal scrolling games).
    Vertical,
    OneScreenLower,
    OneScreenUpper,
    /// Cartridge supplies the extra 2 KiB; all four tables are distinct.
    FourScreen,
}

impl Mirroring {
    /// Map a PPU address in $2000–$3EFF to an index into the 4 KiB nametable VRAM.
    pub fn vram_index(self, addr: u16) -> usize {
        let addr = (addr & 0x0FFF) as usize;
        let table = addr / 0x400;
        let physical = match self {
            Mirroring::Horizontal => table / 2,
            Mirroring::Vertical => table % 2,
            Mirroring::OneScreenLower => 0,
            Mirroring::OneScreenUpper => 1,
            Mirroring::FourScreen => table,
        };
        physical * 0x400 + (addr & 0x3FF)
    }
}

/// Build the mapper hardware for a parsed cartridge.
pub fn new_mapper(cart: &Cartridge) -> Result<Box<dyn Mapper>> {
    let mapper: Box<dyn Mapper> = match cart.mapper_id {
        0 => Box::new(mapper0::Nrom::new(cart)),
        1 => Box::new(mapper1::Mmc1::new(cart)),
        2 => Box::new(mapper2::UxRom::new(cart)),
        3 => Box::new(mapper3::CnRom::new(cart)),
        4 => Box::new(mapper4::Mmc3::new(cart)),
        21 | 22 | 23 | 25 => Box::new(vrc::Vrc::new(cart)),
        id => return Err(NesError::UnsupportedMapper(id)),
    };
    debug!(mapper = cart.mapper_id, mirroring = ?cart.mirroring, "mapper ready");
    Ok(mapper)
}

/// 8 KiB PRG RAM for $6000–$7FFF with the trainer, if any, placed at $7000.
pub(crate) fn prg_ram(cart: &Cartridge) -> Vec<u8> {
    let mut ram = vec![0; 0x2000];
    if let Some(trainer) = &cart.trainer {
        ram[0x1000..0x1000 + trainer.len()].copy_from_slice(trainer);
    }
    ram
}

/// Index into `len` bytes of PRG or CHR for `addr` seen through a `size`-byte window mapped to
/// `bank`. Out-of-range banks wrap, and memory smaller than one window mirrors inside it.
///
/// `len` is never zero: the parser rejects empty PRG ROM and always allocates CHR RAM.
pub(crate) fn bank_index(bank: usize, size: usize, addr: u16, len: usize) -> usize {
    let count = (len / size).max(1);
    ((bank % count) * size + (addr as usize & (size - 1))) % len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::cartridge::tests::{ines, nes2_small};

    #[test]
    fn horizontal_mirroring_pairs_top_and_bottom() {
        let m = Mirroring::Horizontal;
        assert_eq!(m.vram_index(0x2000), m.vram_index(0x2400));
        assert_eq!(m.vram_index(0x2800), m.vram_index(0x2C00));
        assert_ne!(m.vram_index(0x2000), m.vram_index(0x2800));
    }

    #[test]
    fn vertical_mirroring_pairs_left_and_right() {
        let m = Mirroring::Vertical;
        assert_eq!(m.vram_index(0x2005), m.vram_index(0x2805));
        assert_eq!(m.vram_index(0x2405), m.vram_index(0x2C05));
        assert_ne!(m.vram_index(0x2005), m.vram_index(0x2405));
    }

    #[test]
    fn one_screen_and_four_screen() {
        assert_eq!(Mirroring::OneScreenUpper.vram_index(0x2C10), 0x410);
        assert_eq!(Mirroring::OneScreenLower.vram_index(0x2C10), 0x010);
        assert_eq!(Mirroring::FourScreen.vram_index(0x2C10), 0xC10);
        // $3000–$3EFF mirrors $2000–$2EFF.
        assert_eq!(Mirroring::FourScreen.vram_index(0x3C10), 0xC10);
    }

    #[test]
    fn unknown_mapper_is_an_error() {
        let cart = Cartridge::from_bytes(&ines(1, 1, 0x70, 0x00)).unwrap();
        assert!(matches!(new_mapper(&cart), Err(NesError::UnsupportedMapper(7))));
    }

    #[test]
    fn every_listed_mapper_builds() {
        for id in [0u8, 1, 2, 3, 4, 21, 22, 23, 25] {
            let cart = Cartridge::from_bytes(&ines(2, 1, id << 4, id & 0xF0)).unwrap();
            assert_eq!(cart.mapper_id, id as u16);
            let mapper = new_mapper(&cart).unwrap();
            assert_eq!(mapper.prg_rom().len(), 32 * 1024);
        }
    }

    #[test]
    fn every_mapper_reads_through_a_minimal_image() {
        // 1 KiB of PRG and 128 bytes of CHR RAM, smaller than any bank window.
        for id in [0u8, 1, 2, 3, 4, 21, 22, 23, 25] {
            let cart = Cartridge::from_bytes(&nes2_small(id, 0x28, 1)).unwrap();
            let mut mapper = new_mapper(&cart).unwrap();
            for addr in (0x8000..=0xFFFFu16).step_by(0x40) {
                assert_eq!(mapper.prg_read(addr), 0, "mapper {id} at ${addr:04X}");
            }
            assert_eq!(mapper.prg_read(0xFFFF), 0);
            for addr in (0..0x2000u16).step_by(0x40) {
                mapper.chr_write(addr, 0x11);
                mapper.chr_read(addr);
            }
        }
    }

    #[test]
    fn bank_index_wraps_bank_and_offset() {
        assert_eq!(bank_index(3, 0x2000, 0x9234, 0x8000), 0x7234);
        assert_eq!(bank_index(5, 0x2000, 0x9234, 0x8000), 0x3234);
        assert_eq!(bank_index(0, 0x2000, 0x9234, 0x400), 0x234);
        assert_eq!(bank_index(0, 0x2000, 0x9FFF, 0x1800), 0x1FFF % 0x1800);
    }

    #[test]
    fn trainer_lands_at_7000() {
        let cart = Cartridge::from_bytes(&ines(1, 1, 0x04, 0)).unwrap();
        let ram = prg_ram(&cart);
        assert_eq!(ram[0x0FFF], 0);
        assert_eq!(ram[0x1000], 0xEE);
        assert_eq!(ram[0x11FF], 0xEE);
    }
}
