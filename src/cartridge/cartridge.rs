//! NES cartridge loading from iNES and NES 2.0 images (.nes files).
//!
//! Implements [iNES](https://www.nesdev.org/wiki/INES) and [NES 2.0](https://www.nesdev.org/wiki/NES_2.0):
//! 16-byte header (magic "NES\x1A", PRG size in 16 KiB units, CHR size in 8 KiB units, flags 6–7
//! for mapper and mirroring), optional 512-byte trainer, then PRG ROM, then CHR ROM. NES 2.0 adds
//! size MSBs in byte 9 (with an exponent-multiplier form), mapper bits 8–11 and a submapper in
//! byte 8, RAM sizes in bytes 10–11 and the timing mode in byte 12.
//!
//! The parsed [`Cartridge`] is plain data; [`new_mapper`](crate::cartridge::mapper::new_mapper)
//! turns it into the bank-switching hardware.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::cartridge::mapper::Mirroring;
use crate::error::{NesError, Result};

pub const HEADER_LEN: usize = 16;
pub const TRAINER_LEN: usize = 512;
const MAGIC: &[u8; 4] = b"NES\x1A";
const PRG_UNIT: usize = 16 * 1024;
const CHR_UNIT: usize = 8 * 1024;
/// PRG RAM assumed when an iNES header leaves byte 8 at 0.
const DEFAULT_PRG_RAM: usize = 8 * 1024;

/// Header generation, detected from byte 7 bits 2–3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomFormat {
    INes,
    Nes2,
}

/// Video timing the cartridge was built for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TvSystem {
    /// 60 Hz, 262 scanlines, 1.789773 MHz CPU.
    #[default]
    Ntsc,
    /// 50 Hz, 312 scanlines, 1.662607 MHz CPU.
    Pal,
}

impl TvSystem {
    pub const fn cpu_hz(self) -> u32 {
        match self {
            Self::Ntsc => 1_789_773,
            Self::Pal => 1_662_607,
        }
    }

    pub const fn frame_rate(self) -> u32 {
        match self {
            Self::Ntsc => 60,
            Self::Pal => 50,
        }
    }
}

/// A parsed ROM image. Immutable once built; mappers copy what they need out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cartridge {
    pub prg_rom: Vec<u8>,
    /// CHR ROM, or zeroed CHR RAM when the header declares no CHR ROM.
    pub chr: Vec<u8>,
    pub chr_is_ram: bool,
    /// 512-byte trainer, loaded at $7000 by mappers with PRG RAM.
    pub trainer: Option<Vec<u8>>,
    pub mirroring: Mirroring,
    pub mapper_id: u16,
    /// NES 2.0 only; 0 for iNES.
    pub submapper: u8,
    pub tv_system: TvSystem,
    pub format: RomFormat,
    /// Byte 6 bit 1: PRG RAM is battery backed.
    pub battery: bool,
    pub prg_ram_size: usize,
    /// NES 2.0 trailing "miscellaneous ROM" data, if any.
    pub misc_rom: Vec<u8>,
}

impl Cartridge {
    /// Read and parse a ROM image from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        let cart = Self::from_bytes(&data)?;
        info!(
            path = %path.as_ref().display(),
            mapper = cart.mapper_id,
            prg_kib = cart.prg_rom.len() / 1024,
            chr_kib = cart.chr.len() / 1024,
            format = ?cart.format,
            "cartridge loaded"
        );
        Ok(cart)
    }

    /// Parse an in-memory iNES / NES 2.0 image.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(NesError::Format(format!(
                "image is {} bytes, shorter than the 16-byte header",
                data.len()
            )));
        }
        if &data[0..4] != MAGIC {
            return Err(NesError::Format(format!(
                "bad magic {:02X?}, expected \"NES\\x1A\"",
                &data[0..4]
            )));
        }

        let flags6 = data[6];
        let flags7 = data[7];
        let format = if flags7 & 0x0C == 0x08 {
            RomFormat::Nes2
        } else {
            RomFormat::INes
        };

        let (prg_size, chr_size) = match format {
            RomFormat::INes => (data[4] as usize * PRG_UNIT, data[5] as usize * CHR_UNIT),
            RomFormat::Nes2 => (
                nes2_rom_size(data[4], data[9] & 0x0F, PRG_UNIT)?,
                nes2_rom_size(data[5], data[9] >> 4, CHR_UNIT)?,
            ),
        };

        let mut mapper_id = ((flags7 & 0xF0) | (flags6 >> 4)) as u16;
        let mut submapper = 0;
        match format {
            RomFormat::Nes2 => {
                mapper_id |= ((data[8] & 0x0F) as u16) << 8;
                submapper = data[8] >> 4;
            }
            RomFormat::INes => {
                // Old dumping tools signed bytes 7–15 ("DiskDude!"), corrupting the high nibble.
                if data[12..16].iter().any(|&b| b != 0) {
                    debug!(mapper_id, "junk in header bytes 12-15, masking mapper high nibble");
                    mapper_id &= 0x0F;
                }
            }
        }

        let mirroring = if flags6 & 0x08 != 0 {
            // UNROM 512 marks one-screen boards as %....1..0 and four-screen as %....1..1.
            if mapper_id == 2 && flags6 & 0x01 == 0 {
                Mirroring::OneScreenLower
            } else {
                Mirroring::FourScreen
            }
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let tv_system = match format {
            RomFormat::INes if data[9] & 0x01 != 0 => TvSystem::Pal,
            RomFormat::Nes2 if data[12] & 0x03 == 1 => TvSystem::Pal,
            _ => TvSystem::Ntsc,
        };

        let prg_ram_size = match format {
            RomFormat::INes if data[8] == 0 => DEFAULT_PRG_RAM,
            RomFormat::INes => data[8] as usize * DEFAULT_PRG_RAM,
            RomFormat::Nes2 => {
                let shift = (data[10] & 0x0F).max(data[10] >> 4);
                if shift == 0 { 0 } else { 64 << shift }
            }
        };

        let mut offset = HEADER_LEN;
        let trainer = if flags6 & 0x04 != 0 {
            let bytes = slice(data, offset, TRAINER_LEN, "trainer")?;
            offset += TRAINER_LEN;
            Some(bytes.to_vec())
        } else {
            None
        };

        let prg_rom = slice(data, offset, prg_size, "PRG ROM")?.to_vec();
        offset += prg_size;
        if prg_rom.is_empty() {
            return Err(NesError::Format("header declares no PRG ROM".into()));
        }

        let chr_is_ram = chr_size == 0;
        let chr = if chr_is_ram {
            let ram = match format {
                RomFormat::Nes2 if data[11] & 0x0F != 0 => 64 << (data[11] & 0x0F),
                _ => CHR_UNIT,
            };
            vec![0; ram]
        } else {
            let bytes = slice(data, offset, chr_size, "CHR ROM")?.to_vec();
            offset += chr_size;
            bytes
        };

        let misc_rom = match format {
            RomFormat::Nes2 => data[offset..].to_vec(),
            RomFormat::INes => Vec::new(),
        };

        Ok(Self {
            prg_rom,
            chr,
            chr_is_ram,
            trainer,
            mirroring,
            mapper_id,
            submapper,
            tv_system,
            format,
            battery: flags6 & 0x02 != 0,
            prg_ram_size,
            misc_rom,
        })
    }
}

/// NES 2.0 ROM size: a 12-bit unit count, or `2^E * (MM*2+1)` bytes when the MSB nibble is $F.
fn nes2_rom_size(lsb: u8, msb: u8, unit: usize) -> Result<usize> {
    if msb == 0x0F {
        let exponent = (lsb >> 2) as u32;
        let multiplier = (lsb & 0x03) as usize * 2 + 1;
        1usize
            .checked_shl(exponent)
            .and_then(|base| base.checked_mul(multiplier))
            .ok_or_else(|| NesError::Format(format!("ROM size 2^{exponent}*{multiplier} overflows")))
    } else {
        Ok((((msb as usize) << 8) | lsb as usize) * unit)
    }
}

fn slice<'a>(data: &'a [u8], offset: usize, len: usize, what: &str) -> Result<&'a [u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            NesError::Format(format!(
                "{what} needs {len} bytes at offset {offset}, image has {}",
                data.len()
            ))
        })
}
