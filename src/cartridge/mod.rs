//! NES cartridge loading and mapper support.
//!
//! - **cartridge**: parses iNES / NES 2.0 images into PRG, CHR, trainer and header fields.
//! - **mapper**: NROM (0), MMC1 (1), UxROM (2), CNROM (3), MMC3 (4), VRC2/VRC4 (21–25);
//!   PRG/CHR bank switching, nametable mirroring and cartridge IRQs.

#[allow(clippy::module_inception)]
pub mod cartridge;
pub mod mapper;
