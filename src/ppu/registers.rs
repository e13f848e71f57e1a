//! [PPU registers](https://www.nesdev.org/wiki/PPU_registers) $2000–$2002 as named bit sets.

use bitflags::bitflags;

bitflags! {
    /// PPUCTRL ($2000).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuCtrl: u8 {
        const NAMETABLE_X = 1 << 0;
        const NAMETABLE_Y = 1 << 1;
        const INCREMENT_32 = 1 << 2;
        const SPRITE_TABLE = 1 << 3;
        const BACKGROUND_TABLE = 1 << 4;
        const SPRITE_16 = 1 << 5;
        const MASTER_SLAVE = 1 << 6;
        const NMI_ENABLE = 1 << 7;
    }
}

impl PpuCtrl {
    /// VRAM address step after a $2007 access.
    pub fn increment(self) -> u16 {
        if self.contains(Self::INCREMENT_32) { 32 } else { 1 }
    }

    pub fn background_table(self) -> u16 {
        if self.contains(Self::BACKGROUND_TABLE) { 0x1000 } else { 0 }
    }

    /// Pattern table for 8×8 sprites; 8×16 sprites pick theirs from the tile number.
    pub fn sprite_table(self) -> u16 {
        if self.contains(Self::SPRITE_TABLE) { 0x1000 } else { 0 }
    }

    pub fn sprite_height(self) -> u16 {
        if self.contains(Self::SPRITE_16) { 16 } else { 8 }
    }
}

bitflags! {
    /// PPUMASK ($2001).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuMask: u8 {
        const GRAYSCALE = 1 << 0;
        const SHOW_BACKGROUND_LEFT = 1 << 1;
        const SHOW_SPRITES_LEFT = 1 << 2;
        const SHOW_BACKGROUND = 1 << 3;
        const SHOW_SPRITES = 1 << 4;
        const EMPHASIZE_RED = 1 << 5;
        const EMPHASIZE_GREEN = 1 << 6;
        const EMPHASIZE_BLUE = 1 << 7;
    }
}

impl PpuMask {
    pub fn rendering_enabled(self) -> bool {
        self.intersects(Self::SHOW_BACKGROUND | Self::SHOW_SPRITES)
    }
}

bitflags! {
    /// PPUSTATUS ($2002). The low five bits read back as stale bus contents.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuStatus: u8 {
        const SPRITE_OVERFLOW = 1 << 5;
        const SPRITE_ZERO_HIT = 1 << 6;
        const VBLANK = 1 << 7;
    }
}
