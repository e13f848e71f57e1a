//! NES 2C02 PPU.
//!
//! [`PPU::tick`] advances one dot of the 341×262 frame. The background is produced by the real
//! fetch pipeline (nametable, attribute, pattern low/high every 8 dots feeding 16-bit shift
//! registers addressed by the loopy `v`/`t`/`x`/`w` registers); sprites are evaluated at dot 257
//! into a 256-pixel foreground buffer for the next scanline. Pixels go into the back buffer; the
//! buffers swap when vblank starts.
//!
//! See [PPU rendering](https://www.nesdev.org/wiki/PPU_rendering) and
//! [PPU scrolling](https://www.nesdev.org/wiki/PPU_scrolling).

use tracing::trace;

use crate::cartridge::mapper::mapper::Mapper;
use crate::ppu::palette::{palette_index, rgb};
use crate::ppu::registers::{PpuCtrl, PpuMask, PpuStatus};

pub const WIDTH: usize = 256;
pub const HEIGHT: usize = 240;
/// OAM: 64 sprites × 4 bytes (Y, tile, attributes, X).
pub const OAM_LEN: usize = 256;

pub const DOTS_PER_SCANLINE: u16 = 341;
pub const SCANLINES_PER_FRAME: u16 = 262;
pub const VBLANK_SCANLINE: u16 = 241;
pub const PRE_RENDER_SCANLINE: u16 = 261;

/// One picture, row-major, 0xRRGGBB per pixel.
pub type Frame = [u32; WIDTH * HEIGHT];

/// Sprite output for one screen column of the next scanline.
#[derive(Debug, Clone, Copy, Default)]
struct SpritePixel {
    /// 2-bit pattern value; 0 is transparent.
    pixel: u8,
    palette: u8,
    behind_background: bool,
    sprite_zero: bool,
}

pub struct PPU {
    pub ctrl: PpuCtrl,
    pub mask: PpuMask,
    pub status: PpuStatus,

    /// Current VRAM address (15 bits).
    v: u16,
    /// Temporary VRAM address; the top-left corner of the screen.
    t: u16,
    /// Fine X scroll.
    x: u8,
    /// First/second write toggle shared by $2005 and $2006.
    w: bool,

    /// Nametable RAM; 2 KiB on most boards, all 4 KiB with four-screen mirroring.
    vram: [u8; 0x1000],
    pub oam: [u8; OAM_LEN],
    oam_addr: u8,
    palette: [u8; 32],
    read_buffer: u8,
    /// Last value driven on the register bus.
    open_bus: u8,

    pub scanline: u16,
    pub dot: u16,
    odd_frame: bool,
    pub frame_count: u64,
    nmi: bool,

    tile_id: u8,
    tile_attr: u8,
    tile_lo: u8,
    tile_hi: u8,
    bg_pattern_lo: u16,
    bg_pattern_hi: u16,
    bg_attr_lo: u16,
    bg_attr_hi: u16,

    sprite_line: [SpritePixel; WIDTH],

    frames: [Box<Frame>; 2],
    back: usize,
    /// Set when a frame completes; cleared by [`PPU::take_frame`].
    pub frame_ready: bool,
}

impl Default for PPU {
    fn default() -> Self {
        Self::new()
    }
}

impl PPU {
    /// Power-on state: pre-render scanline, dot 0.
    pub fn new() -> Self {
        Self {
            ctrl: PpuCtrl::empty(),
            mask: PpuMask::empty(),
            status: PpuStatus::empty(),
            v: 0,
            t: 0,
            x: 0,
            w: false,
            vram: [0; 0x1000],
            oam: [0; OAM_LEN],
            oam_addr: 0,
            palette: [0; 32],
            read_buffer: 0,
            open_bus: 0,
            scanline: PRE_RENDER_SCANLINE,
            dot: 0,
            odd_frame: false,
            frame_count: 0,
            nmi: false,
            tile_id: 0,
            tile_attr: 0,
            tile_lo: 0,
            tile_hi: 0,
            bg_pattern_lo: 0,
            bg_pattern_hi: 0,
            bg_attr_lo: 0,
            bg_attr_hi: 0,
            sprite_line: [SpritePixel::default(); WIDTH],
            frames: [Box::new([0; WIDTH * HEIGHT]), Box::new([0; WIDTH * HEIGHT])],
            back: 0,
            frame_ready: false,
        }
    }

    /// Soft reset: control registers and latches clear, memory and timing are kept.
    pub fn reset(&mut self) {
        self.ctrl = PpuCtrl::empty();
        self.mask = PpuMask::empty();
        self.w = false;
        self.read_buffer = 0;
        self.odd_frame = false;
        self.nmi = false;
    }

    /// Last completed frame.
    pub fn frame(&self) -> &Frame {
        &self.frames[self.back ^ 1]
    }

    /// Whether a frame completed since the last call.
    pub fn take_frame(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    /// Consume a pending NMI edge.
    pub fn poll_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi)
    }

    pub fn vram_addr(&self) -> u16 {
        self.v
    }

    /// Advance one dot.
    pub fn tick(&mut self, mapper: &mut dyn Mapper) {
        let rendering = self.mask.rendering_enabled();
        let visible = self.scanline < HEIGHT as u16;
        let pre_render = self.scanline == PRE_RENDER_SCANLINE;

        if pre_render && self.dot == 1 {
            self.status
                .remove(PpuStatus::VBLANK | PpuStatus::SPRITE_ZERO_HIT | PpuStatus::SPRITE_OVERFLOW);
        }

        if rendering && (visible || pre_render) {
            self.background_pipeline(mapper);
            if self.dot == 257 {
                if visible {
                    self.evaluate_sprites(mapper);
                } else {
                    self.sprite_line = [SpritePixel::default(); WIDTH];
                }
            }
            if self.dot == 260 {
                mapper.tick();
            }
            if pre_render && (280..=304).contains(&self.dot) {
                self.transfer_y();
            }
        }

        if visible && (1..=256).contains(&self.dot) {
            self.render_pixel();
        }

        if self.scanline == VBLANK_SCANLINE && self.dot == 1 {
            self.enter_vblank();
        }

        self.advance(rendering);
    }

    fn advance(&mut self, rendering: bool) {
        self.dot += 1;
        // Odd frames drop the last pre-render dot while rendering.
        if self.scanline == PRE_RENDER_SCANLINE && self.dot == 340 && self.odd_frame && rendering {
            self.dot = DOTS_PER_SCANLINE;
        }
        if self.dot >= DOTS_PER_SCANLINE {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline == SCANLINES_PER_FRAME {
                self.scanline = 0;
                self.odd_frame = !self.odd_frame;
                self.frame_count += 1;
            }
        }
    }

    fn enter_vblank(&mut self) {
        self.status.insert(PpuStatus::VBLANK);
        if self.ctrl.contains(PpuCtrl::NMI_ENABLE) {
            self.nmi = true;
        }
        self.back ^= 1;
        self.frame_ready = true;
        trace!(frame = self.frame_count, "vblank");
    }

    fn background_pipeline(&mut self, mapper: &dyn Mapper) {
        let dot = self.dot;
        if (2..=257).contains(&dot) || (321..=337).contains(&dot) {
            self.shift_background();
            match (dot - 1) % 8 {
                0 => {
                    self.load_background_shifters();
                    self.tile_id = self.read_vram(mapper, 0x2000 | (self.v & 0x0FFF));
                }
                2 => {
                    let v = self.v;
                    let addr = 0x23C0 | (v & 0x0C00) | ((v >> 4) & 0x38) | ((v >> 2) & 0x07);
                    let mut attr = self.read_vram(mapper, addr);
                    if (v >> 5) & 0x02 != 0 {
                        attr >>= 4;
                    }
                    if v & 0x02 != 0 {
                        attr >>= 2;
                    }
                    self.tile_attr = attr & 0x03;
                }
                4 => self.tile_lo = mapper.chr_read(self.pattern_addr()),
                6 => self.tile_hi = mapper.chr_read(self.pattern_addr() + 8),
                7 => self.increment_x(),
                _ => {}
            }
        }
        match dot {
            256 => self.increment_y(),
            257 => {
                self.load_background_shifters();
                self.transfer_x();
            }
            // Unused nametable fetches at the end of the line.
            338 | 340 => self.tile_id = self.read_vram(mapper, 0x2000 | (self.v & 0x0FFF)),
            _ => {}
        }
    }

    fn pattern_addr(&self) -> u16 {
        self.ctrl.background_table() + self.tile_id as u16 * 16 + ((self.v >> 12) & 0x07)
    }

    fn shift_background(&mut self) {
        self.bg_pattern_lo <<= 1;
        self.bg_pattern_hi <<= 1;
        self.bg_attr_lo <<= 1;
        self.bg_attr_hi <<= 1;
    }

    fn load_background_shifters(&mut self) {
        let spread = |bit: u8| -> u16 { if self.tile_attr & bit != 0 { 0xFF } else { 0x00 } };
        let (attr_lo, attr_hi) = (spread(0x01), spread(0x02));
        self.bg_pattern_lo = (self.bg_pattern_lo & 0xFF00) | self.tile_lo as u16;
        self.bg_pattern_hi = (self.bg_pattern_hi & 0xFF00) | self.tile_hi as u16;
        self.bg_attr_lo = (self.bg_attr_lo & 0xFF00) | attr_lo;
        self.bg_attr_hi = (self.bg_attr_hi & 0xFF00) | attr_hi;
    }

    fn increment_x(&mut self) {
        if self.v & 0x001F == 31 {
            self.v &= !0x001F;
            self.v ^= 0x0400;
        } else {
            self.v += 1;
        }
    }

    fn increment_y(&mut self) {
        if self.v & 0x7000 != 0x7000 {
            self.v += 0x1000;
            return;
        }
        self.v &= !0x7000;
        let mut coarse_y = (self.v & 0x03E0) >> 5;
        match coarse_y {
            29 => {
                coarse_y = 0;
                self.v ^= 0x0800;
            }
            // Rows 30 and 31 hold attributes; scrolling into them wraps without switching tables.
            31 => coarse_y = 0,
            _ => coarse_y += 1,
        }
        self.v = (self.v & !0x03E0) | (coarse_y << 5);
    }

    fn transfer_x(&mut self) {
        self.v = (self.v & !0x041F) | (self.t & 0x041F);
    }

    fn transfer_y(&mut self) {
        self.v = (self.v & !0x7BE0) | (self.t & 0x7BE0);
    }

    /// Fill the foreground buffer for the next scanline.
    fn evaluate_sprites(&mut self, mapper: &dyn Mapper) {
        self.sprite_line = [SpritePixel::default(); WIDTH];
        let height = self.ctrl.sprite_height() as i32;
        let mut found = 0;

        for index in 0..64 {
            let base = index * 4;
            let [y, tile, attr, sprite_x] = [
                self.oam[base],
                self.oam[base + 1],
                self.oam[base + 2],
                self.oam[base + 3],
            ];
            let row = self.scanline as i32 - y as i32;
            if !(0..height).contains(&row) {
                continue;
            }
            if found == 8 {
                self.status.insert(PpuStatus::SPRITE_OVERFLOW);
                break;
            }
            found += 1;

            let row = (if attr & 0x80 != 0 { height - 1 - row } else { row }) as u16;
            let addr = if height == 8 {
                self.ctrl.sprite_table() + tile as u16 * 16 + row
            } else {
                let table = (tile & 0x01) as u16 * 0x1000;
                let tile = (tile & 0xFE) as u16 + row / 8;
                table + tile * 16 + (row & 0x07)
            };
            let lo = mapper.chr_read(addr);
            let hi = mapper.chr_read(addr + 8);

            for col in 0..8 {
                let px = sprite_x as usize + col;
                if px >= WIDTH {
                    break;
                }
                let bit = if attr & 0x40 != 0 { col } else { 7 - col };
                let pixel = (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1);
                // Lower OAM index wins.
                if pixel == 0 || self.sprite_line[px].pixel != 0 {
                    continue;
                }
                self.sprite_line[px] = SpritePixel {
                    pixel,
                    palette: attr & 0x03,
                    behind_background: attr & 0x20 != 0,
                    sprite_zero: index == 0,
                };
            }
        }
    }

    fn render_pixel(&mut self) {
        let x = (self.dot - 1) as usize;
        let left = x < 8;

        let (mut bg_pixel, mut bg_palette) = (0u8, 0u8);
        if self.mask.contains(PpuMask::SHOW_BACKGROUND)
            && (!left || self.mask.contains(PpuMask::SHOW_BACKGROUND_LEFT))
        {
            let bit = 0x8000u16 >> self.x;
            let p0 = (self.bg_pattern_lo & bit != 0) as u8;
            let p1 = (self.bg_pattern_hi & bit != 0) as u8;
            let a0 = (self.bg_attr_lo & bit != 0) as u8;
            let a1 = (self.bg_attr_hi & bit != 0) as u8;
            bg_pixel = (p1 << 1) | p0;
            bg_palette = (a1 << 1) | a0;
        }

        let mut sprite = SpritePixel::default();
        if self.mask.contains(PpuMask::SHOW_SPRITES)
            && (!left || self.mask.contains(PpuMask::SHOW_SPRITES_LEFT))
        {
            sprite = self.sprite_line[x];
        }

        let background = 0x3F00 + bg_palette as u16 * 4 + bg_pixel as u16;
        let foreground = 0x3F10 + sprite.palette as u16 * 4 + sprite.pixel as u16;
        let addr = match (bg_pixel, sprite.pixel) {
            (0, 0) => 0x3F00,
            (0, _) => foreground,
            (_, 0) => background,
            _ => {
                if sprite.sprite_zero && x != 255 {
                    self.status.insert(PpuStatus::SPRITE_ZERO_HIT);
                }
                if sprite.behind_background { background } else { foreground }
            }
        };

        let entry = self.palette[palette_index(addr)];
        let color = rgb(entry, self.mask.contains(PpuMask::GRAYSCALE));
        self.frames[self.back][self.scanline as usize * WIDTH + x] = color;
    }

    /// PPU address space read without side effects.
    pub fn read_vram(&self, mapper: &dyn Mapper, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => mapper.chr_read(addr),
            0x2000..=0x3EFF => self.vram[mapper.mirroring().vram_index(addr)],
            _ => self.palette[palette_index(addr)],
        }
    }

    fn write_vram(&mut self, mapper: &mut dyn Mapper, addr: u16, data: u8) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => mapper.chr_write(addr, data),
            0x2000..=0x3EFF => self.vram[mapper.mirroring().vram_index(addr)] = data,
            _ => self.palette[palette_index(addr)] = data & 0x3F,
        }
    }

    /// CPU read of $2000–$2007 (`reg` is the low three address bits).
    pub fn read_register(&mut self, reg: u16, mapper: &dyn Mapper) -> u8 {
        let value = match reg & 0x07 {
            2 => {
                let value = (self.status.bits() & 0xE0) | (self.read_buffer & 0x1F);
                self.status.remove(PpuStatus::VBLANK);
                self.w = false;
                value
            }
            4 => self.oam[self.oam_addr as usize],
            7 => {
                let addr = self.v & 0x3FFF;
                let value = if addr >= 0x3F00 {
                    // Palette reads bypass the buffer, which picks up the nametable underneath.
                    self.read_buffer = self.read_vram(mapper, addr - 0x1000);
                    self.read_vram(mapper, addr)
                } else {
                    let buffered = self.read_buffer;
                    self.read_buffer = self.read_vram(mapper, addr);
                    buffered
                };
                self.v = self.v.wrapping_add(self.ctrl.increment()) & 0x7FFF;
                value
            }
            _ => self.open_bus,
        };
        self.open_bus = value;
        value
    }

    /// CPU write of $2000–$2007 (`reg` is the low three address bits).
    pub fn write_register(&mut self, reg: u16, data: u8, mapper: &mut dyn Mapper) {
        self.open_bus = data;
        match reg & 0x07 {
            0 => {
                let was_enabled = self.ctrl.contains(PpuCtrl::NMI_ENABLE);
                self.ctrl = PpuCtrl::from_bits_retain(data);
                self.t = (self.t & 0xF3FF) | ((data as u16 & 0x03) << 10);
                if !was_enabled
                    && self.ctrl.contains(PpuCtrl::NMI_ENABLE)
                    && self.status.contains(PpuStatus::VBLANK)
                {
                    self.nmi = true;
                }
            }
            1 => self.mask = PpuMask::from_bits_retain(data),
            2 => {}
            3 => self.oam_addr = data,
            4 => {
                self.oam[self.oam_addr as usize] = data;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            5 => {
                if !self.w {
                    self.t = (self.t & 0xFFE0) | (data as u16 >> 3);
                    self.x = data & 0x07;
                } else {
                    self.t = (self.t & 0x8C1F)
                        | ((data as u16 & 0x07) << 12)
                        | ((data as u16 & 0xF8) << 2);
                }
                self.w = !self.w;
            }
            6 => {
                if !self.w {
                    self.t = (self.t & 0x80FF) | ((data as u16 & 0x3F) << 8);
                } else {
                    self.t = (self.t & 0xFF00) | data as u16;
                    self.v = self.t;
                }
                self.w = !self.w;
            }
            _ => {
                self.write_vram(mapper, self.v, data);
                self.v = self.v.wrapping_add(self.ctrl.increment()) & 0x7FFF;
            }
        }
    }

    /// OAM DMA ($4014): 256 bytes written through OAMADDR.
    pub fn oam_dma(&mut self, page: &[u8; 256]) {
        for &byte in page {
            self.oam[self.oam_addr as usize] = byte;
            self.oam_addr = self.oam_addr.wrapping_add(1);
        }
    }
}
