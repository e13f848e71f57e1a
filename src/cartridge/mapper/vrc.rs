//! Mappers 21, 22, 23, 25 (Konami VRC2 / VRC4).
//!
//! [VRC2 and VRC4](https://www.nesdev.org/wiki/VRC2_and_VRC4): two switchable 8 KiB PRG windows,
//! eight 1 KiB CHR windows each set by a low/high nibble pair, mirroring control, and on VRC4 a
//! CPU-clocked IRQ counter. The boards wire the chip's two register-select lines to different
//! CPU address bits, so every write address is first folded onto the canonical $x000–$x003 form.
//!
//! | Mapper | Boards          | A0 / A1 taken from |
//! |--------|-----------------|--------------------|
//! | 21     | VRC4a, VRC4c    | A1/A6, A2/A7       |
//! | 22     | VRC2a           | A1, A0             |
//! | 23     | VRC2b, VRC4e/f  | A0/A2, A1/A3       |
//! | 25     | VRC2c, VRC4b/d  | A1/A3, A0/A2       |

use tracing::debug;

use crate::cartridge::cartridge::Cartridge;
use crate::cartridge::mapper::{Mirroring, bank_index, mapper::Mapper, prg_ram};

/// CPU cycles per scanline times three, for the IRQ prescaler.
const PRESCALER_RELOAD: i16 = 341;

pub struct Vrc {
    mapper_id: u16,
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Vec<u8>,
    prg_select: [u8; 2],
    /// $9002 bit 1: swaps the $8000 and $C000 windows.
    swap_mode: bool,
    /// 9-bit CHR bank numbers for the eight 1 KiB windows.
    chr_select: [u16; 8],
    mirroring: Mirroring,
    irq: VrcIrq,
}

#[derive(Default)]
struct VrcIrq {
    latch: u8,
    counter: u8,
    prescaler: i16,
    enabled: bool,
    enable_after_ack: bool,
    /// Counts every CPU cycle instead of every scanline.
    cycle_mode: bool,
    pending: bool,
}

impl VrcIrq {
    fn write_control(&mut self, data: u8) {
        self.enable_after_ack = data & 0x01 != 0;
        self.enabled = data & 0x02 != 0;
        self.cycle_mode = data & 0x04 != 0;
        self.pending = false;
        if self.enabled {
            self.counter = self.latch;
            self.prescaler = PRESCALER_RELOAD;
        }
    }

    fn acknowledge(&mut self) {
        self.pending = false;
        self.enabled = self.enable_after_ack;
    }

    fn clock(&mut self) {
        if !self.enabled {
            return;
        }
        if !self.cycle_mode {
            self.prescaler -= 3;
            if self.prescaler > 0 {
                return;
            }
            self.prescaler += PRESCALER_RELOAD;
        }
        if self.counter == 0xFF {
            self.counter = self.latch;
            self.pending = true;
        } else {
            self.counter += 1;
        }
    }
}

impl Vrc {
    pub fn new(cart: &Cartridge) -> Self {
        Self {
            mapper_id: cart.mapper_id,
            prg_rom: cart.prg_rom.clone(),
            chr: cart.chr.clone(),
            chr_is_ram: cart.chr_is_ram,
            prg_ram: prg_ram(cart),
            prg_select: [0, 0],
            swap_mode: false,
            chr_select: [0; 8],
            mirroring: cart.mirroring,
            irq: VrcIrq::default(),
        }
    }

    fn is_vrc2a(&self) -> bool {
        self.mapper_id == 22
    }

    /// Fold a board-specific address onto $x000–$x003.
    fn register(&self, addr: u16) -> u16 {
        let (a0, a1) = match self.mapper_id {
            21 => ((addr >> 1) | (addr >> 6), (addr >> 2) | (addr >> 7)),
            22 => (addr >> 1, addr),
            23 => (addr | (addr >> 2), (addr >> 1) | (addr >> 3)),
            _ => ((addr >> 1) | (addr >> 3), addr | (addr >> 2)),
        };
        (addr & 0xF000) | ((a1 & 1) << 1) | (a0 & 1)
    }

    fn prg_bank_at(&self, addr: u16) -> usize {
        let count = (self.prg_rom.len() / 0x2000).max(1);
        let second_last = count.saturating_sub(2);
        let prg0 = (self.prg_select[0] & 0x1F) as usize;
        let prg1 = (self.prg_select[1] & 0x1F) as usize;
        match ((addr - 0x8000) >> 13, self.swap_mode) {
            (0, false) | (2, true) => prg0,
            (0, true) | (2, false) => second_last,
            (1, _) => prg1,
            _ => count - 1,
        }
    }

    fn chr_index(&self, addr: u16) -> usize {
        let mut bank = self.chr_select[(addr >> 10) as usize & 7] as usize;
        if self.is_vrc2a() {
            bank >>= 1;
        }
        bank_index(bank, 0x400, addr, self.chr.len())
    }

    fn write_chr_select(&mut self, reg: u16, data: u8) {
        let slot = (((reg - 0xB000) >> 12) * 2 + ((reg >> 1) & 1)) as usize;
        let current = self.chr_select[slot];
        self.chr_select[slot] = if reg & 1 == 0 {
            (current & 0x1F0) | (data & 0x0F) as u16
        } else {
            (current & 0x00F) | ((data & 0x1F) as u16) << 4
        };
    }

    fn write_mirroring(&mut self, data: u8) {
        let mode = if self.is_vrc2a() { data & 1 } else { data & 3 };
        self.mirroring = match mode {
            0 => Mirroring::Vertical,
            1 => Mirroring::Horizontal,
            2 => Mirroring::OneScreenLower,
            _ => Mirroring::OneScreenUpper,
        };
    }
}

impl Mapper for Vrc {
    fn prg_read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize],
            0x8000..=0xFFFF => {
                let index = bank_index(self.prg_bank_at(addr), 0x2000, addr, self.prg_rom.len());
                self.prg_rom[index]
            }
            _ => 0,
        }
    }

    fn prg_write(&mut self, addr: u16, data: u8) {
        if (0x6000..=0x7FFF).contains(&addr) {
            self.prg_ram[(addr - 0x6000) as usize] = data;
            return;
        }
        if addr < 0x8000 {
            return;
        }
        let reg = self.register(addr);
        match reg {
            0x8000..=0x8003 => self.prg_select[0] = data,
            0x9002 if !self.is_vrc2a() => self.swap_mode = data & 0x02 != 0,
            0x9003 if !self.is_vrc2a() => {}
            0x9000..=0x9003 => self.write_mirroring(data),
            0xA000..=0xA003 => self.prg_select[1] = data,
            0xB000..=0xE003 => self.write_chr_select(reg, data),
            _ if self.is_vrc2a() => {}
            0xF000 => self.irq.latch = (self.irq.latch & 0xF0) | (data & 0x0F),
            0xF001 => self.irq.latch = (self.irq.latch & 0x0F) | (data << 4),
            0xF002 => self.irq.write_control(data),
            0xF003 => self.irq.acknowledge(),
            _ => {}
        }
        debug!("VRC ${addr:04X} (${reg:04X}) <- ${data:02X}");
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

    fn cpu_tick(&mut self) {
        self.irq.clock();
    }

    fn irq_pending(&self) -> bool {
        self.irq.pending
    }

    fn reset(&mut self) {
        self.prg_select = [0, 0];
        self.swap_mode = false;
        self.chr_select = [0; 8];
        self.irq = VrcIrq::default();
    }

    fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }
}
