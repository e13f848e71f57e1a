//! Memory bus and address decoding for the NES.
//!
//! Maps CPU addresses to RAM, PPU registers, APU/IO registers, controllers and the cartridge
//! mapper (see [CPU memory map](https://www.nesdev.org/wiki/CPU_memory_map)), and fans CPU cycles
//! out to the PPU (3 dots each), the APU and the mapper's CPU-clocked counters.

use tracing::{debug, warn};

use crate::{
    apu::APU,
    cartridge::mapper::mapper::Mapper,
    controller::Controller,
    ppu::PPU,
};

/// Trait for memory-mapped I/O and bus access used by the CPU.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);

    /// Advance the rest of the system by `cycles` CPU cycles.
    fn tick(&mut self, _cycles: u32) {}

    /// Consume a pending NMI edge.
    fn poll_nmi(&mut self) -> bool {
        false
    }

    /// Level of the shared IRQ line.
    fn irq(&self) -> bool {
        false
    }
}

/// CPU cycles an OAM DMA holds the CPU, before odd-cycle alignment.
const OAM_DMA_CYCLES: u32 = 513;

/// CPU cycles stolen by each DMC sample fetch.
const DMC_FETCH_CYCLES: u32 = 4;

/// Main NES bus: RAM, PPU, APU, controllers and the cartridge mapper.
pub struct NesBus {
    pub ram: [u8; 2048],
    pub ppu: PPU,
    pub apu: APU,
    pub controllers: [Controller; 2],
    pub mapper: Box<dyn Mapper>,
    /// CPU cycles ticked since power-on.
    cycles: u64,
    /// Cycles the CPU owes to DMA, drained by the console.
    stall: u32,
}

impl NesBus {
    pub fn new(mapper: Box<dyn Mapper>, apu: APU) -> Self {
        Self {
            ram: [0; 2048],
            ppu: PPU::new(),
            apu,
            controllers: [Controller::new(), Controller::new()],
            mapper,
            cycles: 0,
            stall: 0,
        }
    }

    /// Soft reset: RAM survives, everything else returns to its reset state.
    pub fn reset(&mut self) {
        self.ppu.reset();
        self.apu.reset();
        self.mapper.reset();
        self.stall = 0;
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Take the stall cycles accumulated by DMA since the last call.
    pub fn take_stall(&mut self) -> u32 {
        std::mem::take(&mut self.stall)
    }

    /// Debug read with no side effects: registers read as 0.
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x4020..=0xFFFF => self.mapper.prg_read(addr),
            _ => 0,
        }
    }

    /// $4014: copy page `$XX00` into OAM and stall the CPU.
    fn oam_dma(&mut self, page: u8) {
        let base = (page as u16) << 8;
        let mut data = [0u8; 256];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = self.read(base | i as u16);
        }
        self.ppu.oam_dma(&data);
        self.stall += OAM_DMA_CYCLES + (self.cycles & 1) as u32;
        debug!(page = format_args!("${page:02X}"), "OAM DMA");
    }
}

impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            // Internal RAM (mirrored 4x in 0x0000-0x1FFF)
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            // PPU registers $2000-$3FFF (mirrored every 8 bytes)
            0x2000..=0x3FFF => self.ppu.read_register(addr, self.mapper.as_ref()),
            0x4015 => self.apu.read_status(),
            0x4016 => self.controllers[0].read(),
            0x4017 => self.controllers[1].read(),
            // Write-only APU registers and $4014: open bus
            0x4000..=0x4014 => 0x40,
            0x4018..=0x401F => {
                warn!("read from unmapped ${addr:04X}");
                0
            }
            0x4020..=0xFFFF => self.mapper.prg_read(addr),
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = data,
            0x2000..=0x3FFF => self.ppu.write_register(addr, data, self.mapper.as_mut()),
            0x4014 => self.oam_dma(data),
            0x4016 => {
                for controller in &mut self.controllers {
                    controller.write(data);
                }
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, data),
            0x4018..=0x401F => warn!("write ${data:02X} to unmapped ${addr:04X}"),
            0x4020..=0xFFFF => self.mapper.prg_write(addr, data),
        }
    }

    fn tick(&mut self, cycles: u32) {
        for _ in 0..cycles {
            for _ in 0..3 {
                self.ppu.tick(self.mapper.as_mut());
            }
            self.apu.tick();
            if let Some(addr) = self.apu.dmc_fetch() {
                let byte = self.mapper.prg_read(addr);
                self.apu.dmc_feed(byte);
                self.stall += DMC_FETCH_CYCLES;
            }
            self.mapper.cpu_tick();
            self.cycles += 1;
        }
    }

    fn poll_nmi(&mut self) -> bool {
        self.ppu.poll_nmi()
    }

    fn irq(&self) -> bool {
        self.apu.irq() || self.mapper.irq_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{
        cartridge::{Cartridge, tests::ines},
        mapper::new_mapper,
    };
    use crate::controller::Button;

    fn bus_for(image: &[u8]) -> NesBus {
        let cart = Cartridge::from_bytes(image).unwrap();
        NesBus::new(new_mapper(&cart).unwrap(), APU::new(44_100, 1_789_773.0))
    }

    fn nrom() -> NesBus {
        bus_for(&ines(2, 1, 0x00, 0x00))
    }

    #[test]
    fn ram_is_mirrored() {
        let mut bus = nrom();
        bus.write(0x0001, 0x42);
        assert_eq!(bus.read(0x0801), 0x42);
        assert_eq!(bus.read(0x1801), 0x42);
        bus.write(0x1FFF, 0x17);
        assert_eq!(bus.read(0x07FF), 0x17);
    }

    #[test]
    fn ppu_registers_are_mirrored() {
        let mut bus = nrom();
        // $3456 mirrors $2006; $2007 through $3FFF mirrors $2007.
        bus.write(0x3456, 0x23);
        bus.write(0x2006, 0x00);
        bus.write(0x3FFF, 0x99);
        bus.write(0x2006, 0x23);
        bus.write(0x2006, 0x00);
        bus.read(0x2007);
        assert_eq!(bus.read(0x2007), 0x99);
    }

    #[test]
    fn prg_is_read_through_the_mapper() {
        let mut bus = nrom();
        // PRG byte = offset / 1 KiB.
        assert_eq!(bus.read(0x8000), 0);
        assert_eq!(bus.read(0xC400), 17);
        assert_eq!(bus.peek(0xC400), 17);
    }

    #[test]
    fn unmapped_io_reads_zero() {
        let mut bus = nrom();
        bus.write(0x4018, 0xFF);
        assert_eq!(bus.read(0x4018), 0);
    }

    #[test]
    fn oam_dma_copies_page_and_stalls() {
        let mut bus = nrom();
        for i in 0..256u16 {
            bus.write(0x0200 + i, i as u8);
        }
        bus.write(0x4014, 0x02);
        assert_eq!(bus.ppu.oam[0], 0);
        assert_eq!(bus.ppu.oam[255], 255);
        assert_eq!(bus.take_stall(), 513);
        assert_eq!(bus.take_stall(), 0);

        bus.tick(1);
        bus.write(0x4014, 0x02);
        assert_eq!(bus.take_stall(), 514);
    }

    #[test]
    fn controllers_share_the_strobe() {
        let mut bus = nrom();
        bus.controllers[0].set_button(Button::A, true);
        bus.controllers[1].set_button(Button::B, true);
        bus.write(0x4016, 1);
        bus.write(0x4016, 0);
        assert_eq!(bus.read(0x4016), 0x41);
        assert_eq!(bus.read(0x4017), 0x40);
        assert_eq!(bus.read(0x4017), 0x41);
    }

    #[test]
    fn tick_runs_three_dots_per_cycle() {
        let mut bus = nrom();
        let start = bus.ppu.scanline as u32 * 341 + bus.ppu.dot as u32;
        bus.tick(10);
        let end = bus.ppu.scanline as u32 * 341 + bus.ppu.dot as u32;
        assert_eq!((end + 262 * 341 - start) % (262 * 341), 30);
        assert_eq!(bus.cycles(), 10);
    }

    #[test]
    fn apu_frame_irq_reaches_the_bus() {
        let mut bus = nrom();
        bus.tick(29829);
        assert!(bus.irq());
        bus.read(0x4015);
        assert!(!bus.irq());
    }

    #[test]
    fn dmc_fetch_stalls_cpu() {
        let mut bus = nrom();
        bus.write(0x4012, 0x00);
        bus.write(0x4013, 0x00);
        bus.write(0x4015, 0x10);
        bus.tick(1);
        assert_eq!(bus.take_stall(), 4);
        assert_eq!(bus.read(0x4015) & 0x10, 0);
    }

    #[test]
    fn mmc3_irq_fires_on_the_latched_scanline() {
        let mut bus = bus_for(&ines(4, 2, 0x40, 0x00));
        bus.write(0xC000, 3);
        bus.write(0xC001, 0);
        bus.write(0xE001, 0);
        bus.write(0x2001, 0x18);

        let mut guard = 0;
        while !bus.irq() {
            bus.tick(1);
            guard += 1;
            assert!(guard < 30_000, "IRQ never fired");
        }
        // Reloaded on the pre-render line, then 2, 1, 0 on lines 0-2.
        assert_eq!(bus.ppu.scanline, 2);

        bus.write(0xE000, 0);
        assert!(!bus.irq());
    }
}
