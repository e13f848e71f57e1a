//! NES APU (Audio Processing Unit) implementation.
//!
//! Implements the [APU](https://www.nesdev.org/wiki/APU) as in the Ricoh 2A03: five channels (pulse×2,
//! triangle, noise, DMC), [frame counter](https://www.nesdev.org/wiki/APU_Frame_Counter) (4-step or
//! 5-step), and [APU Mixer](https://www.nesdev.org/wiki/APU_Mixer) (non-linear). Registers $4000–$4013,
//! $4015, $4017. See [APU registers](https://www.nesdev.org/wiki/APU_registers).
//!
//! ## Timing
//!
//! - Pulse: timer clocked every 2 CPU cycles (APU "half cycle").
//! - Triangle, noise, DMC: clocked at CPU rate. Length/envelope/sweep clocked by frame counter (~240 Hz).
//! - DMC: when the sample buffer is empty the bus reads the next byte and stalls the CPU 4 cycles.

use tracing::debug;

use crate::apu::{
    dmc::Dmc,
    noise::Noise,
    player::{NullPlayer, Player},
    pulse::{Pulse, PulseChannel},
    triangle::Triangle,
};

/// 4-step sequence resets after this many CPU cycles; IRQ raised one cycle earlier.
const FRAME_4STEP_RESET: u32 = 29830;

/// 5-step sequence: no IRQ, extra half frame at 37281.
const FRAME_5STEP_RESET: u32 = 37282;

/// Pulse group: `95.52 / (8128 / n + 100)`, n = pulse1 + pulse2.
pub const PULSE_TABLE: [f32; 31] = pulse_table();

/// Triangle/noise/DMC group: `163.67 / (24329 / n + 100)`, n = 3*tri + 2*noise + dmc.
pub const TND_TABLE: [f32; 203] = tnd_table();

const fn pulse_table() -> [f32; 31] {
    let mut table = [0.0; 31];
    let mut n = 1;
    while n < table.len() {
        table[n] = 95.52 / (8128.0 / n as f32 + 100.0);
        n += 1;
    }
    table
}

const fn tnd_table() -> [f32; 203] {
    let mut table = [0.0; 203];
    let mut n = 1;
    while n < table.len() {
        table[n] = 163.67 / (24329.0 / n as f32 + 100.0);
        n += 1;
    }
    table
}

/// APU state: pulse×2, triangle, noise, DMC; frame counter; IRQ flags; sample clock feeding the
/// attached [`Player`]. [`APU::tick`] advances everything by one CPU cycle.
pub struct APU {
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    frame_cycle: u32,
    five_step: bool,
    irq_inhibit: bool,
    frame_irq: bool,
    /// Pulse timers run on every other CPU cycle.
    odd_cycle: bool,
    cycles_per_sample: f64,
    sample_phase: f64,
    player: Box<dyn Player>,
}

impl APU {
    pub fn new(sample_rate: u32, cpu_hz: f64) -> Self {
        Self {
            pulse1: Pulse::new(PulseChannel::One),
            pulse2: Pulse::new(PulseChannel::Two),
            triangle: Triangle::default(),
            noise: Noise::default(),
            dmc: Dmc::default(),
            frame_cycle: 0,
            five_step: false,
            irq_inhibit: false,
            frame_irq: false,
            odd_cycle: false,
            cycles_per_sample: cpu_hz / sample_rate.max(1) as f64,
            sample_phase: 0.0,
            player: Box::new(NullPlayer),
        }
    }

    pub fn set_player(&mut self, player: Box<dyn Player>) {
        self.player = player;
    }

    /// Write to APU registers. $4000–$4013 = channel regs; $4015 = channel enables;
    /// $4017 = frame counter (mode 4/5-step, IRQ inhibit). Writing $4017 resets the sequence.
    pub fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x4000..=0x4003 => self.pulse1.write(addr, data),
            0x4004..=0x4007 => self.pulse2.write(addr, data),
            0x4008..=0x400B => self.triangle.write(addr, data),
            0x400C..=0x400F => self.noise.write(addr, data),
            0x4010..=0x4013 => self.dmc.write(addr, data),
            0x4015 => {
                self.pulse1.length.set_enabled(data & 0x01 != 0);
                self.pulse2.length.set_enabled(data & 0x02 != 0);
                self.triangle.length.set_enabled(data & 0x04 != 0);
                self.noise.length.set_enabled(data & 0x08 != 0);
                self.dmc.irq = false;
                self.dmc.set_enabled(data & 0x10 != 0);
            }
            0x4017 => {
                self.five_step = data & 0x80 != 0;
                self.irq_inhibit = data & 0x40 != 0;
                self.frame_cycle = 0;
                if self.irq_inhibit {
                    self.frame_irq = false;
                }
                // Real hardware waits 3–4 cycles; the clocks land at once here.
                if self.five_step {
                    self.clock_quarter_frame();
                    self.clock_half_frame();
                }
                debug!(five_step = self.five_step, inhibit = self.irq_inhibit, "frame counter");
            }
            _ => {}
        }
    }

    /// Read $4015: bits 0–3 = length counter > 0 for pulse1, pulse2, triangle, noise; bit 4 = DMC
    /// has bytes remaining; bit 6 = frame IRQ; bit 7 = DMC IRQ. Reading clears the frame IRQ only.
    pub fn read_status(&mut self) -> u8 {
        let mut status = 0;
        if self.pulse1.length.active() {
            status |= 0x01;
        }
        if self.pulse2.length.active() {
            status |= 0x02;
        }
        if self.triangle.length.active() {
            status |= 0x04;
        }
        if self.noise.length.active() {
            status |= 0x08;
        }
        if self.dmc.active() {
            status |= 0x10;
        }
        if self.frame_irq {
            status |= 0x40;
        }
        if self.dmc.irq {
            status |= 0x80;
        }
        self.frame_irq = false;
        status
    }

    /// Level-triggered IRQ line: frame counter or DMC end of sample.
    pub fn irq(&self) -> bool {
        self.frame_irq || self.dmc.irq
    }

    /// Address the DMC memory reader wants next. The bus reads it, stalls the CPU 4 cycles and
    /// answers with [`APU::dmc_feed`].
    pub fn dmc_fetch(&self) -> Option<u16> {
        self.dmc.fetch_address()
    }

    pub fn dmc_feed(&mut self, byte: u8) {
        self.dmc.feed(byte);
    }

    /// Quarter frame: envelopes and the triangle linear counter.
    fn clock_quarter_frame(&mut self) {
        self.pulse1.envelope.clock();
        self.pulse2.envelope.clock();
        self.noise.envelope.clock();
        self.triangle.clock_linear();
    }

    /// Half frame: length counters and sweep units.
    fn clock_half_frame(&mut self) {
        self.pulse1.length.clock();
        self.pulse2.length.clock();
        self.triangle.length.clock();
        self.noise.length.clock();
        self.pulse1.clock_sweep();
        self.pulse2.clock_sweep();
    }

    fn clock_frame_counter(&mut self) {
        self.frame_cycle += 1;
        match self.frame_cycle {
            7457 | 22371 => self.clock_quarter_frame(),
            14913 => {
                self.clock_quarter_frame();
                self.clock_half_frame();
            }
            29829 if !self.five_step => {
                self.clock_quarter_frame();
                self.clock_half_frame();
                if !self.irq_inhibit {
                    self.frame_irq = true;
                }
            }
            37281 if self.five_step => {
                self.clock_quarter_frame();
                self.clock_half_frame();
            }
            _ => {}
        }
        let period = if self.five_step { FRAME_5STEP_RESET } else { FRAME_4STEP_RESET };
        if self.frame_cycle >= period {
            self.frame_cycle = 0;
        }
    }

    /// Current mixer output in `0.0..=1.0`.
    pub fn mix(&self) -> f32 {
        let pulse = self.pulse1.output() + self.pulse2.output();
        let tnd = 3 * self.triangle.output() as usize
            + 2 * self.noise.output() as usize
            + self.dmc.output() as usize;
        PULSE_TABLE[pulse as usize] + TND_TABLE[tnd]
    }

    /// Advance one CPU cycle: frame counter, channel timers, and the sample clock.
    pub fn tick(&mut self) {
        self.clock_frame_counter();

        self.odd_cycle = !self.odd_cycle;
        if !self.odd_cycle {
            self.pulse1.tick();
            self.pulse2.tick();
        }
        self.triangle.tick();
        self.noise.tick();
        self.dmc.tick();

        self.sample_phase += 1.0;
        if self.sample_phase >= self.cycles_per_sample {
            self.sample_phase -= self.cycles_per_sample;
            let sample = self.mix();
            self.player.output(sample);
        }
    }

    /// Soft reset: silence every channel and restart the frame counter in its current mode.
    pub fn reset(&mut self) {
        self.write(0x4015, 0x00);
        self.frame_cycle = 0;
        self.frame_irq = false;
        self.sample_phase = 0.0;
        self.player.reset();
    }

    pub fn stop(&mut self) {
        self.player.stop();
    }
}
