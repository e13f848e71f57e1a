//! [Noise channel](https://www.nesdev.org/wiki/APU_Noise) ($400C–$400F).

use crate::apu::units::{Envelope, LengthCounter};

/// NTSC timer periods in CPU cycles.
const PERIOD_TABLE: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

#[derive(Debug, Clone)]
pub struct Noise {
    /// Short mode: feedback from bit 6 instead of bit 1.
    mode: bool,
    timer: u16,
    timer_period: u16,
    /// 15-bit LFSR.
    shift: u16,
    pub envelope: Envelope,
    pub length: LengthCounter,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            mode: false,
            timer: 0,
            timer_period: PERIOD_TABLE[0],
            shift: 1,
            envelope: Envelope::default(),
            length: LengthCounter::default(),
        }
    }
}

impl Noise {
    pub fn write(&mut self, register: u16, data: u8) {
        match register & 0x03 {
            0 => {
                self.envelope.write(data);
                self.length.halt = data & 0x20 != 0;
            }
            1 => {}
            2 => {
                self.mode = data & 0x80 != 0;
                self.timer_period = PERIOD_TABLE[(data & 0x0F) as usize];
            }
            _ => {
                self.length.load(data);
                self.envelope.restart();
            }
        }
    }

    /// Clocked every CPU cycle.
    pub fn tick(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        // Table entries are whole step lengths; counting down to 0 adds one cycle.
        self.timer = self.timer_period - 1;
        let tap = if self.mode { 6 } else { 1 };
        let feedback = (self.shift & 1) ^ ((self.shift >> tap) & 1);
        self.shift = (self.shift >> 1) | (feedback << 14);
    }

    pub fn output(&self) -> u8 {
        if !self.length.active() || self.shift & 1 != 0 {
            return 0;
        }
        self.envelope.output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_lfsr(noise: &mut Noise) {
        noise.timer = 0;
        noise.tick();
    }

    #[test]
    fn long_mode_lfsr_sequence() {
        let mut noise = Noise::default();
        step_lfsr(&mut noise);
        // bit0 (1) ^ bit1 (0) = 1 shifted into bit 14.
        assert_eq!(noise.shift, 0x4000);
        step_lfsr(&mut noise);
        assert_eq!(noise.shift, 0x2000);
    }

    #[test]
    fn lfsr_steps_once_per_table_period() {
        let mut noise = Noise::default();
        noise.write(2, 0x01); // 8 CPU cycles
        let mut steps = Vec::new();
        let mut last = noise.shift;
        for cycle in 0..40 {
            noise.tick();
            if noise.shift != last {
                steps.push(cycle);
                last = noise.shift;
            }
        }
        assert_eq!(steps, vec![0, 8, 16, 24, 32]);
    }

    #[test]
    fn short_mode_taps_bit_six() {
        let mut noise = Noise::default();
        noise.write(2, 0x80);
        noise.shift = 0x0041;
        step_lfsr(&mut noise);
        assert_eq!(noise.shift, 0x0020);
    }

    #[test]
    fn output_silent_when_bit_zero_set() {
        let mut noise = Noise::default();
        noise.length.set_enabled(true);
        noise.write(0, 0x1A);
        noise.write(3, 0x08);
        assert_eq!(noise.output(), 0); // shift starts at 1
        step_lfsr(&mut noise);
        assert_eq!(noise.output(), 10);
    }
}
