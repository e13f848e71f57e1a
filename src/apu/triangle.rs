//! [Triangle channel](https://www.nesdev.org/wiki/APU_Triangle) ($4008–$400B).

use crate::apu::units::LengthCounter;

/// 15 down to 0, then 0 up to 15.
const SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
    13, 14, 15,
];

#[derive(Debug, Default, Clone)]
pub struct Triangle {
    /// Control flag: halts the length counter and keeps the linear reload flag set.
    control: bool,
    linear_load: u8,
    linear_counter: u8,
    linear_reload: bool,
    timer: u16,
    timer_period: u16,
    step: u8,
    pub length: LengthCounter,
}

impl Triangle {
    pub fn write(&mut self, register: u16, data: u8) {
        match register & 0x03 {
            0 => {
                self.control = data & 0x80 != 0;
                self.length.halt = self.control;
                self.linear_load = data & 0x7F;
            }
            1 => {}
            2 => self.timer_period = (self.timer_period & 0x0700) | data as u16,
            _ => {
                self.timer_period = (self.timer_period & 0x00FF) | ((data & 0x07) as u16) << 8;
                self.length.load(data);
                self.linear_reload = true;
            }
        }
    }

    /// Clocked every CPU cycle.
    pub fn tick(&mut self) {
        if self.timer == 0 {
            self.timer = self.timer_period;
            if self.length.active() && self.linear_counter > 0 {
                self.step = (self.step + 1) & 0x1F;
            }
        } else {
            self.timer -= 1;
        }
    }

    /// Quarter-frame clock.
    pub fn clock_linear(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_load;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control {
            self.linear_reload = false;
        }
    }

    pub fn output(&self) -> u8 {
        // Ultrasonic periods are silenced rather than aliased.
        if !self.length.active() || self.linear_counter == 0 || self.timer_period < 2 {
            return 0;
        }
        SEQUENCE[self.step as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_counter_gates_output() {
        let mut tri = Triangle::default();
        tri.length.set_enabled(true);
        tri.write(0, 0x02); // linear load 2
        tri.write(2, 0x40);
        tri.write(3, 0x08);
        assert_eq!(tri.output(), 0);

        tri.clock_linear();
        assert_eq!(tri.output(), 15);
        tri.clock_linear();
        tri.clock_linear();
        assert_eq!(tri.output(), 0);
    }

    #[test]
    fn sequencer_walks_down() {
        let mut tri = Triangle::default();
        tri.length.set_enabled(true);
        tri.write(0, 0x7F);
        tri.write(2, 0x02);
        tri.write(3, 0x08);
        tri.clock_linear();
        for _ in 0..3 {
            tri.tick();
        }
        assert_eq!(tri.output(), 14);
    }
}
