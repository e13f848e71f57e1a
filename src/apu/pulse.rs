//! [Pulse channels](https://www.nesdev.org/wiki/APU_Pulse) ($4000–$4007).

use crate::apu::units::{Envelope, LengthCounter};

/// Output sequence per duty setting: 12.5%, 25%, 50%, 25% negated.
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

/// The two pulse channels differ only in how the sweep negates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseChannel {
    /// Ones' complement: `period - change - 1`.
    One,
    /// Twos' complement: `period - change`.
    Two,
}

#[derive(Debug, Default, Clone)]
struct Sweep {
    enabled: bool,
    period: u8,
    negate: bool,
    shift: u8,
    divider: u8,
    reload: bool,
}

#[derive(Debug, Clone)]
pub struct Pulse {
    channel: PulseChannel,
    duty: u8,
    step: u8,
    timer: u16,
    timer_period: u16,
    sweep: Sweep,
    pub envelope: Envelope,
    pub length: LengthCounter,
}

impl Pulse {
    pub fn new(channel: PulseChannel) -> Self {
        Self {
            channel,
            duty: 0,
            step: 0,
            timer: 0,
            timer_period: 0,
            sweep: Sweep::default(),
            envelope: Envelope::default(),
            length: LengthCounter::default(),
        }
    }

    /// `register` is the offset within the channel's four registers.
    pub fn write(&mut self, register: u16, data: u8) {
        match register & 0x03 {
            0 => {
                self.duty = data >> 6;
                self.envelope.write(data);
                self.length.halt = data & 0x20 != 0;
            }
            1 => {
                self.sweep.enabled = data & 0x80 != 0;
                self.sweep.period = (data >> 4) & 0x07;
                self.sweep.negate = data & 0x08 != 0;
                self.sweep.shift = data & 0x07;
                self.sweep.reload = true;
            }
            2 => self.timer_period = (self.timer_period & 0x0700) | data as u16,
            _ => {
                self.timer_period = (self.timer_period & 0x00FF) | ((data & 0x07) as u16) << 8;
                self.length.load(data);
                self.envelope.restart();
                self.step = 0;
            }
        }
    }

    /// Clocked every other CPU cycle.
    pub fn tick(&mut self) {
        if self.timer == 0 {
            self.timer = self.timer_period;
            self.step = (self.step + 1) & 0x07;
        } else {
            self.timer -= 1;
        }
    }

    fn target_period(&self) -> u16 {
        let change = self.timer_period >> self.sweep.shift;
        if !self.sweep.negate {
            self.timer_period + change
        } else {
            match self.channel {
                PulseChannel::One => self.timer_period.saturating_sub(change + 1),
                PulseChannel::Two => self.timer_period.saturating_sub(change),
            }
        }
    }

    /// The sweep unit silences the channel even when it is not enabled.
    pub fn muted(&self) -> bool {
        self.timer_period < 8 || self.target_period() > 0x7FF
    }

    /// Half-frame clock.
    pub fn clock_sweep(&mut self) {
        if self.sweep.divider == 0 && self.sweep.enabled && self.sweep.shift > 0 && !self.muted() {
            self.timer_period = self.target_period();
        }
        if self.sweep.divider == 0 || self.sweep.reload {
            self.sweep.divider = self.sweep.period;
            self.sweep.reload = false;
        } else {
            self.sweep.divider -= 1;
        }
    }

    pub fn output(&self) -> u8 {
        let high = DUTY_TABLE[self.duty as usize][self.step as usize] != 0;
        if !high || !self.length.active() || self.muted() {
            return 0;
        }
        self.envelope.output()
    }

    pub fn period(&self) -> u16 {
        self.timer_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(channel: PulseChannel, period: u16, sweep: u8) -> Pulse {
        let mut pulse = Pulse::new(channel);
        pulse.length.set_enabled(true);
        pulse.write(0, 0x3F); // 12.5%, halt, constant volume 15
        pulse.write(1, sweep);
        pulse.write(2, period as u8);
        pulse.write(3, 0x08 | (period >> 8) as u8);
        pulse
    }

    #[test]
    fn short_periods_are_muted() {
        assert!(pulse(PulseChannel::One, 7, 0).muted());
        assert!(!pulse(PulseChannel::One, 8, 0).muted());
    }

    #[test]
    fn sweep_target_overflow_mutes() {
        // Shift 1, no negate: 0x600 + 0x300 > 0x7FF.
        let p = pulse(PulseChannel::One, 0x600, 0x01);
        assert!(p.muted());
        assert_eq!(p.output(), 0);
        assert!(!pulse(PulseChannel::One, 0x500, 0x01).muted());
    }

    #[test]
    fn negate_differs_between_channels() {
        let mut one = pulse(PulseChannel::One, 0x100, 0x89); // enabled, period 0, negate, shift 1
        let mut two = pulse(PulseChannel::Two, 0x100, 0x89);
        one.clock_sweep();
        two.clock_sweep();
        assert_eq!(one.period(), 0x7F);
        assert_eq!(two.period(), 0x80);
    }

    #[test]
    fn duty_sequence_gates_volume() {
        let mut p = pulse(PulseChannel::Two, 0x100, 0);
        assert_eq!(p.output(), 0); // step 0 of 12.5% is low
        p.timer = 0;
        p.tick();
        assert_eq!(p.output(), 15);
        p.timer = 0;
        p.tick();
        assert_eq!(p.output(), 0);
    }
}
