//! Building blocks shared by the channels: length counter and envelope.
//!
//! See [APU Length Counter](https://www.nesdev.org/wiki/APU_Length_Counter) and
//! [APU Envelope](https://www.nesdev.org/wiki/APU_Envelope).

/// 5-bit index from the channel's fourth register → length in half frames.
pub const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

#[derive(Debug, Default, Clone)]
pub struct LengthCounter {
    /// Channel enable bit from $4015; while clear the counter is held at 0.
    enabled: bool,
    pub halt: bool,
    value: u8,
}

impl LengthCounter {
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.value = 0;
        }
    }

    /// Load from the upper five bits of a register write.
    pub fn load(&mut self, data: u8) {
        if self.enabled {
            self.value = LENGTH_TABLE[(data >> 3) as usize];
        }
    }

    /// Half-frame clock.
    pub fn clock(&mut self) {
        if !self.halt && self.value > 0 {
            self.value -= 1;
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn active(&self) -> bool {
        self.value > 0
    }
}

#[derive(Debug, Default, Clone)]
pub struct Envelope {
    start: bool,
    divider: u8,
    decay: u8,
    /// Doubles as the length counter halt flag.
    pub looping: bool,
    pub constant: bool,
    /// Constant volume, or the divider period.
    pub volume: u8,
}

impl Envelope {
    /// Register 0 of pulse/noise: `--LC VVVV`.
    pub fn write(&mut self, data: u8) {
        self.looping = data & 0x20 != 0;
        self.constant = data & 0x10 != 0;
        self.volume = data & 0x0F;
    }

    pub fn restart(&mut self) {
        self.start = true;
    }

    /// Quarter-frame clock.
    pub fn clock(&mut self) {
        if self.start {
            self.start = false;
            self.decay = 15;
            self.divider = self.volume;
        } else if self.divider > 0 {
            self.divider -= 1;
        } else {
            self.divider = self.volume;
            if self.decay > 0 {
                self.decay -= 1;
            } else if self.looping {
                self.decay = 15;
            }
        }
    }

    pub fn output(&self) -> u8 {
        if self.constant { self.volume } else { self.decay }
    }
}
