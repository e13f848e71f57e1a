//! [Delta modulation channel](https://www.nesdev.org/wiki/APU_DMC) ($4010–$4013).
//!
//! The memory reader does not touch the bus itself: [`Dmc::fetch_address`] reports when the
//! sample buffer wants a byte, and the bus answers with [`Dmc::feed`], stalling the CPU.

/// NTSC output rates in CPU cycles per bit.
const RATE_TABLE: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

#[derive(Debug, Clone)]
pub struct Dmc {
    irq_enabled: bool,
    looping: bool,
    timer: u16,
    timer_period: u16,
    /// 7-bit DAC.
    level: u8,
    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    bytes_remaining: u16,
    buffer: Option<u8>,
    shift: u8,
    bits_remaining: u8,
    silence: bool,
    pub irq: bool,
}

impl Default for Dmc {
    fn default() -> Self {
        Self {
            irq_enabled: false,
            looping: false,
            timer: 0,
            timer_period: RATE_TABLE[0],
            level: 0,
            sample_address: 0xC000,
            sample_length: 1,
            current_address: 0xC000,
            bytes_remaining: 0,
            buffer: None,
            shift: 0,
            bits_remaining: 0,
            silence: true,
            irq: false,
        }
    }
}

impl Dmc {
    pub fn write(&mut self, register: u16, data: u8) {
        match register & 0x03 {
            0 => {
                self.irq_enabled = data & 0x80 != 0;
                if !self.irq_enabled {
                    self.irq = false;
                }
                self.looping = data & 0x40 != 0;
                self.timer_period = RATE_TABLE[(data & 0x0F) as usize];
            }
            1 => self.level = data & 0x7F,
            2 => self.sample_address = 0xC000 | (data as u16) << 6,
            _ => self.sample_length = ((data as u16) << 4) | 1,
        }
    }

    /// $4015 bit 4. Enabling only restarts a sample that has finished.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.restart();
        }
    }

    fn restart(&mut self) {
        self.current_address = self.sample_address;
        self.bytes_remaining = self.sample_length;
    }

    /// Address the memory reader wants next, if the sample buffer is empty.
    pub fn fetch_address(&self) -> Option<u16> {
        (self.buffer.is_none() && self.bytes_remaining > 0).then_some(self.current_address)
    }

    /// Deliver the byte read from [`Dmc::fetch_address`].
    pub fn feed(&mut self, byte: u8) {
        self.buffer = Some(byte);
        self.current_address = match self.current_address {
            0xFFFF => 0x8000,
            addr => addr + 1,
        };
        self.bytes_remaining = self.bytes_remaining.saturating_sub(1);
        if self.bytes_remaining == 0 {
            if self.looping {
                self.restart();
            } else if self.irq_enabled {
                self.irq = true;
            }
        }
    }

    /// Clocked every CPU cycle.
    pub fn tick(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.timer_period - 1;

        if !self.silence {
            if self.shift & 1 != 0 {
                if self.level <= 125 {
                    self.level += 2;
                }
            } else if self.level >= 2 {
                self.level -= 2;
            }
        }
        self.shift >>= 1;

        self.bits_remaining = self.bits_remaining.saturating_sub(1);
        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            match self.buffer.take() {
                Some(byte) => {
                    self.shift = byte;
                    self.silence = false;
                }
                None => self.silence = true,
            }
        }
    }

    /// Sample bytes still to be read; drives $4015 bit 4.
    pub fn active(&self) -> bool {
        self.bytes_remaining > 0
    }

    pub fn output(&self) -> u8 {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_and_length_registers() {
        let mut dmc = Dmc::default();
        dmc.write(2, 0x01);
        dmc.write(3, 0x01);
        dmc.set_enabled(true);
        assert_eq!(dmc.fetch_address(), Some(0xC040));
        assert_eq!(dmc.bytes_remaining, 17);
    }

    #[test]
    fn last_byte_raises_irq() {
        let mut dmc = Dmc::default();
        dmc.write(0, 0x80);
        dmc.write(2, 0x00);
        dmc.write(3, 0x00);
        dmc.set_enabled(true);
        assert_eq!(dmc.fetch_address(), Some(0xC000));

        dmc.feed(0xAA);
        assert_eq!(dmc.fetch_address(), None);
        assert!(!dmc.active());
        assert!(dmc.irq);

        dmc.write(0, 0x00);
        assert!(!dmc.irq);
    }

    #[test]
    fn looping_sample_restarts() {
        let mut dmc = Dmc::default();
        dmc.write(0, 0xC0);
        dmc.write(3, 0x00);
        dmc.set_enabled(true);
        dmc.feed(0x00);
        assert!(dmc.active());
        assert!(!dmc.irq);
        assert_eq!(dmc.current_address, 0xC000);
    }

    #[test]
    fn reader_wraps_to_8000() {
        let mut dmc = Dmc::default();
        dmc.write(2, 0xFF);
        dmc.write(3, 0x01);
        dmc.set_enabled(true);
        dmc.current_address = 0xFFFF;
        dmc.feed(0);
        assert_eq!(dmc.current_address, 0x8000);
    }

    #[test]
    fn ones_step_the_dac_up() {
        let mut dmc = Dmc::default();
        dmc.write(0, 0x0F);
        dmc.write(1, 0x40);
        dmc.write(3, 0x00);
        dmc.set_enabled(true);
        dmc.feed(0xFF);
        for _ in 0..1 + 54 * 8 {
            dmc.tick();
        }
        assert_eq!(dmc.output(), 0x50);
    }
}
