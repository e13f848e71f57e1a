//! NES controller input handling.
//!
//! Implements the standard NES controller shift register protocol:
//! write $01 to $4016 to latch current state; then read $4016 (port 1) or $4017 (port 2)
//! repeatedly to get one bit per read (A, B, Select, Start, Up, Down, Left, Right).

/// Buttons in shift-out order; the discriminant is the bit in the latched state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A = 0,
    B = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
    ];

    pub fn mask(self) -> u8 {
        1 << self as u8
    }
}

/// One standard controller.
#[derive(Debug, Default, Clone)]
pub struct Controller {
    /// Live button states, bit per [`Button`].
    state: u8,
    /// Latched copy, shifted out LSB-first.
    shift: u8,
    /// While set, the shift register keeps reloading and reads always return A.
    strobe: bool,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.state |= button.mask();
        } else {
            self.state &= !button.mask();
        }
        if self.strobe {
            self.shift = self.state;
        }
    }

    /// Replace the whole state at once.
    pub fn set_state(&mut self, state: u8) {
        self.state = state;
        if self.strobe {
            self.shift = self.state;
        }
    }

    pub fn state(&self) -> u8 {
        self.state
    }

    /// Write to $4016. Bit 0 high holds the latch open; the falling edge freezes it.
    pub fn write(&mut self, data: u8) {
        self.strobe = data & 1 != 0;
        if self.strobe {
            self.shift = self.state;
        }
    }

    /// One button per read, OR'd with open bus ($40). After eight reads the register returns 1s.
    pub fn read(&mut self) -> u8 {
        if self.strobe {
            return (self.state & 1) | 0x40;
        }
        let bit = self.shift & 1;
        self.shift = (self.shift >> 1) | 0x80;
        bit | 0x40
    }
}
