use bitflags::bitflags;

bitflags! {
    /// 6502 processor status register (P).
    ///
    /// ```text
    ///  7 6 5 4 3 2 1 0
    ///  N V U B D I Z C
    /// ```
    ///
    /// B and U only exist in the copy pushed to the stack.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        const CARRY = 1 << 0;
        const ZERO = 1 << 1;
        const INTERRUPT_DISABLE = 1 << 2;
        const DECIMAL = 1 << 3;
        const BREAK = 1 << 4;
        const UNUSED = 1 << 5;
        const OVERFLOW = 1 << 6;
        const NEGATIVE = 1 << 7;
    }
}

impl Status {
    /// Value the CPU comes out of reset with.
    pub const POWER_ON: Status = Status::INTERRUPT_DISABLE.union(Status::UNUSED);

    /// Set Z and N from a result byte.
    pub fn set_zn(&mut self, value: u8) {
        self.set(Status::ZERO, value == 0);
        self.set(Status::NEGATIVE, value & 0x80 != 0);
    }

    /// Byte pushed by PHP/BRK (`brk = true`) or by hardware interrupts.
    pub fn pushed(self, brk: bool) -> u8 {
        let mut p = self | Status::UNUSED;
        p.set(Status::BREAK, brk);
        p.bits()
    }

    /// Status as restored by PLP/RTI: bits 4 and 5 of the stack copy are ignored.
    pub fn pulled(byte: u8) -> Status {
        (Status::from_bits_retain(byte) - Status::BREAK) | Status::UNUSED
    }
}
