use tracing::{Level, enabled, trace};

use crate::{
    bus::Bus,
    cpu::{
        disasm,
        flags::Status,
        opcodes::{AddrMode, INSTRUCTIONS, Instruction, Op},
    },
    error::{NesError, Result},
};

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Interrupt sources the console can deliver at an instruction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Nmi,
    Irq,
    Brk,
}

pub struct CPU<B: Bus> {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: Status,
    /// CPU cycles executed since power-on, interrupts included.
    pub cycles: u64,
    pub bus: B,
    /// Set by a JAM opcode; only a reset clears it.
    pub halted: bool,
}

impl<B: Bus> CPU<B> {
    pub fn new(bus: B) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            status: Status::POWER_ON,
            cycles: 0,
            bus,
            halted: false,
        }
    }

    pub fn reset(&mut self) {
        self.pc = self.read_word(RESET_VECTOR);

        self.sp = 0xFD;
        self.status = Status::POWER_ON;

        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.halted = false;

        self.cycles = 7;
    }

    /// Execute one instruction and return the CPU cycles it took.
    ///
    /// The caller forwards the cycles to [`Bus::tick`]; the CPU itself never ticks the bus.
    pub fn step(&mut self) -> Result<u32> {
        let pc = self.pc;
        let opcode = self.bus.read(pc);
        if self.halted {
            return Err(NesError::Jam { opcode, addr: pc });
        }

        let ins = INSTRUCTIONS[opcode as usize];
        if enabled!(Level::TRACE) {
            self.trace(pc, &ins);
        }

        self.pc = pc.wrapping_add(1);
        let (addr, base) = self.resolve(ins.mode);
        self.pc = pc.wrapping_add(ins.len as u16);

        let mut cycles = ins.cycles as u32;
        if ins.page_penalty && page_crossed(base, addr) {
            cycles += 1;
        }
        cycles += self.execute(&ins, addr, base)?;

        self.cycles += cycles as u64;
        Ok(cycles)
    }

    /// Run the interrupt entry sequence. Returns the cycles used: 7, or 0 for a masked IRQ.
    ///
    /// For [`Interrupt::Brk`] the caller is expected to have advanced `pc` past the padding byte.
    pub fn interrupt(&mut self, kind: Interrupt) -> u32 {
        let vector = match kind {
            Interrupt::Nmi => NMI_VECTOR,
            Interrupt::Irq if self.status.contains(Status::INTERRUPT_DISABLE) => return 0,
            Interrupt::Irq | Interrupt::Brk => IRQ_VECTOR,
        };
        self.enter_interrupt(vector, kind == Interrupt::Brk);
        self.cycles += 7;
        7
    }

    fn enter_interrupt(&mut self, vector: u16, brk: bool) {
        self.push_word(self.pc);
        self.push(self.status.pushed(brk));
        self.status.insert(Status::INTERRUPT_DISABLE);
        self.pc = self.read_word(vector);
    }

    fn trace(&mut self, pc: u16, ins: &Instruction) {
        let mut bytes = [0u8; 3];
        for (i, byte) in bytes.iter_mut().enumerate().take(ins.len as usize) {
            *byte = self.bus.read(pc.wrapping_add(i as u16));
        }
        let line = disasm::decode(&bytes[..ins.len as usize], pc);
        trace!(
            "{:<42}A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
            line.to_string(),
            self.a,
            self.x,
            self.y,
            self.status.bits(),
            self.sp,
            self.cycles
        );
    }

    /// Effective address for `mode` with `pc` on the first operand byte, plus the address before
    /// indexing (the same address for unindexed modes, the fall-through `pc` for branches).
    fn resolve(&mut self, mode: AddrMode) -> (u16, u16) {
        let pc = self.pc;
        match mode {
            AddrMode::Implied | AddrMode::Accumulator => (0, 0),
            AddrMode::Immediate => (pc, pc),
            AddrMode::ZeroPage => {
                let addr = self.bus.read(pc) as u16;
                (addr, addr)
            }
            AddrMode::ZeroPageX => {
                let addr = self.bus.read(pc).wrapping_add(self.x) as u16;
                (addr, addr)
            }
            AddrMode::ZeroPageY => {
                let addr = self.bus.read(pc).wrapping_add(self.y) as u16;
                (addr, addr)
            }
            AddrMode::Absolute => {
                let addr = self.read_word(pc);
                (addr, addr)
            }
            AddrMode::AbsoluteX => {
                let base = self.read_word(pc);
                (base.wrapping_add(self.x as u16), base)
            }
            AddrMode::AbsoluteY => {
                let base = self.read_word(pc);
                (base.wrapping_add(self.y as u16), base)
            }
            AddrMode::Indirect => {
                let ptr = self.read_word(pc);
                // The high byte is fetched without carrying into the pointer's page.
                let lo = self.bus.read(ptr) as u16;
                let hi = self.bus.read((ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF)) as u16;
                let addr = (hi << 8) | lo;
                (addr, addr)
            }
            AddrMode::IndirectX => {
                let zp = self.bus.read(pc).wrapping_add(self.x);
                let addr = self.read_zero_page_word(zp);
                (addr, addr)
            }
            AddrMode::IndirectY => {
                let zp = self.bus.read(pc);
                let base = self.read_zero_page_word(zp);
                (base.wrapping_add(self.y as u16), base)
            }
            AddrMode::Relative => {
                let offset = self.bus.read(pc) as i8;
                let next = pc.wrapping_add(1);
                (next.wrapping_add(offset as u16), next)
            }
        }
    }

    /// Execute `ins` against its resolved operand. Returns extra cycles (branches only).
    fn execute(&mut self, ins: &Instruction, addr: u16, base: u16) -> Result<u32> {
        match ins.op {
            // Loads and stores
            Op::Lda => {
                self.a = self.bus.read(addr);
                self.status.set_zn(self.a);
            }
            Op::Ldx => {
                self.x = self.bus.read(addr);
                self.status.set_zn(self.x);
            }
            Op::Ldy => {
                self.y = self.bus.read(addr);
                self.status.set_zn(self.y);
            }
            Op::Sta => self.bus.write(addr, self.a),
            Op::Stx => self.bus.write(addr, self.x),
            Op::Sty => self.bus.write(addr, self.y),

            // Arithmetic and logic
            Op::Adc => {
                let value = self.bus.read(addr);
                self.add(value);
            }
            Op::Sbc => {
                let value = self.bus.read(addr);
                self.add(!value);
            }
            Op::And => {
                self.a &= self.bus.read(addr);
                self.status.set_zn(self.a);
            }
            Op::Ora => {
                self.a |= self.bus.read(addr);
                self.status.set_zn(self.a);
            }
            Op::Eor => {
                self.a ^= self.bus.read(addr);
                self.status.set_zn(self.a);
            }
            Op::Cmp => {
                let value = self.bus.read(addr);
                self.compare(self.a, value);
            }
            Op::Cpx => {
                let value = self.bus.read(addr);
                self.compare(self.x, value);
            }
            Op::Cpy => {
                let value = self.bus.read(addr);
                self.compare(self.y, value);
            }
            Op::Bit => {
                let value = self.bus.read(addr);
                self.status.set(Status::ZERO, self.a & value == 0);
                self.status.set(Status::OVERFLOW, value & 0x40 != 0);
                self.status.set(Status::NEGATIVE, value & 0x80 != 0);
            }

            // Shifts, increments
            Op::Asl => {
                self.modify(ins.mode, addr, Self::asl);
            }
            Op::Lsr => {
                self.modify(ins.mode, addr, Self::lsr);
            }
            Op::Rol => {
                self.modify(ins.mode, addr, Self::rol);
            }
            Op::Ror => {
                self.modify(ins.mode, addr, Self::ror);
            }
            Op::Inc => {
                let value = self.modify(ins.mode, addr, |_, v| v.wrapping_add(1));
                self.status.set_zn(value);
            }
            Op::Dec => {
                let value = self.modify(ins.mode, addr, |_, v| v.wrapping_sub(1));
                self.status.set_zn(value);
            }
            Op::Inx => {
                self.x = self.x.wrapping_add(1);
                self.status.set_zn(self.x);
            }
            Op::Iny => {
                self.y = self.y.wrapping_add(1);
                self.status.set_zn(self.y);
            }
            Op::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.status.set_zn(self.x);
            }
            Op::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.status.set_zn(self.y);
            }

            // Control flow
            Op::Jmp => self.pc = addr,
            Op::Jsr => {
                self.push_word(self.pc.wrapping_sub(1));
                self.pc = addr;
            }
            Op::Rts => self.pc = self.pop_word().wrapping_add(1),
            Op::Rti => {
                self.status = Status::pulled(self.pop());
                self.pc = self.pop_word();
            }
            Op::Brk => {
                // Skip the padding byte after BRK.
                self.pc = self.pc.wrapping_add(1);
                self.enter_interrupt(IRQ_VECTOR, true);
            }
            Op::Bcc => return Ok(self.branch(!self.status.contains(Status::CARRY), addr)),
            Op::Bcs => return Ok(self.branch(self.status.contains(Status::CARRY), addr)),
            Op::Bne => return Ok(self.branch(!self.status.contains(Status::ZERO), addr)),
            Op::Beq => return Ok(self.branch(self.status.contains(Status::ZERO), addr)),
            Op::Bpl => return Ok(self.branch(!self.status.contains(Status::NEGATIVE), addr)),
            Op::Bmi => return Ok(self.branch(self.status.contains(Status::NEGATIVE), addr)),
            Op::Bvc => return Ok(self.branch(!self.status.contains(Status::OVERFLOW), addr)),
            Op::Bvs => return Ok(self.branch(self.status.contains(Status::OVERFLOW), addr)),

            // Flags
            Op::Clc => self.status.remove(Status::CARRY),
            Op::Sec => self.status.insert(Status::CARRY),
            Op::Cli => self.status.remove(Status::INTERRUPT_DISABLE),
            Op::Sei => self.status.insert(Status::INTERRUPT_DISABLE),
            Op::Clv => self.status.remove(Status::OVERFLOW),
            Op::Cld => self.status.remove(Status::DECIMAL),
            Op::Sed => self.status.insert(Status::DECIMAL),

            // Transfers and stack
            Op::Tax => {
                self.x = self.a;
                self.status.set_zn(self.x);
            }
            Op::Tay => {
                self.y = self.a;
                self.status.set_zn(self.y);
            }
            Op::Txa => {
                self.a = self.x;
                self.status.set_zn(self.a);
            }
            Op::Tya => {
                self.a = self.y;
                self.status.set_zn(self.a);
            }
            Op::Tsx => {
                self.x = self.sp;
                self.status.set_zn(self.x);
            }
            Op::Txs => self.sp = self.x,
            Op::Pha => self.push(self.a),
            Op::Php => self.push(self.status.pushed(true)),
            Op::Pla => {
                self.a = self.pop();
                self.status.set_zn(self.a);
            }
            Op::Plp => self.status = Status::pulled(self.pop()),

            Op::Nop => {
                if !matches!(ins.mode, AddrMode::Implied) {
                    self.bus.read(addr);
                }
            }

            // Undocumented: read-modify-write combined with an ALU op
            Op::Slo => {
                let value = self.modify(ins.mode, addr, Self::asl);
                self.a |= value;
                self.status.set_zn(self.a);
            }
            Op::Rla => {
                let value = self.modify(ins.mode, addr, Self::rol);
                self.a &= value;
                self.status.set_zn(self.a);
            }
            Op::Sre => {
                let value = self.modify(ins.mode, addr, Self::lsr);
                self.a ^= value;
                self.status.set_zn(self.a);
            }
            Op::Rra => {
                let value = self.modify(ins.mode, addr, Self::ror);
                self.add(value);
            }
            Op::Dcp => {
                let value = self.modify(ins.mode, addr, |_, v| v.wrapping_sub(1));
                self.compare(self.a, value);
            }
            Op::Isc => {
                let value = self.modify(ins.mode, addr, |_, v| v.wrapping_add(1));
                self.add(!value);
            }

            // Undocumented: loads and stores
            Op::Lax => {
                self.a = self.bus.read(addr);
                self.x = self.a;
                self.status.set_zn(self.a);
            }
            Op::Sax => self.bus.write(addr, self.a & self.x),
            Op::Las => {
                let value = self.bus.read(addr) & self.sp;
                self.a = value;
                self.x = value;
                self.sp = value;
                self.status.set_zn(value);
            }
            Op::Sha => self.store_high_and(addr, base, self.a & self.x),
            Op::Shx => self.store_high_and(addr, base, self.x),
            Op::Shy => self.store_high_and(addr, base, self.y),
            Op::Tas => {
                self.sp = self.a & self.x;
                self.store_high_and(addr, base, self.sp);
            }

            // Undocumented: immediate
            Op::Anc => {
                self.a &= self.bus.read(addr);
                self.status.set_zn(self.a);
                self.status.set(Status::CARRY, self.a & 0x80 != 0);
            }
            Op::Alr => {
                let value = self.a & self.bus.read(addr);
                self.a = self.lsr(value);
                self.status.set_zn(self.a);
            }
            Op::Arr => {
                let carry = self.status.contains(Status::CARRY) as u8;
                self.a = ((self.a & self.bus.read(addr)) >> 1) | (carry << 7);
                self.status.set_zn(self.a);
                let bit6 = self.a & 0x40 != 0;
                let bit5 = self.a & 0x20 != 0;
                self.status.set(Status::CARRY, bit6);
                self.status.set(Status::OVERFLOW, bit6 ^ bit5);
            }
            Op::Axs => {
                let value = self.bus.read(addr);
                let masked = self.a & self.x;
                self.status.set(Status::CARRY, masked >= value);
                self.x = masked.wrapping_sub(value);
                self.status.set_zn(self.x);
            }
            Op::Xaa => {
                self.a = (self.a | UNSTABLE_MAGIC) & self.x & self.bus.read(addr);
                self.status.set_zn(self.a);
            }
            Op::Lxa => {
                self.a = (self.a | UNSTABLE_MAGIC) & self.bus.read(addr);
                self.x = self.a;
                self.status.set_zn(self.a);
            }

            Op::Jam => {
                let at = self.pc.wrapping_sub(ins.len as u16);
                self.pc = at;
                self.halted = true;
                return Err(NesError::Jam {
                    opcode: ins.opcode,
                    addr: at,
                });
            }
        }
        Ok(0)
    }

    /// ADC core; SBC passes the complemented operand.
    fn add(&mut self, value: u8) {
        let carry_in = self.status.contains(Status::CARRY) as u16;
        let sum = self.a as u16 + value as u16 + carry_in;
        let result = sum as u8;

        self.status.set(Status::CARRY, sum > 0xFF);
        self.status.set(
            Status::OVERFLOW,
            (!(self.a ^ value) & (self.a ^ result)) & 0x80 != 0,
        );

        self.a = result;
        self.status.set_zn(self.a);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.status.set(Status::CARRY, register >= value);
        self.status.set_zn(register.wrapping_sub(value));
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.status.set(Status::CARRY, value & 0x80 != 0);
        let result = value << 1;
        self.status.set_zn(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.status.set(Status::CARRY, value & 0x01 != 0);
        let result = value >> 1;
        self.status.set_zn(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry = self.status.contains(Status::CARRY) as u8;
        self.status.set(Status::CARRY, value & 0x80 != 0);
        let result = (value << 1) | carry;
        self.status.set_zn(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry = self.status.contains(Status::CARRY) as u8;
        self.status.set(Status::CARRY, value & 0x01 != 0);
        let result = (value >> 1) | (carry << 7);
        self.status.set_zn(result);
        result
    }

    /// Read-modify-write on the accumulator or on memory. Returns the new value.
    fn modify(&mut self, mode: AddrMode, addr: u16, f: impl FnOnce(&mut Self, u8) -> u8) -> u8 {
        if mode == AddrMode::Accumulator {
            let value = self.a;
            self.a = f(self, value);
            self.a
        } else {
            let value = self.bus.read(addr);
            let result = f(self, value);
            self.bus.write(addr, result);
            result
        }
    }

    /// SHA/SHX/SHY/TAS store: value ANDed with the base high byte + 1. On a page cross the
    /// value also replaces the high byte of the target address.
    fn store_high_and(&mut self, addr: u16, base: u16, value: u8) {
        let value = value & ((base >> 8) as u8).wrapping_add(1);
        let addr = if page_crossed(base, addr) {
            ((value as u16) << 8) | (addr & 0x00FF)
        } else {
            addr
        };
        self.bus.write(addr, value);
    }

    /// Taken branches cost one cycle, two when the target is on another page.
    fn branch(&mut self, condition: bool, target: u16) -> u32 {
        if !condition {
            return 0;
        }
        let extra = if page_crossed(self.pc, target) { 2 } else { 1 };
        self.pc = target;
        extra
    }

    fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.bus.read(addr) as u16;
        let hi = self.bus.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    fn read_zero_page_word(&mut self, zp: u8) -> u16 {
        let lo = self.bus.read(zp as u16) as u16;
        let hi = self.bus.read(zp.wrapping_add(1) as u16) as u16;
        (hi << 8) | lo
    }

    fn push(&mut self, value: u8) {
        let addr = 0x0100 | self.sp as u16;
        self.bus.write(addr, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        let addr = 0x0100 | self.sp as u16;
        self.bus.read(addr)
    }

    fn push_word(&mut self, value: u16) {
        self.push((value >> 8) as u8);
        self.push(value as u8);
    }

    fn pop_word(&mut self) -> u16 {
        let lo = self.pop() as u16;
        let hi = self.pop() as u16;
        (hi << 8) | lo
    }
}

/// Constant ORed into A by the unstable XAA/LXA opcodes; $EE matches most 2A03s.
const UNSTABLE_MAGIC: u8 = 0xEE;

fn page_crossed(a: u16, b: u16) -> bool {
    (a ^ b) & 0xFF00 != 0
}
