//! Opcode descriptor table.
//!
//! Every one of the 256 opcode bytes maps to an [`Instruction`]: the operation, its addressing
//! mode, byte length, base cycle count and whether an indexed page cross costs an extra cycle.
//! The table is built in a `const` context so dispatch is a single array index plus one `match`
//! on [`Op`]. Cycle counts follow the [6502 instruction reference](https://www.nesdev.org/obelisk-6502-guide/reference.html)
//! and the [undocumented opcode](https://www.nesdev.org/wiki/CPU_unofficial_opcodes) tables.

use self::AddrMode::*;
use self::Op::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

impl AddrMode {
    /// Instruction length in bytes, opcode included.
    pub const fn len(self) -> u8 {
        match self {
            Implied | Accumulator => 1,
            Immediate | ZeroPage | ZeroPageX | ZeroPageY | IndirectX | IndirectY | Relative => 2,
            Absolute | AbsoluteX | AbsoluteY | Indirect => 3,
        }
    }
}

/// Operation tag. Undocumented opcodes use their common names.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
    // Undocumented
    Alr, Anc, Arr, Axs, Dcp, Isc, Jam, Las, Lax, Lxa, Rla, Rra, Sax, Sha,
    Shx, Shy, Slo, Sre, Tas, Xaa,
}

impl Op {
    #[rustfmt::skip]
    pub fn mnemonic(self) -> &'static str {
        match self {
            Adc => "ADC", And => "AND", Asl => "ASL", Bcc => "BCC", Bcs => "BCS",
            Beq => "BEQ", Bit => "BIT", Bmi => "BMI", Bne => "BNE", Bpl => "BPL",
            Brk => "BRK", Bvc => "BVC", Bvs => "BVS", Clc => "CLC", Cld => "CLD",
            Cli => "CLI", Clv => "CLV", Cmp => "CMP", Cpx => "CPX", Cpy => "CPY",
            Dec => "DEC", Dex => "DEX", Dey => "DEY", Eor => "EOR", Inc => "INC",
            Inx => "INX", Iny => "INY", Jmp => "JMP", Jsr => "JSR", Lda => "LDA",
            Ldx => "LDX", Ldy => "LDY", Lsr => "LSR", Nop => "NOP", Ora => "ORA",
            Pha => "PHA", Php => "PHP", Pla => "PLA", Plp => "PLP", Rol => "ROL",
            Ror => "ROR", Rti => "RTI", Rts => "RTS", Sbc => "SBC", Sec => "SEC",
            Sed => "SED", Sei => "SEI", Sta => "STA", Stx => "STX", Sty => "STY",
            Tax => "TAX", Tay => "TAY", Tsx => "TSX", Txa => "TXA", Txs => "TXS",
            Tya => "TYA", Alr => "ALR", Anc => "ANC", Arr => "ARR", Axs => "AXS",
            Dcp => "DCP", Isc => "ISC", Jam => "JAM", Las => "LAS", Lax => "LAX",
            Lxa => "LXA", Rla => "RLA", Rra => "RRA", Sax => "SAX", Sha => "SHA",
            Shx => "SHX", Shy => "SHY", Slo => "SLO", Sre => "SRE", Tas => "TAS",
            Xaa => "XAA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u8,
    pub op: Op,
    pub mode: AddrMode,
    pub len: u8,
    pub cycles: u8,
    /// Indexed reads that cross a page take one more cycle.
    pub page_penalty: bool,
    /// Not part of the documented instruction set.
    pub undocumented: bool,
}

const fn ins(opcode: u8, op: Op, mode: AddrMode, cycles: u8, page_penalty: bool) -> Instruction {
    Instruction {
        opcode,
        op,
        mode,
        len: mode.len(),
        cycles,
        page_penalty,
        undocumented: false,
    }
}

/// All 256 opcodes.
pub static INSTRUCTIONS: [Instruction; 256] = build_table();

#[rustfmt::skip]
const fn build_table() -> [Instruction; 256] {
    // Anything not listed below is one of the twelve JAM opcodes.
    let mut t = [ins(0x02, Jam, Implied, 2, false); 256];

    macro_rules! op {
        ($code:expr, $op:expr, $mode:expr, $cycles:expr) => {
            t[$code] = ins($code as u8, $op, $mode, $cycles, false)
        };
        ($code:expr, $op:expr, $mode:expr, $cycles:expr, +) => {
            t[$code] = ins($code as u8, $op, $mode, $cycles, true)
        };
    }

    // Loads and stores
    op!(0xA9, Lda, Immediate, 2); op!(0xA5, Lda, ZeroPage, 3); op!(0xB5, Lda, ZeroPageX, 4);
    op!(0xAD, Lda, Absolute, 4); op!(0xBD, Lda, AbsoluteX, 4, +); op!(0xB9, Lda, AbsoluteY, 4, +);
    op!(0xA1, Lda, IndirectX, 6); op!(0xB1, Lda, IndirectY, 5, +);
    op!(0xA2, Ldx, Immediate, 2); op!(0xA6, Ldx, ZeroPage, 3); op!(0xB6, Ldx, ZeroPageY, 4);
    op!(0xAE, Ldx, Absolute, 4); op!(0xBE, Ldx, AbsoluteY, 4, +);
    op!(0xA0, Ldy, Immediate, 2); op!(0xA4, Ldy, ZeroPage, 3); op!(0xB4, Ldy, ZeroPageX, 4);
    op!(0xAC, Ldy, Absolute, 4); op!(0xBC, Ldy, AbsoluteX, 4, +);
    op!(0x85, Sta, ZeroPage, 3); op!(0x95, Sta, ZeroPageX, 4); op!(0x8D, Sta, Absolute, 4);
    op!(0x9D, Sta, AbsoluteX, 5); op!(0x99, Sta, AbsoluteY, 5); op!(0x81, Sta, IndirectX, 6);
    op!(0x91, Sta, IndirectY, 6);
    op!(0x86, Stx, ZeroPage, 3); op!(0x96, Stx, ZeroPageY, 4); op!(0x8E, Stx, Absolute, 4);
    op!(0x84, Sty, ZeroPage, 3); op!(0x94, Sty, ZeroPageX, 4); op!(0x8C, Sty, Absolute, 4);

    // Arithmetic and logic
    op!(0x69, Adc, Immediate, 2); op!(0x65, Adc, ZeroPage, 3); op!(0x75, Adc, ZeroPageX, 4);
    op!(0x6D, Adc, Absolute, 4); op!(0x7D, Adc, AbsoluteX, 4, +); op!(0x79, Adc, AbsoluteY, 4, +);
    op!(0x61, Adc, IndirectX, 6); op!(0x71, Adc, IndirectY, 5, +);
    op!(0xE9, Sbc, Immediate, 2); op!(0xE5, Sbc, ZeroPage, 3); op!(0xF5, Sbc, ZeroPageX, 4);
    op!(0xED, Sbc, Absolute, 4); op!(0xFD, Sbc, AbsoluteX, 4, +); op!(0xF9, Sbc, AbsoluteY, 4, +);
    op!(0xE1, Sbc, IndirectX, 6); op!(0xF1, Sbc, IndirectY, 5, +);
    op!(0x29, And, Immediate, 2); op!(0x25, And, ZeroPage, 3); op!(0x35, And, ZeroPageX, 4);
    op!(0x2D, And, Absolute, 4); op!(0x3D, And, AbsoluteX, 4, +); op!(0x39, And, AbsoluteY, 4, +);
    op!(0x21, And, IndirectX, 6); op!(0x31, And, IndirectY, 5, +);
    op!(0x09, Ora, Immediate, 2); op!(0x05, Ora, ZeroPage, 3); op!(0x15, Ora, ZeroPageX, 4);
    op!(0x0D, Ora, Absolute, 4); op!(0x1D, Ora, AbsoluteX, 4, +); op!(0x19, Ora, AbsoluteY, 4, +);
    op!(0x01, Ora, IndirectX, 6); op!(0x11, Ora, IndirectY, 5, +);
    op!(0x49, Eor, Immediate, 2); op!(0x45, Eor, ZeroPage, 3); op!(0x55, Eor, ZeroPageX, 4);
    op!(0x4D, Eor, Absolute, 4); op!(0x5D, Eor, AbsoluteX, 4, +); op!(0x59, Eor, AbsoluteY, 4, +);
    op!(0x41, Eor, IndirectX, 6); op!(0x51, Eor, IndirectY, 5, +);
    op!(0xC9, Cmp, Immediate, 2); op!(0xC5, Cmp, ZeroPage, 3); op!(0xD5, Cmp, ZeroPageX, 4);
    op!(0xCD, Cmp, Absolute, 4); op!(0xDD, Cmp, AbsoluteX, 4, +); op!(0xD9, Cmp, AbsoluteY, 4, +);
    op!(0xC1, Cmp, IndirectX, 6); op!(0xD1, Cmp, IndirectY, 5, +);
    op!(0xE0, Cpx, Immediate, 2); op!(0xE4, Cpx, ZeroPage, 3); op!(0xEC, Cpx, Absolute, 4);
    op!(0xC0, Cpy, Immediate, 2); op!(0xC4, Cpy, ZeroPage, 3); op!(0xCC, Cpy, Absolute, 4);
    op!(0x24, Bit, ZeroPage, 3); op!(0x2C, Bit, Absolute, 4);

    // Read-modify-write
    op!(0x0A, Asl, Accumulator, 2); op!(0x06, Asl, ZeroPage, 5); op!(0x16, Asl, ZeroPageX, 6);
    op!(0x0E, Asl, Absolute, 6); op!(0x1E, Asl, AbsoluteX, 7);
    op!(0x4A, Lsr, Accumulator, 2); op!(0x46, Lsr, ZeroPage, 5); op!(0x56, Lsr, ZeroPageX, 6);
    op!(0x4E, Lsr, Absolute, 6); op!(0x5E, Lsr, AbsoluteX, 7);
    op!(0x2A, Rol, Accumulator, 2); op!(0x26, Rol, ZeroPage, 5); op!(0x36, Rol, ZeroPageX, 6);
    op!(0x2E, Rol, Absolute, 6); op!(0x3E, Rol, AbsoluteX, 7);
    op!(0x6A, Ror, Accumulator, 2); op!(0x66, Ror, ZeroPage, 5); op!(0x76, Ror, ZeroPageX, 6);
    op!(0x6E, Ror, Absolute, 6); op!(0x7E, Ror, AbsoluteX, 7);
    op!(0xE6, Inc, ZeroPage, 5); op!(0xF6, Inc, ZeroPageX, 6); op!(0xEE, Inc, Absolute, 6);
    op!(0xFE, Inc, AbsoluteX, 7);
    op!(0xC6, Dec, ZeroPage, 5); op!(0xD6, Dec, ZeroPageX, 6); op!(0xCE, Dec, Absolute, 6);
    op!(0xDE, Dec, AbsoluteX, 7);
    op!(0xE8, Inx, Implied, 2); op!(0xC8, Iny, Implied, 2);
    op!(0xCA, Dex, Implied, 2); op!(0x88, Dey, Implied, 2);

    // Control flow
    op!(0x4C, Jmp, Absolute, 3); op!(0x6C, Jmp, Indirect, 5); op!(0x20, Jsr, Absolute, 6);
    op!(0x60, Rts, Implied, 6); op!(0x40, Rti, Implied, 6); op!(0x00, Brk, Implied, 7);
    op!(0x90, Bcc, Relative, 2); op!(0xB0, Bcs, Relative, 2); op!(0xF0, Beq, Relative, 2);
    op!(0xD0, Bne, Relative, 2); op!(0x30, Bmi, Relative, 2); op!(0x10, Bpl, Relative, 2);
    op!(0x50, Bvc, Relative, 2); op!(0x70, Bvs, Relative, 2);

    // Flags, transfers, stack
    op!(0x18, Clc, Implied, 2); op!(0x38, Sec, Implied, 2); op!(0x58, Cli, Implied, 2);
    op!(0x78, Sei, Implied, 2); op!(0xB8, Clv, Implied, 2); op!(0xD8, Cld, Implied, 2);
    op!(0xF8, Sed, Implied, 2);
    op!(0xAA, Tax, Implied, 2); op!(0xA8, Tay, Implied, 2); op!(0xBA, Tsx, Implied, 2);
    op!(0x8A, Txa, Implied, 2); op!(0x9A, Txs, Implied, 2); op!(0x98, Tya, Implied, 2);
    op!(0x48, Pha, Implied, 3); op!(0x08, Php, Implied, 3); op!(0x68, Pla, Implied, 4);
    op!(0x28, Plp, Implied, 4);
    op!(0xEA, Nop, Implied, 2);

    // Undocumented: combined read-modify-write + ALU
    op!(0x07, Slo, ZeroPage, 5); op!(0x17, Slo, ZeroPageX, 6); op!(0x0F, Slo, Absolute, 6);
    op!(0x1F, Slo, AbsoluteX, 7); op!(0x1B, Slo, AbsoluteY, 7); op!(0x03, Slo, IndirectX, 8);
    op!(0x13, Slo, IndirectY, 8);
    op!(0x27, Rla, ZeroPage, 5); op!(0x37, Rla, ZeroPageX, 6); op!(0x2F, Rla, Absolute, 6);
    op!(0x3F, Rla, AbsoluteX, 7); op!(0x3B, Rla, AbsoluteY, 7); op!(0x23, Rla, IndirectX, 8);
    op!(0x33, Rla, IndirectY, 8);
    op!(0x47, Sre, ZeroPage, 5); op!(0x57, Sre, ZeroPageX, 6); op!(0x4F, Sre, Absolute, 6);
    op!(0x5F, Sre, AbsoluteX, 7); op!(0x5B, Sre, AbsoluteY, 7); op!(0x43, Sre, IndirectX, 8);
    op!(0x53, Sre, IndirectY, 8);
    op!(0x67, Rra, ZeroPage, 5); op!(0x77, Rra, ZeroPageX, 6); op!(0x6F, Rra, Absolute, 6);
    op!(0x7F, Rra, AbsoluteX, 7); op!(0x7B, Rra, AbsoluteY, 7); op!(0x63, Rra, IndirectX, 8);
    op!(0x73, Rra, IndirectY, 8);
    op!(0xC7, Dcp, ZeroPage, 5); op!(0xD7, Dcp, ZeroPageX, 6); op!(0xCF, Dcp, Absolute, 6);
    op!(0xDF, Dcp, AbsoluteX, 7); op!(0xDB, Dcp, AbsoluteY, 7); op!(0xC3, Dcp, IndirectX, 8);
    op!(0xD3, Dcp, IndirectY, 8);
    op!(0xE7, Isc, ZeroPage, 5); op!(0xF7, Isc, ZeroPageX, 6); op!(0xEF, Isc, Absolute, 6);
    op!(0xFF, Isc, AbsoluteX, 7); op!(0xFB, Isc, AbsoluteY, 7); op!(0xE3, Isc, IndirectX, 8);
    op!(0xF3, Isc, IndirectY, 8);

    // Undocumented: loads and stores
    op!(0xA7, Lax, ZeroPage, 3); op!(0xB7, Lax, ZeroPageY, 4); op!(0xAF, Lax, Absolute, 4);
    op!(0xBF, Lax, AbsoluteY, 4, +); op!(0xA3, Lax, IndirectX, 6); op!(0xB3, Lax, IndirectY, 5, +);
    op!(0x87, Sax, ZeroPage, 3); op!(0x97, Sax, ZeroPageY, 4); op!(0x8F, Sax, Absolute, 4);
    op!(0x83, Sax, IndirectX, 6);
    op!(0xBB, Las, AbsoluteY, 4, +);
    op!(0x9F, Sha, AbsoluteY, 5); op!(0x93, Sha, IndirectY, 6);
    op!(0x9E, Shx, AbsoluteY, 5); op!(0x9C, Shy, AbsoluteX, 5); op!(0x9B, Tas, AbsoluteY, 5);

    // Undocumented: immediate
    op!(0x0B, Anc, Immediate, 2); op!(0x2B, Anc, Immediate, 2); op!(0x4B, Alr, Immediate, 2);
    op!(0x6B, Arr, Immediate, 2); op!(0x8B, Xaa, Immediate, 2); op!(0xAB, Lxa, Immediate, 2);
    op!(0xCB, Axs, Immediate, 2); op!(0xEB, Sbc, Immediate, 2);

    // Undocumented NOPs
    op!(0x1A, Nop, Implied, 2); op!(0x3A, Nop, Implied, 2); op!(0x5A, Nop, Implied, 2);
    op!(0x7A, Nop, Implied, 2); op!(0xDA, Nop, Implied, 2); op!(0xFA, Nop, Implied, 2);
    op!(0x80, Nop, Immediate, 2); op!(0x82, Nop, Immediate, 2); op!(0x89, Nop, Immediate, 2);
    op!(0xC2, Nop, Immediate, 2); op!(0xE2, Nop, Immediate, 2);
    op!(0x04, Nop, ZeroPage, 3); op!(0x44, Nop, ZeroPage, 3); op!(0x64, Nop, ZeroPage, 3);
    op!(0x14, Nop, ZeroPageX, 4); op!(0x34, Nop, ZeroPageX, 4); op!(0x54, Nop, ZeroPageX, 4);
    op!(0x74, Nop, ZeroPageX, 4); op!(0xD4, Nop, ZeroPageX, 4); op!(0xF4, Nop, ZeroPageX, 4);
    op!(0x0C, Nop, Absolute, 4);
    op!(0x1C, Nop, AbsoluteX, 4, +); op!(0x3C, Nop, AbsoluteX, 4, +); op!(0x5C, Nop, AbsoluteX, 4, +);
    op!(0x7C, Nop, AbsoluteX, 4, +); op!(0xDC, Nop, AbsoluteX, 4, +); op!(0xFC, Nop, AbsoluteX, 4, +);

    // Fix up opcodes, JAM slots and the undocumented marker in one pass.
    let mut i = 0;
    while i < 256 {
        t[i].opcode = i as u8;
        t[i].undocumented = is_undocumented(t[i].op) || (matches!(t[i].op, Nop) && i != 0xEA);
        i += 1;
    }
    t[0xEB].undocumented = true;
    t
}

const fn is_undocumented(op: Op) -> bool {
    matches!(
        op,
        Alr | Anc | Arr | Axs | Dcp | Isc | Jam | Las | Lax | Lxa | Rla | Rra | Sax | Sha | Shx
            | Shy | Slo | Sre | Tas | Xaa
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_field_matches_index() {
        for (i, ins) in INSTRUCTIONS.iter().enumerate() {
            assert_eq!(ins.opcode as usize, i);
        }
    }

    #[test]
    fn exactly_twelve_jams() {
        let jams: Vec<u8> = INSTRUCTIONS
            .iter()
            .filter(|i| i.op == Jam)
            .map(|i| i.opcode)
            .collect();
        assert_eq!(
            jams,
            vec![0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2]
        );
    }

    #[test]
    fn documented_set_has_151_opcodes() {
        assert_eq!(INSTRUCTIONS.iter().filter(|i| !i.undocumented).count(), 151);
    }

    #[test]
    fn lengths_follow_modes() {
        assert_eq!(INSTRUCTIONS[0xA9].len, 2);
        assert_eq!(INSTRUCTIONS[0x6C].len, 3);
        assert_eq!(INSTRUCTIONS[0x0A].len, 1);
        assert!(INSTRUCTIONS[0xB1].page_penalty);
        assert!(!INSTRUCTIONS[0x91].page_penalty);
    }
}
