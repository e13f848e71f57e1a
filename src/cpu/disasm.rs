//! Minimal 6502 disassembler used by the CPU trace and the host's `--disassemble` listing.

use std::fmt;

use crate::cpu::opcodes::{AddrMode, INSTRUCTIONS};

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub addr: u16,
    pub bytes: Vec<u8>,
    pub mnemonic: &'static str,
    pub operand: String,
    pub undocumented: bool,
}

impl fmt::Display for Line {
    /// nestest layout: `C000  4C F5 C5  JMP $C5F5`, undocumented opcodes marked with `*`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: Vec<String> = self.bytes.iter().map(|b| format!("{b:02X}")).collect();
        let marker = if self.undocumented { '*' } else { ' ' };
        write!(f, "{:04X}  {:<8} {marker}{}", self.addr, hex.join(" "), self.mnemonic)?;
        if !self.operand.is_empty() {
            write!(f, " {}", self.operand)?;
        }
        Ok(())
    }
}

/// Decode the instruction starting at `bytes[0]`, located at CPU address `addr`.
/// Operand bytes past the end of `bytes` read as zero.
pub fn decode(bytes: &[u8], addr: u16) -> Line {
    let opcode = bytes.first().copied().unwrap_or(0);
    let ins = &INSTRUCTIONS[opcode as usize];
    let byte = |i: usize| bytes.get(i).copied().unwrap_or(0);
    let lo = byte(1);
    let word = u16::from_le_bytes([lo, byte(2)]);

    let operand = match ins.mode {
        AddrMode::Implied => String::new(),
        AddrMode::Accumulator => "A".to_string(),
        AddrMode::Immediate => format!("#${lo:02X}"),
        AddrMode::ZeroPage => format!("${lo:02X}"),
        AddrMode::ZeroPageX => format!("${lo:02X},X"),
        AddrMode::ZeroPageY => format!("${lo:02X},Y"),
        AddrMode::Absolute => format!("${word:04X}"),
        AddrMode::AbsoluteX => format!("${word:04X},X"),
        AddrMode::AbsoluteY => format!("${word:04X},Y"),
        AddrMode::Indirect => format!("(${word:04X})"),
        AddrMode::IndirectX => format!("(${lo:02X},X)"),
        AddrMode::IndirectY => format!("(${lo:02X}),Y"),
        AddrMode::Relative => {
            let target = addr.wrapping_add(2).wrapping_add(lo as i8 as u16);
            format!("${target:04X}")
        }
    };

    let len = (ins.len as usize).min(bytes.len().max(1));
    Line {
        addr,
        bytes: (0..len).map(byte).collect(),
        mnemonic: ins.op.mnemonic(),
        operand,
        undocumented: ins.undocumented,
    }
}

/// Linear sweep over `prg`, which is mapped at `origin`.
pub fn disassemble(prg: &[u8], origin: u16) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut offset = 0usize;
    while offset < prg.len() {
        let addr = origin.wrapping_add(offset as u16);
        let line = decode(&prg[offset..], addr);
        offset += INSTRUCTIONS[prg[offset] as usize].len as usize;
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_nestest() {
        let line = decode(&[0x4C, 0xF5, 0xC5], 0xC000);
        assert_eq!(line.to_string(), "C000  4C F5 C5  JMP $C5F5");
    }

    #[test]
    fn branch_targets_are_absolute() {
        let line = decode(&[0xD0, 0xFE], 0x8010);
        assert_eq!(line.mnemonic, "BNE");
        assert_eq!(line.operand, "$8010");
    }

    #[test]
    fn undocumented_opcodes_are_marked() {
        let line = decode(&[0xA7, 0x10], 0x8000);
        assert!(line.undocumented);
        assert_eq!(line.to_string(), "8000  A7 10    *LAX $10");
    }

    #[test]
    fn sweep_advances_by_instruction_length() {
        let prg = [0xA9, 0x01, 0x8D, 0x00, 0x02, 0xEA, 0x6C, 0x00, 0x03];
        let lines = disassemble(&prg, 0x8000);
        let addrs: Vec<u16> = lines.iter().map(|l| l.addr).collect();
        assert_eq!(addrs, vec![0x8000, 0x8002, 0x8005, 0x8006]);
        assert_eq!(lines[1].operand, "$0200");
        assert_eq!(lines[3].operand, "($0300)");
    }

    #[test]
    fn truncated_operand_reads_zero() {
        let line = decode(&[0xAD], 0xFFFF);
        assert_eq!(line.operand, "$0000");
        assert_eq!(line.bytes, vec![0xAD]);
    }
}
