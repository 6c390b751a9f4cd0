//! Static decode table for the 2A03 instruction set.
//!
//! One entry per possible opcode byte. Undefined opcodes stay `None` and
//! surface as an illegal-opcode error in the core instead of undefined
//! dispatch. The table is built once in const context and never mutated.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
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

/// Semantic operation kinds. Dispatch is a single exhaustive match in the
/// core rather than one function pointer per opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
}

/// Decoded instruction attributes: addressing mode, base cycle cost,
/// whether a page crossing during address resolution adds one cycle, and
/// the operation to run. The mnemonic is diagnostic only.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub mnemonic: &'static str,
    pub mode: AddressMode,
    pub cycles: u8,
    pub page_cross: bool,
    pub op: Operation,
}

pub fn lookup(opcode: u8) -> Option<&'static Instruction> {
    INSTRUCTIONS[opcode as usize].as_ref()
}

const fn entry(
    mnemonic: &'static str,
    mode: AddressMode,
    cycles: u8,
    page_cross: bool,
    op: Operation,
) -> Option<Instruction> {
    Some(Instruction {
        mnemonic,
        mode,
        cycles,
        page_cross,
        op,
    })
}

pub static INSTRUCTIONS: [Option<Instruction>; 256] = build();

const fn build() -> [Option<Instruction>; 256] {
    use AddressMode::*;
    use Operation as Op;

    let mut t: [Option<Instruction>; 256] = [None; 256];

    t[0x00] = entry("BRK", Implied, 7, false, Op::Brk);
    t[0x01] = entry("ORA", IndirectX, 6, false, Op::Ora);
    t[0x05] = entry("ORA", ZeroPage, 3, false, Op::Ora);
    t[0x06] = entry("ASL", ZeroPage, 5, false, Op::Asl);
    t[0x08] = entry("PHP", Implied, 3, false, Op::Php);
    t[0x09] = entry("ORA", Immediate, 2, false, Op::Ora);
    t[0x0A] = entry("ASL", Accumulator, 2, false, Op::Asl);
    t[0x0D] = entry("ORA", Absolute, 4, false, Op::Ora);
    t[0x0E] = entry("ASL", Absolute, 6, false, Op::Asl);

    t[0x10] = entry("BPL", Relative, 2, false, Op::Bpl);
    t[0x11] = entry("ORA", IndirectY, 5, true, Op::Ora);
    t[0x15] = entry("ORA", ZeroPageX, 4, false, Op::Ora);
    t[0x16] = entry("ASL", ZeroPageX, 6, false, Op::Asl);
    t[0x18] = entry("CLC", Implied, 2, false, Op::Clc);
    t[0x19] = entry("ORA", AbsoluteY, 4, true, Op::Ora);
    t[0x1D] = entry("ORA", AbsoluteX, 4, true, Op::Ora);
    t[0x1E] = entry("ASL", AbsoluteX, 7, false, Op::Asl);

    t[0x20] = entry("JSR", Absolute, 6, false, Op::Jsr);
    t[0x21] = entry("AND", IndirectX, 6, false, Op::And);
    t[0x24] = entry("BIT", ZeroPage, 3, false, Op::Bit);
    t[0x25] = entry("AND", ZeroPage, 3, false, Op::And);
    t[0x26] = entry("ROL", ZeroPage, 5, false, Op::Rol);
    t[0x28] = entry("PLP", Implied, 4, false, Op::Plp);
    t[0x29] = entry("AND", Immediate, 2, false, Op::And);
    t[0x2A] = entry("ROL", Accumulator, 2, false, Op::Rol);
    t[0x2C] = entry("BIT", Absolute, 4, false, Op::Bit);
    t[0x2D] = entry("AND", Absolute, 4, false, Op::And);
    t[0x2E] = entry("ROL", Absolute, 6, false, Op::Rol);

    t[0x30] = entry("BMI", Relative, 2, false, Op::Bmi);
    t[0x31] = entry("AND", IndirectY, 5, true, Op::And);
    t[0x35] = entry("AND", ZeroPageX, 4, false, Op::And);
    t[0x36] = entry("ROL", ZeroPageX, 6, false, Op::Rol);
    t[0x38] = entry("SEC", Implied, 2, false, Op::Sec);
    t[0x39] = entry("AND", AbsoluteY, 4, true, Op::And);
    t[0x3D] = entry("AND", AbsoluteX, 4, true, Op::And);
    t[0x3E] = entry("ROL", AbsoluteX, 7, false, Op::Rol);

    t[0x40] = entry("RTI", Implied, 6, false, Op::Rti);
    t[0x41] = entry("EOR", IndirectX, 6, false, Op::Eor);
    t[0x45] = entry("EOR", ZeroPage, 3, false, Op::Eor);
    t[0x46] = entry("LSR", ZeroPage, 5, false, Op::Lsr);
    t[0x48] = entry("PHA", Implied, 3, false, Op::Pha);
    t[0x49] = entry("EOR", Immediate, 2, false, Op::Eor);
    t[0x4A] = entry("LSR", Accumulator, 2, false, Op::Lsr);
    t[0x4C] = entry("JMP", Absolute, 3, false, Op::Jmp);
    t[0x4D] = entry("EOR", Absolute, 4, false, Op::Eor);
    t[0x4E] = entry("LSR", Absolute, 6, false, Op::Lsr);

    t[0x50] = entry("BVC", Relative, 2, false, Op::Bvc);
    t[0x51] = entry("EOR", IndirectY, 5, true, Op::Eor);
    t[0x55] = entry("EOR", ZeroPageX, 4, false, Op::Eor);
    t[0x56] = entry("LSR", ZeroPageX, 6, false, Op::Lsr);
    t[0x58] = entry("CLI", Implied, 2, false, Op::Cli);
    t[0x59] = entry("EOR", AbsoluteY, 4, true, Op::Eor);
    t[0x5D] = entry("EOR", AbsoluteX, 4, true, Op::Eor);
    t[0x5E] = entry("LSR", AbsoluteX, 7, false, Op::Lsr);

    t[0x60] = entry("RTS", Implied, 6, false, Op::Rts);
    t[0x61] = entry("ADC", IndirectX, 6, false, Op::Adc);
    t[0x65] = entry("ADC", ZeroPage, 3, false, Op::Adc);
    t[0x66] = entry("ROR", ZeroPage, 5, false, Op::Ror);
    t[0x68] = entry("PLA", Implied, 4, false, Op::Pla);
    t[0x69] = entry("ADC", Immediate, 2, false, Op::Adc);
    t[0x6A] = entry("ROR", Accumulator, 2, false, Op::Ror);
    t[0x6C] = entry("JMP", Indirect, 5, false, Op::Jmp);
    t[0x6D] = entry("ADC", Absolute, 4, false, Op::Adc);
    t[0x6E] = entry("ROR", Absolute, 6, false, Op::Ror);

    t[0x70] = entry("BVS", Relative, 2, false, Op::Bvs);
    t[0x71] = entry("ADC", IndirectY, 5, true, Op::Adc);
    t[0x75] = entry("ADC", ZeroPageX, 4, false, Op::Adc);
    t[0x76] = entry("ROR", ZeroPageX, 6, false, Op::Ror);
    t[0x78] = entry("SEI", Implied, 2, false, Op::Sei);
    t[0x79] = entry("ADC", AbsoluteY, 4, true, Op::Adc);
    t[0x7D] = entry("ADC", AbsoluteX, 4, true, Op::Adc);
    t[0x7E] = entry("ROR", AbsoluteX, 7, false, Op::Ror);

    t[0x81] = entry("STA", IndirectX, 6, false, Op::Sta);
    t[0x84] = entry("STY", ZeroPage, 3, false, Op::Sty);
    t[0x85] = entry("STA", ZeroPage, 3, false, Op::Sta);
    t[0x86] = entry("STX", ZeroPage, 3, false, Op::Stx);
    t[0x88] = entry("DEY", Implied, 2, false, Op::Dey);
    t[0x8A] = entry("TXA", Implied, 2, false, Op::Txa);
    t[0x8C] = entry("STY", Absolute, 4, false, Op::Sty);
    t[0x8D] = entry("STA", Absolute, 4, false, Op::Sta);
    t[0x8E] = entry("STX", Absolute, 4, false, Op::Stx);

    t[0x90] = entry("BCC", Relative, 2, false, Op::Bcc);
    t[0x91] = entry("STA", IndirectY, 6, false, Op::Sta);
    t[0x94] = entry("STY", ZeroPageX, 4, false, Op::Sty);
    t[0x95] = entry("STA", ZeroPageX, 4, false, Op::Sta);
    t[0x96] = entry("STX", ZeroPageY, 4, false, Op::Stx);
    t[0x98] = entry("TYA", Implied, 2, false, Op::Tya);
    t[0x99] = entry("STA", AbsoluteY, 5, false, Op::Sta);
    t[0x9A] = entry("TXS", Implied, 2, false, Op::Txs);
    t[0x9D] = entry("STA", AbsoluteX, 5, false, Op::Sta);

    t[0xA0] = entry("LDY", Immediate, 2, false, Op::Ldy);
    t[0xA1] = entry("LDA", IndirectX, 6, false, Op::Lda);
    t[0xA2] = entry("LDX", Immediate, 2, false, Op::Ldx);
    t[0xA4] = entry("LDY", ZeroPage, 3, false, Op::Ldy);
    t[0xA5] = entry("LDA", ZeroPage, 3, false, Op::Lda);
    t[0xA6] = entry("LDX", ZeroPage, 3, false, Op::Ldx);
    t[0xA8] = entry("TAY", Implied, 2, false, Op::Tay);
    t[0xA9] = entry("LDA", Immediate, 2, false, Op::Lda);
    t[0xAA] = entry("TAX", Implied, 2, false, Op::Tax);
    t[0xAC] = entry("LDY", Absolute, 4, false, Op::Ldy);
    t[0xAD] = entry("LDA", Absolute, 4, false, Op::Lda);
    t[0xAE] = entry("LDX", Absolute, 4, false, Op::Ldx);

    t[0xB0] = entry("BCS", Relative, 2, false, Op::Bcs);
    t[0xB1] = entry("LDA", IndirectY, 5, true, Op::Lda);
    t[0xB4] = entry("LDY", ZeroPageX, 4, false, Op::Ldy);
    t[0xB5] = entry("LDA", ZeroPageX, 4, false, Op::Lda);
    t[0xB6] = entry("LDX", ZeroPageY, 4, false, Op::Ldx);
    t[0xB8] = entry("CLV", Implied, 2, false, Op::Clv);
    t[0xB9] = entry("LDA", AbsoluteY, 4, true, Op::Lda);
    t[0xBA] = entry("TSX", Implied, 2, false, Op::Tsx);
    t[0xBC] = entry("LDY", AbsoluteX, 4, true, Op::Ldy);
    t[0xBD] = entry("LDA", AbsoluteX, 4, true, Op::Lda);
    t[0xBE] = entry("LDX", AbsoluteY, 4, true, Op::Ldx);

    t[0xC0] = entry("CPY", Immediate, 2, false, Op::Cpy);
    t[0xC1] = entry("CMP", IndirectX, 6, false, Op::Cmp);
    t[0xC4] = entry("CPY", ZeroPage, 3, false, Op::Cpy);
    t[0xC5] = entry("CMP", ZeroPage, 3, false, Op::Cmp);
    t[0xC6] = entry("DEC", ZeroPage, 5, false, Op::Dec);
    t[0xC8] = entry("INY", Implied, 2, false, Op::Iny);
    t[0xC9] = entry("CMP", Immediate, 2, false, Op::Cmp);
    t[0xCA] = entry("DEX", Implied, 2, false, Op::Dex);
    t[0xCC] = entry("CPY", Absolute, 4, false, Op::Cpy);
    t[0xCD] = entry("CMP", Absolute, 4, false, Op::Cmp);
    t[0xCE] = entry("DEC", Absolute, 6, false, Op::Dec);

    t[0xD0] = entry("BNE", Relative, 2, false, Op::Bne);
    t[0xD1] = entry("CMP", IndirectY, 5, true, Op::Cmp);
    t[0xD5] = entry("CMP", ZeroPageX, 4, false, Op::Cmp);
    t[0xD6] = entry("DEC", ZeroPageX, 6, false, Op::Dec);
    t[0xD8] = entry("CLD", Implied, 2, false, Op::Cld);
    t[0xD9] = entry("CMP", AbsoluteY, 4, true, Op::Cmp);
    t[0xDD] = entry("CMP", AbsoluteX, 4, true, Op::Cmp);
    t[0xDE] = entry("DEC", AbsoluteX, 7, false, Op::Dec);

    t[0xE0] = entry("CPX", Immediate, 2, false, Op::Cpx);
    t[0xE1] = entry("SBC", IndirectX, 6, false, Op::Sbc);
    t[0xE4] = entry("CPX", ZeroPage, 3, false, Op::Cpx);
    t[0xE5] = entry("SBC", ZeroPage, 3, false, Op::Sbc);
    t[0xE6] = entry("INC", ZeroPage, 5, false, Op::Inc);
    t[0xE8] = entry("INX", Implied, 2, false, Op::Inx);
    t[0xE9] = entry("SBC", Immediate, 2, false, Op::Sbc);
    t[0xEA] = entry("NOP", Implied, 2, false, Op::Nop);
    t[0xEC] = entry("CPX", Absolute, 4, false, Op::Cpx);
    t[0xED] = entry("SBC", Absolute, 4, false, Op::Sbc);
    t[0xEE] = entry("INC", Absolute, 6, false, Op::Inc);

    t[0xF0] = entry("BEQ", Relative, 2, false, Op::Beq);
    t[0xF1] = entry("SBC", IndirectY, 5, true, Op::Sbc);
    t[0xF5] = entry("SBC", ZeroPageX, 4, false, Op::Sbc);
    t[0xF6] = entry("INC", ZeroPageX, 6, false, Op::Inc);
    t[0xF8] = entry("SED", Implied, 2, false, Op::Sed);
    t[0xF9] = entry("SBC", AbsoluteY, 4, true, Op::Sbc);
    t[0xFD] = entry("SBC", AbsoluteX, 4, true, Op::Sbc);
    t[0xFE] = entry("INC", AbsoluteX, 7, false, Op::Inc);

    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn official_opcode_count() {
        let defined = INSTRUCTIONS.iter().filter(|e| e.is_some()).count();
        assert_eq!(defined, 151);
    }

    #[test]
    fn undefined_slots_stay_empty() {
        // 0xFF sat past the end of the original 255-entry table; here it is
        // an explicit illegal slot like every other hole.
        assert!(lookup(0xFF).is_none());
        assert!(lookup(0x02).is_none());
        assert!(lookup(0x80).is_none());
    }

    #[test]
    fn relative_entries_are_branches() {
        for instr in INSTRUCTIONS.iter().flatten() {
            if instr.mode == AddressMode::Relative {
                assert_eq!(instr.cycles, 2, "{}", instr.mnemonic);
                assert!(!instr.page_cross, "{}", instr.mnemonic);
            }
        }
    }

    #[test]
    fn store_never_takes_cross_penalty() {
        for instr in INSTRUCTIONS.iter().flatten() {
            if matches!(instr.op, Operation::Sta | Operation::Stx | Operation::Sty) {
                assert!(!instr.page_cross, "{}", instr.mnemonic);
            }
        }
    }

    #[test]
    fn spot_check_entries() {
        let lda_abs_x = lookup(0xBD).unwrap();
        assert_eq!(lda_abs_x.mnemonic, "LDA");
        assert_eq!(lda_abs_x.mode, AddressMode::AbsoluteX);
        assert_eq!(lda_abs_x.cycles, 4);
        assert!(lda_abs_x.page_cross);

        let sta_abs_x = lookup(0x9D).unwrap();
        assert_eq!(sta_abs_x.cycles, 5);
        assert!(!sta_abs_x.page_cross);

        let jmp_ind = lookup(0x6C).unwrap();
        assert_eq!(jmp_ind.mode, AddressMode::Indirect);
        assert_eq!(jmp_ind.cycles, 5);

        let brk = lookup(0x00).unwrap();
        assert_eq!(brk.cycles, 7);
        assert_eq!(brk.mode, AddressMode::Implied);
    }
}
