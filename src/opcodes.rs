//! Opcode table: the operation and addressing mode behind each of the 256
//! opcode bytes. Slots with no documented instruction decode as `Illegal`.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    // Load / store
    Lda, Ldx, Ldy, Sta, Stx, Sty,
    // Arithmetic
    Adc, Sbc,
    // Increment / decrement
    Inc, Inx, Iny, Dec, Dex, Dey,
    // Shift / rotate
    Asl, Lsr, Rol, Ror,
    // Logic
    And, Ora, Eor,
    // Compare / bit test
    Cmp, Cpx, Cpy, Bit,
    // Branch
    Bcc, Bcs, Bne, Beq, Bpl, Bmi, Bvc, Bvs,
    // Transfer
    Tax, Txa, Tay, Tya, Tsx, Txs,
    // Stack
    Pha, Pla, Php, Plp,
    // Jump / subroutine
    Jmp, Jsr, Rts, Rti,
    // Flags
    Clc, Sec, Cld, Sed, Cli, Sei, Clv,
    // Misc
    Brk, Nop,
    /// Slot with no documented instruction.
    Illegal,
}

impl Operation {
    #[rustfmt::skip]
    pub fn name(self) -> &'static str {
        use Operation::*;
        match self {
            Lda => "LDA", Ldx => "LDX", Ldy => "LDY",
            Sta => "STA", Stx => "STX", Sty => "STY",
            Adc => "ADC", Sbc => "SBC",
            Inc => "INC", Inx => "INX", Iny => "INY",
            Dec => "DEC", Dex => "DEX", Dey => "DEY",
            Asl => "ASL", Lsr => "LSR", Rol => "ROL", Ror => "ROR",
            And => "AND", Ora => "ORA", Eor => "EOR",
            Cmp => "CMP", Cpx => "CPX", Cpy => "CPY", Bit => "BIT",
            Bcc => "BCC", Bcs => "BCS", Bne => "BNE", Beq => "BEQ",
            Bpl => "BPL", Bmi => "BMI", Bvc => "BVC", Bvs => "BVS",
            Tax => "TAX", Txa => "TXA", Tay => "TAY", Tya => "TYA",
            Tsx => "TSX", Txs => "TXS",
            Pha => "PHA", Pla => "PLA", Php => "PHP", Plp => "PLP",
            Jmp => "JMP", Jsr => "JSR", Rts => "RTS", Rti => "RTI",
            Clc => "CLC", Sec => "SEC", Cld => "CLD", Sed => "SED",
            Cli => "CLI", Sei => "SEI", Clv => "CLV",
            Brk => "BRK", Nop => "NOP",
            Illegal => "ILLEGAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingMode {
    Accumulator,
    Implied,
    Immediate,
    Absolute,
    ZeroPage,
    Relative,
    AbsoluteIndirect,
    AbsoluteIndexedX,
    AbsoluteIndexedY,
    ZeroPageIndexedX,
    ZeroPageIndexedY,
    /// `(zp,x)`: index first, then read the pointer.
    ZeroPageIndirectIndexedX,
    /// `(zp),y`: read the pointer, then index.
    ZeroPageIndexedIndirectY,
}

impl AddressingMode {
    /// Assembler-style notation, e.g. `zp,x` or `(zp),y`.
    pub fn name(self) -> &'static str {
        use AddressingMode::*;
        match self {
            Accumulator => "A",
            Implied => "i",
            Immediate => "#",
            Absolute => "a",
            ZeroPage => "zp",
            Relative => "r",
            AbsoluteIndirect => "(a)",
            AbsoluteIndexedX => "a,x",
            AbsoluteIndexedY => "a,y",
            ZeroPageIndexedX => "zp,x",
            ZeroPageIndexedY => "zp,y",
            ZeroPageIndirectIndexedX => "(zp,x)",
            ZeroPageIndexedIndirectY => "(zp),y",
        }
    }

    /// Number of operand bytes following the opcode.
    pub fn operand_bytes(self) -> u16 {
        use AddressingMode::*;
        match self {
            Accumulator | Implied => 0,
            Immediate | ZeroPage | Relative | ZeroPageIndexedX | ZeroPageIndexedY
            | ZeroPageIndirectIndexedX | ZeroPageIndexedIndirectY => 1,
            Absolute | AbsoluteIndirect | AbsoluteIndexedX | AbsoluteIndexedY => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub operation: Operation,
    pub mode: AddressingMode,
}

impl Instruction {
    pub const ILLEGAL: Instruction = Instruction {
        operation: Operation::Illegal,
        mode: AddressingMode::Implied,
    };

    pub fn is_illegal(&self) -> bool {
        self.operation == Operation::Illegal
    }
}

lazy_static! {
    /// Opcode byte to instruction. Undocumented opcodes decode to
    /// [`Instruction::ILLEGAL`].
    pub static ref OPCODE_TABLE: [Instruction; 256] = build_table();
}

pub fn decode(opcode: u8) -> Instruction {
    OPCODE_TABLE[opcode as usize]
}

fn build_table() -> [Instruction; 256] {
    use AddressingMode::*;
    use Operation::*;

    let entries: &[(u8, Operation, AddressingMode)] = &[
        (0x00, Brk, Implied),
        (0x01, Ora, ZeroPageIndirectIndexedX),
        (0x05, Ora, ZeroPage),
        (0x06, Asl, ZeroPage),
        (0x08, Php, Implied),
        (0x09, Ora, Immediate),
        (0x0A, Asl, Accumulator),
        (0x0D, Ora, Absolute),
        (0x0E, Asl, Absolute),

        (0x10, Bpl, Relative),
        (0x11, Ora, ZeroPageIndexedIndirectY),
        (0x15, Ora, ZeroPageIndexedX),
        (0x16, Asl, ZeroPageIndexedX),
        (0x18, Clc, Implied),
        (0x19, Ora, AbsoluteIndexedY),
        (0x1D, Ora, AbsoluteIndexedX),
        (0x1E, Asl, AbsoluteIndexedX),

        (0x20, Jsr, Absolute),
        (0x21, And, ZeroPageIndirectIndexedX),
        (0x24, Bit, ZeroPage),
        (0x25, And, ZeroPage),
        (0x26, Rol, ZeroPage),
        (0x28, Plp, Implied),
        (0x29, And, Immediate),
        (0x2A, Rol, Accumulator),
        (0x2C, Bit, Absolute),
        (0x2D, And, Absolute),
        (0x2E, Rol, Absolute),

        (0x30, Bmi, Relative),
        (0x31, And, ZeroPageIndexedIndirectY),
        (0x35, And, ZeroPageIndexedX),
        (0x36, Rol, ZeroPageIndexedX),
        (0x38, Sec, Implied),
        (0x39, And, AbsoluteIndexedY),
        (0x3D, And, AbsoluteIndexedX),
        (0x3E, Rol, AbsoluteIndexedX),

        (0x40, Rti, Implied),
        (0x41, Eor, ZeroPageIndirectIndexedX),
        (0x45, Eor, ZeroPage),
        (0x46, Lsr, ZeroPage),
        (0x48, Pha, Implied),
        (0x49, Eor, Immediate),
        (0x4A, Lsr, Accumulator),
        (0x4C, Jmp, Absolute),
        (0x4D, Eor, Absolute),
        (0x4E, Lsr, Absolute),

        (0x50, Bvc, Relative),
        (0x51, Eor, ZeroPageIndexedIndirectY),
        (0x55, Eor, ZeroPageIndexedX),
        (0x56, Lsr, ZeroPageIndexedX),
        (0x58, Cli, Implied),
        (0x59, Eor, AbsoluteIndexedY),
        (0x5D, Eor, AbsoluteIndexedX),
        (0x5E, Lsr, AbsoluteIndexedX),

        (0x60, Rts, Implied),
        (0x61, Adc, ZeroPageIndirectIndexedX),
        (0x65, Adc, ZeroPage),
        (0x66, Ror, ZeroPage),
        (0x68, Pla, Implied),
        (0x69, Adc, Immediate),
        (0x6A, Ror, Accumulator),
        (0x6C, Jmp, AbsoluteIndirect),
        (0x6D, Adc, Absolute),
        (0x6E, Ror, Absolute),

        (0x70, Bvs, Relative),
        (0x71, Adc, ZeroPageIndexedIndirectY),
        (0x75, Adc, ZeroPageIndexedX),
        (0x76, Ror, ZeroPageIndexedX),
        (0x78, Sei, Implied),
        (0x79, Adc, AbsoluteIndexedY),
        (0x7D, Adc, AbsoluteIndexedX),
        (0x7E, Ror, AbsoluteIndexedX),

        (0x81, Sta, ZeroPageIndirectIndexedX),
        (0x84, Sty, ZeroPage),
        (0x85, Sta, ZeroPage),
        (0x86, Stx, ZeroPage),
        (0x88, Dey, Implied),
        (0x89, Bit, Immediate),
        (0x8A, Txa, Implied),
        (0x8C, Sty, Absolute),
        (0x8D, Sta, Absolute),
        (0x8E, Stx, Absolute),

        (0x90, Bcc, Relative),
        (0x91, Sta, ZeroPageIndexedIndirectY),
        (0x94, Sty, ZeroPageIndexedX),
        (0x95, Sta, ZeroPageIndexedX),
        (0x96, Stx, ZeroPageIndexedY),
        (0x98, Tya, Implied),
        (0x99, Sta, AbsoluteIndexedY),
        (0x9A, Txs, Implied),
        (0x9D, Sta, AbsoluteIndexedX),

        (0xA0, Ldy, Immediate),
        (0xA1, Lda, ZeroPageIndirectIndexedX),
        (0xA2, Ldx, Immediate),
        (0xA4, Ldy, ZeroPage),
        (0xA5, Lda, ZeroPage),
        (0xA6, Ldx, ZeroPage),
        (0xA8, Tay, Implied),
        (0xA9, Lda, Immediate),
        (0xAA, Tax, Implied),
        (0xAC, Ldy, Absolute),
        (0xAD, Lda, Absolute),
        (0xAE, Ldx, Absolute),

        (0xB0, Bcs, Relative),
        (0xB1, Lda, ZeroPageIndexedIndirectY),
        (0xB4, Ldy, ZeroPageIndexedX),
        (0xB5, Lda, ZeroPageIndexedX),
        (0xB6, Ldx, ZeroPageIndexedY),
        (0xB8, Clv, Implied),
        (0xB9, Lda, AbsoluteIndexedY),
        (0xBA, Tsx, Implied),
        (0xBC, Ldy, AbsoluteIndexedX),
        (0xBD, Lda, AbsoluteIndexedX),
        (0xBE, Ldx, AbsoluteIndexedY),

        (0xC0, Cpy, Immediate),
        (0xC1, Cmp, ZeroPageIndirectIndexedX),
        (0xC4, Cpy, ZeroPage),
        (0xC5, Cmp, ZeroPage),
        (0xC6, Dec, ZeroPage),
        (0xC8, Iny, Implied),
        (0xC9, Cmp, Immediate),
        (0xCA, Dex, Implied),
        (0xCC, Cpy, Absolute),
        (0xCD, Cmp, Absolute),
        (0xCE, Dec, Absolute),

        (0xD0, Bne, Relative),
        (0xD1, Cmp, ZeroPageIndexedIndirectY),
        (0xD5, Cmp, ZeroPageIndexedX),
        (0xD6, Dec, ZeroPageIndexedX),
        (0xD8, Cld, Implied),
        (0xD9, Cmp, AbsoluteIndexedY),
        (0xDD, Cmp, AbsoluteIndexedX),
        (0xDE, Dec, AbsoluteIndexedX),

        (0xE0, Cpx, Immediate),
        (0xE1, Sbc, ZeroPageIndirectIndexedX),
        (0xE4, Cpx, ZeroPage),
        (0xE5, Sbc, ZeroPage),
        (0xE6, Inc, ZeroPage),
        (0xE8, Inx, Implied),
        (0xE9, Sbc, Immediate),
        (0xEA, Nop, Implied),
        (0xEC, Cpx, Absolute),
        (0xED, Sbc, Absolute),
        (0xEE, Inc, Absolute),

        (0xF0, Beq, Relative),
        (0xF1, Sbc, ZeroPageIndexedIndirectY),
        (0xF5, Sbc, ZeroPageIndexedX),
        (0xF6, Inc, ZeroPageIndexedX),
        (0xF8, Sed, Implied),
        (0xF9, Sbc, AbsoluteIndexedY),
        (0xFD, Sbc, AbsoluteIndexedX),
        (0xFE, Inc, AbsoluteIndexedX),
    ];

    let mut table = [Instruction::ILLEGAL; 256];
    for &(opcode, operation, mode) in entries {
        table[opcode as usize] = Instruction { operation, mode };
    }
    table
}
