//! Operand resolution for the thirteen addressing modes.

use serde::{Deserialize, Serialize};

use crate::memory::Memory;
use crate::opcodes::AddressingMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// No operand bytes: accumulator and implied instructions.
    None,
    Immediate(u8),
    Address(u16),
}

fn next_byte(pc: &mut u16, memory: &mut Memory) -> u8 {
    let value = memory.read(*pc);
    *pc = pc.wrapping_add(1);
    value
}

fn next_word(pc: &mut u16, memory: &mut Memory) -> u16 {
    let low = next_byte(pc, memory) as u16;
    let high = next_byte(pc, memory) as u16;
    (high << 8) | low
}

/// Consumes the operand bytes at `pc` for `mode` and returns the immediate
/// value or effective address they describe.
pub fn resolve(mode: AddressingMode, pc: &mut u16, x: u8, y: u8, memory: &mut Memory) -> Operand {
    use AddressingMode::*;

    match mode {
        Accumulator | Implied => Operand::None,

        Immediate => Operand::Immediate(next_byte(pc, memory)),

        Absolute => Operand::Address(next_word(pc, memory)),

        ZeroPage => Operand::Address(next_byte(pc, memory) as u16),

        Relative => {
            let offset = next_byte(pc, memory) as i8;
            Operand::Address(pc.wrapping_add(offset as u16))
        }

        AbsoluteIndirect => {
            let pointer = next_word(pc, memory);
            Operand::Address(memory.read_u16(pointer))
        }

        AbsoluteIndexedX => Operand::Address(next_word(pc, memory).wrapping_add(x as u16)),
        AbsoluteIndexedY => Operand::Address(next_word(pc, memory).wrapping_add(y as u16)),

        // zero page indexing wraps inside page zero
        ZeroPageIndexedX => Operand::Address(next_byte(pc, memory).wrapping_add(x) as u16),
        ZeroPageIndexedY => Operand::Address(next_byte(pc, memory).wrapping_add(y) as u16),

        ZeroPageIndirectIndexedX => {
            let pointer = next_byte(pc, memory).wrapping_add(x) as u16;
            Operand::Address(memory.read_u16(pointer))
        }

        ZeroPageIndexedIndirectY => {
            let pointer = next_byte(pc, memory) as u16;
            Operand::Address(memory.read_u16(pointer).wrapping_add(y as u16))
        }
    }
}
