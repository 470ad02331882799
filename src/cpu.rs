use log::{error, info, trace, warn};

use crate::addressing::{resolve, Operand};
use crate::memory::Memory;
use crate::metrics::{record_illegal_opcode, record_instruction, record_reset, Timer};
use crate::opcodes::{decode, AddressingMode, Instruction, Operation};

#[derive(Debug)]
pub struct CPU {
    // Registers (public for snapshot support)
    pub a: u8,      // Accumulator
    pub x: u8,      // X Index Register
    pub y: u8,      // Y Index Register
    pub pc: u16,    // Program Counter
    pub sp: u8,     // Stack Pointer (offset into page $01)
    pub status: u8, // Status Register

    // Internal state
    pub steps: u64,
    pub halted: bool,
    reset_stack_pointer: u8,
}

// Status register flags
pub const CARRY_FLAG: u8 = 0x01;
pub const ZERO_FLAG: u8 = 0x02;
pub const INTERRUPT_DISABLE: u8 = 0x04;
pub const DECIMAL_MODE: u8 = 0x08;
pub const BREAK_COMMAND: u8 = 0x10;
pub const UNUSED_FLAG: u8 = 0x20;
pub const OVERFLOW_FLAG: u8 = 0x40;
pub const NEGATIVE_FLAG: u8 = 0x80;

pub const RESET_VECTOR: u16 = 0xFFFC;
pub const BRK_VECTOR: u16 = 0xFFFE;
pub const STACK_PAGE: u16 = 0x0100;
pub const DEFAULT_STACK_POINTER: u8 = 0xFD;

/// What a single call to [`CPU::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Executed(Instruction),
    /// The opcode has no table entry; only the fetch took place.
    IllegalOpcode { opcode: u8, pc: u16 },
    /// The machine was halted; nothing was fetched.
    Halted,
}

impl Default for CPU {
    fn default() -> Self {
        Self::new()
    }
}

impl CPU {
    pub fn new() -> Self {
        Self::with_stack_pointer(DEFAULT_STACK_POINTER)
    }

    /// A CPU whose reset leaves S at `stack_pointer` instead of $FD.
    pub fn with_stack_pointer(stack_pointer: u8) -> Self {
        CPU {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: stack_pointer,
            status: UNUSED_FLAG | INTERRUPT_DISABLE,
            steps: 0,
            halted: false,
            reset_stack_pointer: stack_pointer,
        }
    }

    pub fn reset(&mut self, memory: &mut Memory) {
        self.sp = self.reset_stack_pointer;
        self.pc = memory.read_u16(RESET_VECTOR);
        self.status = UNUSED_FLAG | BREAK_COMMAND | INTERRUPT_DISABLE | ZERO_FLAG;
        self.halted = false;
        memory.control().clear_halt();

        info!("reset address: ${:04X}", self.pc);
        record_reset();
    }

    /// Fetch, decode and execute one instruction.
    pub fn step(&mut self, memory: &mut Memory) -> StepResult {
        if self.halted {
            return StepResult::Halted;
        }

        let opcode_pc = self.pc;
        let opcode = memory.read(self.pc);
        self.pc = self.pc.wrapping_add(1);

        let instruction = decode(opcode);
        let result = if instruction.is_illegal() {
            warn!("illegal opcode ${:02X} at ${:04X}", opcode, opcode_pc);
            record_illegal_opcode(opcode);
            StepResult::IllegalOpcode { opcode, pc: opcode_pc }
        } else {
            let timer = Timer::new();
            let operand_pc = self.pc;
            let operand = resolve(instruction.mode, &mut self.pc, self.x, self.y, memory);
            debug_assert_eq!(
                self.pc.wrapping_sub(operand_pc),
                instruction.mode.operand_bytes()
            );
            trace!(
                "${:04X}: {} {} {:?}",
                opcode_pc,
                instruction.operation.name(),
                instruction.mode.name(),
                operand
            );

            self.execute(instruction, operand, memory);
            record_instruction(opcode, instruction.operation.name(), timer.elapsed());
            StepResult::Executed(instruction)
        };

        self.steps += 1;
        self.service_control_line(memory);
        result
    }

    // Devices can only raise requests; they are acted on between instructions.
    fn service_control_line(&mut self, memory: &mut Memory) {
        if memory.control().take_reset() {
            self.reset(memory);
        }
        if memory.control().halt_requested() {
            self.halted = true;
        }
    }

    fn execute(&mut self, instruction: Instruction, operand: Operand, memory: &mut Memory) {
        use Operation::*;
        let mode = instruction.mode;

        match instruction.operation {
            // Load / store
            Lda => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.a = value;
                    self.update_zero_and_negative_flags(self.a);
                }
            }
            Ldx => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.x = value;
                    self.update_zero_and_negative_flags(self.x);
                }
            }
            Ldy => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.y = value;
                    self.update_zero_and_negative_flags(self.y);
                }
            }
            Sta => self.store(mode, operand, self.a, memory),
            Stx => self.store(mode, operand, self.x, memory),
            Sty => self.store(mode, operand, self.y, memory),

            // Arithmetic
            Adc => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.adc(value);
                }
            }
            Sbc => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.sbc(value);
                }
            }

            // Increment / decrement
            Inc => self.read_modify_write(mode, operand, memory, |_, value| value.wrapping_add(1)),
            Dec => self.read_modify_write(mode, operand, memory, |_, value| value.wrapping_sub(1)),
            Inx => {
                self.x = self.x.wrapping_add(1);
                self.update_zero_and_negative_flags(self.x);
            }
            Iny => {
                self.y = self.y.wrapping_add(1);
                self.update_zero_and_negative_flags(self.y);
            }
            Dex => {
                self.x = self.x.wrapping_sub(1);
                self.update_zero_and_negative_flags(self.x);
            }
            Dey => {
                self.y = self.y.wrapping_sub(1);
                self.update_zero_and_negative_flags(self.y);
            }

            // Shift / rotate: carry comes from the bit shifted out
            Asl => self.read_modify_write(mode, operand, memory, |cpu, value| {
                cpu.set_flag(CARRY_FLAG, value & 0x80 != 0);
                value << 1
            }),
            Lsr => self.read_modify_write(mode, operand, memory, |cpu, value| {
                cpu.set_flag(CARRY_FLAG, value & 0x01 != 0);
                value >> 1
            }),
            Rol => self.read_modify_write(mode, operand, memory, |cpu, value| {
                let carry_in = cpu.get_flag(CARRY_FLAG) as u8;
                cpu.set_flag(CARRY_FLAG, value & 0x80 != 0);
                (value << 1) | carry_in
            }),
            Ror => self.read_modify_write(mode, operand, memory, |cpu, value| {
                let carry_in = cpu.get_flag(CARRY_FLAG) as u8;
                cpu.set_flag(CARRY_FLAG, value & 0x01 != 0);
                (value >> 1) | (carry_in << 7)
            }),

            // Logic
            And => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.a &= value;
                    self.update_zero_and_negative_flags(self.a);
                }
            }
            Ora => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.a |= value;
                    self.update_zero_and_negative_flags(self.a);
                }
            }
            Eor => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.a ^= value;
                    self.update_zero_and_negative_flags(self.a);
                }
            }

            // Compare / bit test
            Cmp => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.compare(self.a, value);
                }
            }
            Cpx => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.compare(self.x, value);
                }
            }
            Cpy => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.compare(self.y, value);
                }
            }
            Bit => {
                if let Some(value) = self.operand_value(mode, operand, memory) {
                    self.set_flag(NEGATIVE_FLAG, value & 0x80 != 0);
                    self.set_flag(OVERFLOW_FLAG, value & 0x40 != 0);
                    self.set_flag(ZERO_FLAG, value & self.a == 0);
                }
            }

            // Branch
            Bcc => self.branch_if(operand, !self.get_flag(CARRY_FLAG)),
            Bcs => self.branch_if(operand, self.get_flag(CARRY_FLAG)),
            Bne => self.branch_if(operand, !self.get_flag(ZERO_FLAG)),
            Beq => self.branch_if(operand, self.get_flag(ZERO_FLAG)),
            Bpl => self.branch_if(operand, !self.get_flag(NEGATIVE_FLAG)),
            Bmi => self.branch_if(operand, self.get_flag(NEGATIVE_FLAG)),
            Bvc => self.branch_if(operand, !self.get_flag(OVERFLOW_FLAG)),
            Bvs => self.branch_if(operand, self.get_flag(OVERFLOW_FLAG)),

            // Transfer
            Tax => {
                self.x = self.a;
                self.update_zero_and_negative_flags(self.x);
            }
            Txa => {
                self.a = self.x;
                self.update_zero_and_negative_flags(self.a);
            }
            Tay => {
                self.y = self.a;
                self.update_zero_and_negative_flags(self.y);
            }
            Tya => {
                self.a = self.y;
                self.update_zero_and_negative_flags(self.a);
            }
            Tsx => {
                self.x = self.sp;
                self.update_zero_and_negative_flags(self.x);
            }
            // TXS leaves the flags alone
            Txs => self.sp = self.x,

            // Stack
            Pha => self.push(memory, self.a),
            Pla => {
                self.a = self.pop(memory);
                self.update_zero_and_negative_flags(self.a);
            }
            Php => self.push(memory, self.status),
            Plp => self.status = self.pop(memory) | UNUSED_FLAG,

            // Jump / subroutine
            Jmp => {
                if let Some(target) = self.jump_target(operand) {
                    self.pc = target;
                }
            }
            Jsr => {
                if let Some(target) = self.jump_target(operand) {
                    self.push_u16(memory, self.pc.wrapping_sub(1));
                    self.pc = target;
                }
            }
            Rts => self.pc = self.pop_u16(memory).wrapping_add(1),
            Rti => {
                self.status = self.pop(memory) | UNUSED_FLAG;
                self.pc = self.pop_u16(memory);
            }

            // Flags
            Clc => self.set_flag(CARRY_FLAG, false),
            Sec => self.set_flag(CARRY_FLAG, true),
            Cld => self.set_flag(DECIMAL_MODE, false),
            Sed => self.set_flag(DECIMAL_MODE, true),
            Cli => self.set_flag(INTERRUPT_DISABLE, false),
            Sei => self.set_flag(INTERRUPT_DISABLE, true),
            Clv => self.set_flag(OVERFLOW_FLAG, false),

            Brk => {
                self.push_u16(memory, self.pc);
                self.push(memory, self.status);
                self.set_flag(BREAK_COMMAND | INTERRUPT_DISABLE, true);
                self.pc = memory.read_u16(BRK_VECTOR);
            }

            Nop => {}

            // filtered out by step()
            Illegal => {}
        }
    }

    // Getters
    pub fn get_register_a(&self) -> u8 { self.a }
    pub fn get_register_x(&self) -> u8 { self.x }
    pub fn get_register_y(&self) -> u8 { self.y }
    pub fn get_pc(&self) -> u16 { self.pc }
    pub fn get_sp(&self) -> u8 { self.sp }
    pub fn get_status(&self) -> u8 { self.status }
    pub fn get_steps(&self) -> u64 { self.steps }
    pub fn is_halted(&self) -> bool { self.halted }

    // Flag operations
    pub fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.status |= flag;
        } else {
            self.status &= !flag;
        }
    }

    pub fn get_flag(&self, flag: u8) -> bool {
        (self.status & flag) != 0
    }

    fn update_zero_and_negative_flags(&mut self, value: u8) {
        self.set_flag(ZERO_FLAG, value == 0);
        self.set_flag(NEGATIVE_FLAG, (value & 0x80) != 0);
    }

    // Operand access

    fn operand_value(&mut self, mode: AddressingMode, operand: Operand, memory: &mut Memory) -> Option<u8> {
        match (mode, operand) {
            (AddressingMode::Accumulator, _) => Some(self.a),
            (AddressingMode::AbsoluteIndirect, _) => {
                error!("cannot read the value of an absolute indirect operand");
                None
            }
            (_, Operand::Immediate(value)) => Some(value),
            (_, Operand::Address(address)) => Some(memory.read(address)),
            (_, Operand::None) => {
                error!("cannot read the value of an implied operand");
                None
            }
        }
    }

    /// Writes through the operand. Every successful memory store also sets
    /// N/Z from the stored value; accumulator writes leave the flags alone.
    fn store(&mut self, mode: AddressingMode, operand: Operand, value: u8, memory: &mut Memory) {
        match (mode, operand) {
            (AddressingMode::Accumulator, _) => {
                self.a = value;
                return;
            }
            (AddressingMode::AbsoluteIndirect, _) => {
                error!("cannot write to an absolute indirect operand");
                return;
            }
            (_, Operand::Address(address)) => memory.write(address, value),
            (_, Operand::Immediate(_)) => {
                error!("cannot write to an immediate operand");
                return;
            }
            (_, Operand::None) => {
                error!("cannot write to an implied operand");
                return;
            }
        }
        self.update_zero_and_negative_flags(value);
    }

    // One read and one write, both at the resolved operand.
    fn read_modify_write<F>(&mut self, mode: AddressingMode, operand: Operand, memory: &mut Memory, op: F)
    where
        F: FnOnce(&mut Self, u8) -> u8,
    {
        if let Some(value) = self.operand_value(mode, operand, memory) {
            let result = op(self, value);
            self.store(mode, operand, result, memory);
        }
    }

    fn jump_target(&self, operand: Operand) -> Option<u16> {
        match operand {
            Operand::Address(target) => Some(target),
            other => {
                error!("jump without an address operand: {:?}", other);
                None
            }
        }
    }

    // Arithmetic. Carry and overflow are both taken from the 9-bit result.

    fn adc(&mut self, value: u8) {
        let carry = self.get_flag(CARRY_FLAG) as u16;
        let sum = self.a as u16 + value as u16 + carry;
        self.set_flag(CARRY_FLAG | OVERFLOW_FLAG, sum > 0xFF);
        self.a = sum as u8;
        self.update_zero_and_negative_flags(self.a);
    }

    fn sbc(&mut self, value: u8) {
        let borrow = !self.get_flag(CARRY_FLAG) as i16;
        let difference = self.a as i16 - value as i16 - borrow;
        self.set_flag(CARRY_FLAG | OVERFLOW_FLAG, !(0..=0xFF).contains(&difference));
        self.a = difference as u8;
        self.update_zero_and_negative_flags(self.a);
    }

    /// Signed three-way compare of `register` against `operand`.
    fn compare(&mut self, register: u8, operand: u8) {
        let (register, operand) = (register as i8, operand as i8);
        if register < operand {
            self.set_flag(NEGATIVE_FLAG, true);
            self.set_flag(ZERO_FLAG | CARRY_FLAG, false);
        } else if register == operand {
            self.set_flag(ZERO_FLAG | CARRY_FLAG, true);
            self.set_flag(NEGATIVE_FLAG, false);
        } else {
            self.set_flag(CARRY_FLAG, true);
            self.set_flag(NEGATIVE_FLAG | ZERO_FLAG, false);
        }
    }

    fn branch_if(&mut self, operand: Operand, condition: bool) {
        if !condition {
            return;
        }
        if let Some(target) = self.jump_target(operand) {
            self.pc = target;
        }
    }

    // Stack operations
    pub fn push(&mut self, memory: &mut Memory, value: u8) {
        memory.write(STACK_PAGE + self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    pub fn pop(&mut self, memory: &mut Memory) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        memory.read(STACK_PAGE + self.sp as u16)
    }

    fn push_u16(&mut self, memory: &mut Memory, value: u16) {
        self.push(memory, (value >> 8) as u8);
        self.push(memory, (value & 0xFF) as u8);
    }

    fn pop_u16(&mut self, memory: &mut Memory) -> u16 {
        let low = self.pop(memory) as u16;
        let high = self.pop(memory) as u16;
        (high << 8) | low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Region;
    use crate::regions::{Ram, Rom, CONTROL_HALT, IO_CONTROL, RAM_END, RAM_START, ROM_END, ROM_START};
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    const START: u16 = 0x8000;

    fn machine(program: &[u8]) -> (CPU, Memory) {
        let mut memory = Memory::new();
        memory.map(RAM_START, RAM_END, Box::new(Ram::new())).unwrap();
        memory
            .map_rom(ROM_START, ROM_END, Box::new(Rom::new(ROM_START, ROM_END)))
            .unwrap();
        memory.load_rom(program, START).unwrap();
        // Reset vector $8000, BRK vector $9000
        memory.load_rom(&[0x00, 0x80, 0x00, 0x90], RESET_VECTOR).unwrap();

        let mut cpu = CPU::new();
        cpu.reset(&mut memory);
        (cpu, memory)
    }

    fn run(cpu: &mut CPU, memory: &mut Memory, steps: usize) {
        for _ in 0..steps {
            cpu.step(memory);
        }
    }

    #[test]
    fn test_reset_state() {
        let (cpu, _) = machine(&[]);

        assert_eq!(cpu.get_pc(), START);
        assert_eq!(cpu.get_sp(), 0xFD);
        assert_eq!(
            cpu.get_status(),
            UNUSED_FLAG | BREAK_COMMAND | INTERRUPT_DISABLE | ZERO_FLAG
        );
    }

    #[test]
    fn test_reset_with_configured_stack_pointer() {
        let (_, mut memory) = machine(&[]);
        let mut cpu = CPU::with_stack_pointer(0xFF);
        cpu.reset(&mut memory);

        assert_eq!(cpu.get_sp(), 0xFF);
    }

    #[test]
    fn test_lda_immediate() {
        // LDA #$42
        let (mut cpu, mut memory) = machine(&[0xA9, 0x42]);
        let result = cpu.step(&mut memory);

        assert_eq!(
            result,
            StepResult::Executed(Instruction {
                operation: Operation::Lda,
                mode: AddressingMode::Immediate
            })
        );
        assert_eq!(cpu.get_register_a(), 0x42);
        assert_eq!(cpu.get_pc(), 0x8002);
        assert!(!cpu.get_flag(ZERO_FLAG));
        assert!(!cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_zero_and_negative_for_every_value() {
        let mut cpu = CPU::new();
        for value in 0..=255u8 {
            cpu.update_zero_and_negative_flags(value);
            assert_eq!(cpu.get_flag(NEGATIVE_FLAG), value & 0x80 != 0);
            assert_eq!(cpu.get_flag(ZERO_FLAG), value == 0);
        }
    }

    #[test]
    fn test_adc_from_zero() {
        // ADC #$01
        let (mut cpu, mut memory) = machine(&[0x69, 0x01]);
        cpu.step(&mut memory);

        assert_eq!(cpu.get_register_a(), 0x01);
        assert!(!cpu.get_flag(CARRY_FLAG));
        assert!(!cpu.get_flag(ZERO_FLAG));
        assert!(!cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_adc_sets_carry_and_overflow_together() {
        // LDA #$FF, ADC #$01
        let (mut cpu, mut memory) = machine(&[0xA9, 0xFF, 0x69, 0x01]);
        run(&mut cpu, &mut memory, 2);

        assert_eq!(cpu.get_register_a(), 0x00);
        assert!(cpu.get_flag(CARRY_FLAG));
        assert!(cpu.get_flag(OVERFLOW_FLAG));
        assert!(cpu.get_flag(ZERO_FLAG));
    }

    #[test]
    fn test_adc_signed_overflow_without_carry_out_is_clear() {
        // LDA #$7F, ADC #$01
        let (mut cpu, mut memory) = machine(&[0xA9, 0x7F, 0x69, 0x01]);
        run(&mut cpu, &mut memory, 2);

        assert_eq!(cpu.get_register_a(), 0x80);
        assert!(!cpu.get_flag(OVERFLOW_FLAG));
        assert!(!cpu.get_flag(CARRY_FLAG));
        assert!(cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_adc_adds_carry_in() {
        // SEC, LDA #$10, ADC #$20
        let (mut cpu, mut memory) = machine(&[0x38, 0xA9, 0x10, 0x69, 0x20]);
        run(&mut cpu, &mut memory, 3);

        assert_eq!(cpu.get_register_a(), 0x31);
        assert!(!cpu.get_flag(CARRY_FLAG));
    }

    #[test]
    fn test_sbc_basic() {
        // SEC, LDA #$50, SBC #$30
        let (mut cpu, mut memory) = machine(&[0x38, 0xA9, 0x50, 0xE9, 0x30]);
        run(&mut cpu, &mut memory, 3);

        assert_eq!(cpu.get_register_a(), 0x20);
        assert!(!cpu.get_flag(CARRY_FLAG));
        assert!(!cpu.get_flag(OVERFLOW_FLAG));
    }

    #[test]
    fn test_sbc_borrow_out_sets_carry_and_overflow() {
        // SEC, LDA #$20, SBC #$30
        let (mut cpu, mut memory) = machine(&[0x38, 0xA9, 0x20, 0xE9, 0x30]);
        run(&mut cpu, &mut memory, 3);

        assert_eq!(cpu.get_register_a(), 0xF0);
        assert!(cpu.get_flag(CARRY_FLAG));
        assert!(cpu.get_flag(OVERFLOW_FLAG));
        assert!(cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_sbc_clear_carry_subtracts_one_more() {
        // CLC, LDA #$20, SBC #$10
        let (mut cpu, mut memory) = machine(&[0x18, 0xA9, 0x20, 0xE9, 0x10]);
        run(&mut cpu, &mut memory, 3);

        assert_eq!(cpu.get_register_a(), 0x0F);
    }

    #[test]
    fn test_lda_tax() {
        // LDA #$FF, TAX
        let (mut cpu, mut memory) = machine(&[0xA9, 0xFF, 0xAA]);
        run(&mut cpu, &mut memory, 2);

        assert_eq!(cpu.get_register_x(), 0xFF);
        assert!(cpu.get_flag(NEGATIVE_FLAG));
        assert!(!cpu.get_flag(ZERO_FLAG));
    }

    #[test]
    fn test_transfer_instructions() {
        // LDA #$00, TAY, LDX #$33, TXA, LDY #$80, TYA
        let (mut cpu, mut memory) =
            machine(&[0xA9, 0x00, 0xA8, 0xA2, 0x33, 0x8A, 0xA0, 0x80, 0x98]);

        run(&mut cpu, &mut memory, 2);
        assert_eq!(cpu.get_register_y(), 0x00);
        assert!(cpu.get_flag(ZERO_FLAG));

        run(&mut cpu, &mut memory, 2);
        assert_eq!(cpu.get_register_a(), 0x33);
        assert!(!cpu.get_flag(ZERO_FLAG));

        run(&mut cpu, &mut memory, 2);
        assert_eq!(cpu.get_register_a(), 0x80);
        assert!(cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_txs_leaves_flags_alone() {
        // LDX #$80, LDA #$01, TXS
        let (mut cpu, mut memory) = machine(&[0xA2, 0x80, 0xA9, 0x01, 0x9A]);
        run(&mut cpu, &mut memory, 2);
        let status = cpu.get_status();

        cpu.step(&mut memory);
        assert_eq!(cpu.get_sp(), 0x80);
        assert_eq!(cpu.get_status(), status);
    }

    #[test]
    fn test_tsx_sets_flags() {
        // TSX
        let (mut cpu, mut memory) = machine(&[0xBA]);
        cpu.step(&mut memory);

        assert_eq!(cpu.get_register_x(), 0xFD);
        assert!(cpu.get_flag(NEGATIVE_FLAG));
        assert!(!cpu.get_flag(ZERO_FLAG));
    }

    #[test]
    fn test_store_sets_flags_from_stored_value() {
        // LDA #$00, LDX #$FF, STA $10
        let (mut cpu, mut memory) = machine(&[0xA9, 0x00, 0xA2, 0xFF, 0x85, 0x10]);
        run(&mut cpu, &mut memory, 2);
        assert!(cpu.get_flag(NEGATIVE_FLAG));

        cpu.step(&mut memory);
        assert_eq!(memory.read(0x0010), 0x00);
        assert!(cpu.get_flag(ZERO_FLAG));
        assert!(!cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_stx_zero_page_y_and_sty_absolute() {
        // LDX #$AA, LDY #$05, STX $FE,Y, STY $0300
        let (mut cpu, mut memory) =
            machine(&[0xA2, 0xAA, 0xA0, 0x05, 0x96, 0xFE, 0x8C, 0x00, 0x03]);
        run(&mut cpu, &mut memory, 4);

        // $FE + 5 wraps to $03
        assert_eq!(memory.read(0x0003), 0xAA);
        assert_eq!(memory.read(0x0300), 0x05);
    }

    #[test]
    fn test_inx_dex() {
        // LDX #$FE, INX, INX, DEX
        let (mut cpu, mut memory) = machine(&[0xA2, 0xFE, 0xE8, 0xE8, 0xCA]);

        run(&mut cpu, &mut memory, 2);
        assert_eq!(cpu.get_register_x(), 0xFF);
        assert!(cpu.get_flag(NEGATIVE_FLAG));

        cpu.step(&mut memory); // wraps to 0
        assert_eq!(cpu.get_register_x(), 0x00);
        assert!(cpu.get_flag(ZERO_FLAG));

        cpu.step(&mut memory);
        assert_eq!(cpu.get_register_x(), 0xFF);
    }

    #[test]
    fn test_iny_dey() {
        // LDY #$00, DEY, INY, INY
        let (mut cpu, mut memory) = machine(&[0xA0, 0x00, 0x88, 0xC8, 0xC8]);

        run(&mut cpu, &mut memory, 2);
        assert_eq!(cpu.get_register_y(), 0xFF);
        assert!(cpu.get_flag(NEGATIVE_FLAG));

        run(&mut cpu, &mut memory, 2);
        assert_eq!(cpu.get_register_y(), 0x01);
        assert!(!cpu.get_flag(ZERO_FLAG));
        assert!(!cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_inc_dec_memory() {
        // INC $20, DEC $20, DEC $20
        let (mut cpu, mut memory) = machine(&[0xE6, 0x20, 0xC6, 0x20, 0xC6, 0x20]);
        memory.write(0x0020, 0xFF);

        cpu.step(&mut memory);
        assert_eq!(memory.read(0x0020), 0x00);
        assert!(cpu.get_flag(ZERO_FLAG));

        run(&mut cpu, &mut memory, 2);
        assert_eq!(memory.read(0x0020), 0xFE);
        assert!(cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_asl_accumulator() {
        // LDA #$81, ASL A
        let (mut cpu, mut memory) = machine(&[0xA9, 0x81, 0x0A]);
        run(&mut cpu, &mut memory, 2);

        assert_eq!(cpu.get_register_a(), 0x02);
        assert!(cpu.get_flag(CARRY_FLAG));
        // N still reflects the LDA
        assert!(cpu.get_flag(NEGATIVE_FLAG));
        assert!(!cpu.get_flag(ZERO_FLAG));
    }

    #[test]
    fn test_asl_accumulator_keeps_zero_and_negative() {
        // LDA #$80, ASL A
        let (mut cpu, mut memory) = machine(&[0xA9, 0x80, 0x0A]);
        run(&mut cpu, &mut memory, 2);

        assert_eq!(cpu.get_register_a(), 0x00);
        assert!(cpu.get_flag(CARRY_FLAG));
        assert!(cpu.get_flag(NEGATIVE_FLAG));
        assert!(!cpu.get_flag(ZERO_FLAG));
    }

    #[test]
    fn test_lsr_carries_out_bit_zero() {
        // LDA #$01, LSR A
        let (mut cpu, mut memory) = machine(&[0xA9, 0x01, 0x4A]);
        run(&mut cpu, &mut memory, 2);

        assert_eq!(cpu.get_register_a(), 0x00);
        assert!(cpu.get_flag(CARRY_FLAG));
        // Z and N still reflect the LDA
        assert!(!cpu.get_flag(ZERO_FLAG));
        assert!(!cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_rol_ror_shift_through_carry() {
        // SEC, LDA #$80, ROL A, ROR A
        let (mut cpu, mut memory) = machine(&[0x38, 0xA9, 0x80, 0x2A, 0x6A]);

        run(&mut cpu, &mut memory, 3);
        assert_eq!(cpu.get_register_a(), 0x01);
        assert!(cpu.get_flag(CARRY_FLAG));

        cpu.step(&mut memory);
        assert_eq!(cpu.get_register_a(), 0x80);
        assert!(cpu.get_flag(CARRY_FLAG));
        assert!(cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_shift_memory_operand() {
        // ASL $40, ROR $40
        let (mut cpu, mut memory) = machine(&[0x06, 0x40, 0x66, 0x40]);
        memory.write(0x0040, 0xC1);

        cpu.step(&mut memory);
        assert_eq!(memory.read(0x0040), 0x82);
        assert!(cpu.get_flag(CARRY_FLAG));
        assert!(cpu.get_flag(NEGATIVE_FLAG));

        cpu.step(&mut memory);
        assert_eq!(memory.read(0x0040), 0xC1);
        assert!(!cpu.get_flag(CARRY_FLAG));
    }

    type AccessLog = Rc<RefCell<Vec<(&'static str, u16)>>>;

    // One page of storage that records every hook call.
    struct RecordingPage {
        data: [u8; 16],
        log: AccessLog,
    }

    impl Region for RecordingPage {
        fn name(&self) -> &'static str {
            "recording page"
        }

        fn read(&mut self, address: u16, data_bus: &mut u8) {
            self.log.borrow_mut().push(("read", address));
            *data_bus = self.data[address as usize & 0x0F];
        }

        fn write(&mut self, address: u16, data_bus: u8) {
            self.log.borrow_mut().push(("write", address));
            self.data[address as usize & 0x0F] = data_bus;
        }
    }

    #[test]
    fn test_read_modify_write_touches_operand_once() {
        // INC $0305, LDX #$02, ROL $0301,X
        let (mut cpu, mut memory) = machine(&[0xEE, 0x05, 0x03, 0xA2, 0x02, 0x3E, 0x01, 0x03]);
        let log = AccessLog::default();
        memory
            .map(0x0300, 0x030F, Box::new(RecordingPage { data: [0; 16], log: log.clone() }))
            .unwrap();
        memory.write(0x0305, 0x41);
        memory.write(0x0303, 0x81);
        log.borrow_mut().clear();

        cpu.step(&mut memory);
        assert_eq!(*log.borrow(), vec![("read", 0x0305), ("write", 0x0305)]);
        log.borrow_mut().clear();
        assert_eq!(memory.read(0x0305), 0x42);
        log.borrow_mut().clear();

        run(&mut cpu, &mut memory, 2);
        assert_eq!(*log.borrow(), vec![("read", 0x0303), ("write", 0x0303)]);
        log.borrow_mut().clear();
        assert_eq!(memory.read(0x0303), 0x02);
        assert!(cpu.get_flag(CARRY_FLAG));
    }

    #[test]
    fn test_and_logical() {
        // LDA #$F0, AND #$0F
        let (mut cpu, mut memory) = machine(&[0xA9, 0xF0, 0x29, 0x0F]);
        run(&mut cpu, &mut memory, 2);

        assert_eq!(cpu.get_register_a(), 0x00);
        assert!(cpu.get_flag(ZERO_FLAG));
        assert!(!cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_ora_logical() {
        // LDA #$F0, ORA #$0F
        let (mut cpu, mut memory) = machine(&[0xA9, 0xF0, 0x09, 0x0F]);
        run(&mut cpu, &mut memory, 2);

        assert_eq!(cpu.get_register_a(), 0xFF);
        assert!(!cpu.get_flag(ZERO_FLAG));
        assert!(cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_eor_logical() {
        // LDA #$FF, EOR #$FF
        let (mut cpu, mut memory) = machine(&[0xA9, 0xFF, 0x49, 0xFF]);
        run(&mut cpu, &mut memory, 2);

        assert_eq!(cpu.get_register_a(), 0x00);
        assert!(cpu.get_flag(ZERO_FLAG));
    }

    #[test]
    fn test_cmp_equal() {
        // LDA #$42, CMP #$42
        let (mut cpu, mut memory) = machine(&[0xA9, 0x42, 0xC9, 0x42]);
        run(&mut cpu, &mut memory, 2);

        assert_eq!(cpu.get_register_a(), 0x42);
        assert!(cpu.get_flag(ZERO_FLAG));
        assert!(cpu.get_flag(CARRY_FLAG));
        assert!(!cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_cmp_is_signed() {
        // LDA #$10, CMP #$F0 (16 against -16)
        let (mut cpu, mut memory) = machine(&[0xA9, 0x10, 0xC9, 0xF0]);
        run(&mut cpu, &mut memory, 2);

        assert!(cpu.get_flag(CARRY_FLAG));
        assert!(!cpu.get_flag(ZERO_FLAG));
        assert!(!cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_cpx_cpy_less() {
        // LDX #$10, CPX #$20, LDY #$05, CPY #$05
        let (mut cpu, mut memory) = machine(&[0xA2, 0x10, 0xE0, 0x20, 0xA0, 0x05, 0xC0, 0x05]);

        run(&mut cpu, &mut memory, 2);
        assert!(cpu.get_flag(NEGATIVE_FLAG));
        assert!(!cpu.get_flag(CARRY_FLAG));
        assert!(!cpu.get_flag(ZERO_FLAG));

        run(&mut cpu, &mut memory, 2);
        assert!(cpu.get_flag(ZERO_FLAG));
        assert!(cpu.get_flag(CARRY_FLAG));
    }

    #[test]
    fn test_compare_outcomes_are_exclusive() {
        let mut cpu = CPU::new();
        for register in 0..=255u8 {
            for operand in 0..=255u8 {
                cpu.compare(register, operand);
                let n = cpu.get_flag(NEGATIVE_FLAG);
                let z = cpu.get_flag(ZERO_FLAG);
                let c = cpu.get_flag(CARRY_FLAG);

                let less = n && !z && !c;
                let equal = !n && z && c;
                let greater = !n && !z && c;
                assert_eq!(less as u8 + equal as u8 + greater as u8, 1);
                assert_eq!(less, (register as i8) < (operand as i8));
            }
        }
    }

    #[test]
    fn test_bit() {
        // LDA #$0F, BIT $10
        let (mut cpu, mut memory) = machine(&[0xA9, 0x0F, 0x24, 0x10]);
        memory.write(0x0010, 0xC0);
        run(&mut cpu, &mut memory, 2);

        assert!(cpu.get_flag(NEGATIVE_FLAG));
        assert!(cpu.get_flag(OVERFLOW_FLAG));
        assert!(cpu.get_flag(ZERO_FLAG));
        assert_eq!(cpu.get_register_a(), 0x0F);
    }

    #[test]
    fn test_branch_taken_and_not_taken() {
        // LDX #$03, DEX, BNE -3, NOP
        let (mut cpu, mut memory) = machine(&[0xA2, 0x03, 0xCA, 0xD0, 0xFD, 0xEA]);

        run(&mut cpu, &mut memory, 3);
        assert_eq!(cpu.get_pc(), 0x8002);

        run(&mut cpu, &mut memory, 4);
        assert_eq!(cpu.get_register_x(), 0x00);
        assert_eq!(cpu.get_pc(), 0x8005);
    }

    #[test]
    fn test_branch_on_carry_and_overflow() {
        // SEC, BCS +2, NOP, NOP, CLV, BVS +1, NOP
        let (mut cpu, mut memory) =
            machine(&[0x38, 0xB0, 0x02, 0xEA, 0xEA, 0xB8, 0x70, 0x01, 0xEA]);

        run(&mut cpu, &mut memory, 2);
        assert_eq!(cpu.get_pc(), 0x8005);

        run(&mut cpu, &mut memory, 2);
        assert_eq!(cpu.get_pc(), 0x8008);
    }

    #[test]
    fn test_jmp_absolute() {
        // JMP $9000
        let (mut cpu, mut memory) = machine(&[0x4C, 0x00, 0x90]);
        cpu.step(&mut memory);

        assert_eq!(cpu.get_pc(), 0x9000);
    }

    #[test]
    fn test_jmp_indirect_reads_across_page() {
        // JMP ($02FF)
        let (mut cpu, mut memory) = machine(&[0x6C, 0xFF, 0x02]);
        memory.write(0x02FF, 0x34);
        memory.write(0x0300, 0x12);
        cpu.step(&mut memory);

        assert_eq!(cpu.get_pc(), 0x1234);
    }

    #[test]
    fn test_jsr_rts() {
        // JSR $8010 ... $8010: RTS
        let mut program = vec![0xEA; 0x11];
        program[..3].copy_from_slice(&[0x20, 0x10, 0x80]);
        program[0x10] = 0x60;
        let (mut cpu, mut memory) = machine(&program);
        let sp = cpu.get_sp();

        cpu.step(&mut memory);
        assert_eq!(cpu.get_pc(), 0x8010);
        assert_eq!(cpu.get_sp(), sp.wrapping_sub(2));
        // return address minus one, high byte pushed first
        assert_eq!(memory.read(STACK_PAGE + sp as u16), 0x80);
        assert_eq!(memory.read(STACK_PAGE + sp as u16 - 1), 0x02);

        cpu.step(&mut memory);
        assert_eq!(cpu.get_pc(), 0x8003);
        assert_eq!(cpu.get_sp(), sp);
    }

    #[test]
    fn test_stack_pointer_wraps() {
        let (mut cpu, mut memory) = machine(&[]);
        cpu.sp = 0x00;

        cpu.push(&mut memory, 0x5A);
        assert_eq!(cpu.get_sp(), 0xFF);
        assert_eq!(memory.read(0x0100), 0x5A);

        assert_eq!(cpu.pop(&mut memory), 0x5A);
        assert_eq!(cpu.get_sp(), 0x00);
    }

    #[test]
    fn test_stack_operations() {
        // LDA #$42, PHA, LDA #$00, PLA
        let (mut cpu, mut memory) = machine(&[0xA9, 0x42, 0x48, 0xA9, 0x00, 0x68]);

        run(&mut cpu, &mut memory, 2);
        assert_eq!(cpu.get_sp(), 0xFC);
        assert_eq!(memory.read(0x01FD), 0x42);

        run(&mut cpu, &mut memory, 2);
        assert_eq!(cpu.get_register_a(), 0x42);
        assert_eq!(cpu.get_sp(), 0xFD);
        assert!(!cpu.get_flag(ZERO_FLAG));
    }

    #[test]
    fn test_php_plp() {
        // PHP, CLI, PLP
        let (mut cpu, mut memory) = machine(&[0x08, 0x58, 0x28]);
        let status = cpu.get_status();

        run(&mut cpu, &mut memory, 2);
        assert!(!cpu.get_flag(INTERRUPT_DISABLE));

        cpu.step(&mut memory);
        assert_eq!(cpu.get_status(), status);
    }

    #[test]
    fn test_plp_forces_unused_bit() {
        // PLP with $00 on the stack
        let (mut cpu, mut memory) = machine(&[0x28]);
        memory.write(0x01FE, 0x00);
        cpu.step(&mut memory);

        assert_eq!(cpu.get_status(), UNUSED_FLAG);
    }

    #[test]
    fn test_rti_pops_status_then_pc() {
        // RTI
        let (mut cpu, mut memory) = machine(&[0x40]);
        memory.write(0x01FE, CARRY_FLAG | NEGATIVE_FLAG);
        memory.write(0x01FF, 0x34);
        memory.write(0x0100, 0x12);
        cpu.step(&mut memory);

        assert_eq!(cpu.get_pc(), 0x1234);
        assert_eq!(cpu.get_status(), CARRY_FLAG | NEGATIVE_FLAG | UNUSED_FLAG);
        assert_eq!(cpu.get_sp(), 0x00);
    }

    #[test]
    fn test_brk_instruction() {
        // CLI, BRK
        let (mut cpu, mut memory) = machine(&[0x58, 0x00]);
        cpu.step(&mut memory);
        let status = cpu.get_status();

        cpu.step(&mut memory);
        assert_eq!(cpu.get_pc(), 0x9000);
        assert_eq!(cpu.get_sp(), 0xFD - 3);
        assert_eq!(memory.read(0x01FD), 0x80);
        assert_eq!(memory.read(0x01FC), 0x02);
        assert_eq!(memory.read(0x01FB), status);
        assert!(cpu.get_flag(BREAK_COMMAND));
        assert!(cpu.get_flag(INTERRUPT_DISABLE));
    }

    #[test]
    fn test_flag_instructions() {
        // SEC, SED, SEI, CLC, CLD, CLI
        let (mut cpu, mut memory) = machine(&[0x38, 0xF8, 0x78, 0x18, 0xD8, 0x58]);

        run(&mut cpu, &mut memory, 3);
        assert!(cpu.get_flag(CARRY_FLAG));
        assert!(cpu.get_flag(DECIMAL_MODE));
        assert!(cpu.get_flag(INTERRUPT_DISABLE));

        run(&mut cpu, &mut memory, 3);
        assert!(!cpu.get_flag(CARRY_FLAG));
        assert!(!cpu.get_flag(DECIMAL_MODE));
        assert!(!cpu.get_flag(INTERRUPT_DISABLE));
    }

    #[test]
    fn test_clv() {
        // LDA #$FF, ADC #$01, CLV
        let (mut cpu, mut memory) = machine(&[0xA9, 0xFF, 0x69, 0x01, 0xB8]);
        run(&mut cpu, &mut memory, 3);

        assert!(!cpu.get_flag(OVERFLOW_FLAG));
        assert!(cpu.get_flag(CARRY_FLAG));
    }

    #[test]
    fn test_nop_instruction() {
        let (mut cpu, mut memory) = machine(&[0xEA]);
        let status = cpu.get_status();
        let sp = cpu.get_sp();

        cpu.step(&mut memory);
        assert_eq!(cpu.get_status(), status);
        assert_eq!(cpu.get_sp(), sp);
        assert_eq!(cpu.get_pc(), 0x8001);
    }

    #[test]
    fn test_illegal_opcode_only_consumes_the_fetch() {
        let (mut cpu, mut memory) = machine(&[0x02, 0xA9, 0x01]);
        let status = cpu.get_status();

        let result = cpu.step(&mut memory);
        assert_eq!(result, StepResult::IllegalOpcode { opcode: 0x02, pc: 0x8000 });
        assert_eq!(cpu.get_pc(), 0x8001);
        assert_eq!(cpu.get_status(), status);
        assert_eq!(cpu.get_register_a(), 0x00);

        // execution carries on with the next byte
        cpu.step(&mut memory);
        assert_eq!(cpu.get_register_a(), 0x01);
    }

    #[test]
    fn test_invalid_operand_use_is_a_no_op() {
        let (mut cpu, mut memory) = machine(&[]);
        let status = cpu.get_status();

        cpu.store(AddressingMode::Immediate, Operand::Immediate(0x10), 0x80, &mut memory);
        cpu.store(AddressingMode::Implied, Operand::None, 0x80, &mut memory);
        cpu.store(AddressingMode::AbsoluteIndirect, Operand::Address(0x0010), 0x80, &mut memory);
        assert_eq!(cpu.get_status(), status);
        assert_eq!(memory.read(0x0010), 0x00);

        assert_eq!(cpu.operand_value(AddressingMode::Implied, Operand::None, &mut memory), None);
        assert_eq!(
            cpu.operand_value(AddressingMode::AbsoluteIndirect, Operand::Address(0x10), &mut memory),
            None
        );
    }

    #[test]
    fn test_soft_reset_through_control_register() {
        let mut memory = Memory::standard(Box::new(io::empty()), Box::new(io::sink())).unwrap();
        // LDX #$05, LDA #$00, STA $4022
        memory
            .load_rom(&[0xA2, 0x05, 0xA9, 0x00, 0x8D, 0x22, 0x40], START)
            .unwrap();
        memory.load_rom(&[0x00, 0x80], RESET_VECTOR).unwrap();
        let mut cpu = CPU::new();
        cpu.reset(&mut memory);

        run(&mut cpu, &mut memory, 3);
        assert_eq!(cpu.get_pc(), START);
        assert_eq!(cpu.get_register_x(), 0x05);
        assert_eq!(cpu.get_sp(), 0xFD);
    }

    #[test]
    fn test_halt_through_control_register() {
        let mut memory = Memory::standard(Box::new(io::empty()), Box::new(io::sink())).unwrap();
        // LDA #$01, STA $4022, NOP
        let [control_low, control_high] = IO_CONTROL.to_le_bytes();
        memory
            .load_rom(&[0xA9, CONTROL_HALT, 0x8D, control_low, control_high, 0xEA], START)
            .unwrap();
        memory.load_rom(&[0x00, 0x80], RESET_VECTOR).unwrap();
        let mut cpu = CPU::new();
        cpu.reset(&mut memory);

        run(&mut cpu, &mut memory, 2);
        assert!(cpu.is_halted());
        assert!(memory.control().halt_requested());
        assert_eq!(cpu.get_pc(), 0x8005);

        assert_eq!(cpu.step(&mut memory), StepResult::Halted);
        assert_eq!(cpu.get_pc(), 0x8005);

        cpu.reset(&mut memory);
        assert!(!cpu.is_halted());
        assert!(!memory.control().halt_requested());
    }
}
