use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cpu::{
    CPU, BREAK_COMMAND, CARRY_FLAG, DECIMAL_MODE, INTERRUPT_DISABLE, NEGATIVE_FLAG,
    OVERFLOW_FLAG, UNUSED_FLAG, ZERO_FLAG,
};

/// Read-only copy of the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub pc: u16,
    pub sp: u8,
    pub status: u8,
    pub steps: u64,
    pub halted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagView {
    pub negative: bool,
    pub overflow: bool,
    pub unused: bool,
    pub break_command: bool,
    pub decimal: bool,
    pub interrupt_disable: bool,
    pub zero: bool,
    pub carry: bool,
}

impl CpuSnapshot {
    pub fn flags(&self) -> FlagView {
        let set = |flag: u8| self.status & flag != 0;
        FlagView {
            negative: set(NEGATIVE_FLAG),
            overflow: set(OVERFLOW_FLAG),
            unused: set(UNUSED_FLAG),
            break_command: set(BREAK_COMMAND),
            decimal: set(DECIMAL_MODE),
            interrupt_disable: set(INTERRUPT_DISABLE),
            zero: set(ZERO_FLAG),
            carry: set(CARRY_FLAG),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// `NV-BDIZC`, upper case where the flag is set.
    pub fn flag_string(&self) -> String {
        const LETTERS: [(u8, char); 8] = [
            (NEGATIVE_FLAG, 'N'),
            (OVERFLOW_FLAG, 'V'),
            (UNUSED_FLAG, '-'),
            (BREAK_COMMAND, 'B'),
            (DECIMAL_MODE, 'D'),
            (INTERRUPT_DISABLE, 'I'),
            (ZERO_FLAG, 'Z'),
            (CARRY_FLAG, 'C'),
        ];
        LETTERS
            .iter()
            .map(|&(flag, letter)| {
                if self.status & flag != 0 {
                    letter
                } else {
                    letter.to_ascii_lowercase()
                }
            })
            .collect()
    }
}

impl fmt::Display for CpuSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC: ${:04X}  A: ${:02X}  X: ${:02X}  Y: ${:02X}  S: ${:02X}  P: ${:02X} [{}]",
            self.pc,
            self.a,
            self.x,
            self.y,
            self.sp,
            self.status,
            self.flag_string()
        )
    }
}

impl CPU {
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            a: self.a,
            x: self.x,
            y: self.y,
            pc: self.pc,
            sp: self.sp,
            status: self.status,
            steps: self.steps,
            halted: self.halted,
        }
    }

    pub fn restore(&mut self, snapshot: &CpuSnapshot) {
        self.a = snapshot.a;
        self.x = snapshot.x;
        self.y = snapshot.y;
        self.pc = snapshot.pc;
        self.sp = snapshot.sp;
        self.status = snapshot.status | UNUSED_FLAG;
        self.steps = snapshot.steps;
        self.halted = snapshot.halted;
    }
}
