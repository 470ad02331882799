//! Devices behind the bus: mirrored work RAM, program ROM and the console
//! I/O window used by guest programs to talk to the host.

use std::io::{ErrorKind, Read, Write};

use log::{info, warn};

use crate::memory::{ControlLine, Region};

pub const RAM_START: u16 = 0x0000;
pub const RAM_END: u16 = 0x1FFF;
pub const RAM_SIZE: usize = 0x800;

pub const ROM_START: u16 = 0x4020;
pub const ROM_END: u16 = 0xFFFF;

pub const IO_START: u16 = 0x4020;
pub const IO_END: u16 = 0x402F;
/// Reading blocks for one byte of host input.
pub const IO_INPUT: u16 = 0x4020;
/// Writing emits one byte to the host.
pub const IO_OUTPUT: u16 = 0x4021;
/// Writing `CONTROL_RESET` or `CONTROL_HALT` drives the machine control line.
pub const IO_CONTROL: u16 = 0x4022;

pub const CONTROL_RESET: u8 = 0;
pub const CONTROL_HALT: u8 = 1;

/// 2 KiB of RAM, mirrored every 2 KiB across wherever it is mapped.
pub struct Ram {
    data: [u8; RAM_SIZE],
}

impl Ram {
    pub fn new() -> Self {
        Ram { data: [0; RAM_SIZE] }
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl Region for Ram {
    fn name(&self) -> &'static str {
        "RAM"
    }

    fn read(&mut self, address: u16, data_bus: &mut u8) {
        *data_bus = self.data[address as usize & (RAM_SIZE - 1)];
    }

    fn write(&mut self, address: u16, data_bus: u8) {
        self.data[address as usize & (RAM_SIZE - 1)] = data_bus;
    }
}

/// Program ROM covering `start..=end`. Has no write hook: bus writes are
/// dropped, content only arrives through `program`.
pub struct Rom {
    start: u16,
    data: Vec<u8>,
}

impl Rom {
    pub fn new(start: u16, end: u16) -> Self {
        let size = (end as usize + 1).saturating_sub(start as usize);
        Rom { start, data: vec![0; size] }
    }
}

impl Region for Rom {
    fn name(&self) -> &'static str {
        "PRG-ROM"
    }

    fn read(&mut self, address: u16, data_bus: &mut u8) {
        if let Some(&byte) = self.data.get(address.wrapping_sub(self.start) as usize) {
            *data_bus = byte;
        }
    }

    fn program(&mut self, address: u16, bytes: &[u8]) -> usize {
        let Some(offset) = address.checked_sub(self.start) else {
            return 0;
        };
        let offset = offset as usize;
        if offset >= self.data.len() {
            return 0;
        }
        let len = bytes.len().min(self.data.len() - offset);
        self.data[offset..offset + len].copy_from_slice(&bytes[..len]);
        len
    }
}

/// Character console and machine control, one page wide.
pub struct ConsoleIo {
    input: Box<dyn Read>,
    output: Box<dyn Write>,
    control: ControlLine,
}

impl ConsoleIo {
    pub fn new(input: Box<dyn Read>, output: Box<dyn Write>, control: ControlLine) -> Self {
        ConsoleIo { input, output, control }
    }
}

impl Region for ConsoleIo {
    fn name(&self) -> &'static str {
        "console I/O"
    }

    fn read(&mut self, address: u16, data_bus: &mut u8) {
        if address != IO_INPUT {
            return;
        }

        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(1) => *data_bus = byte[0],
                // end of input reads as NUL
                Ok(_) => *data_bus = 0,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => warn!("console input failed: {}", e),
            }
            return;
        }
    }

    fn write(&mut self, address: u16, data_bus: u8) {
        match address {
            IO_OUTPUT => {
                let result = self
                    .output
                    .write_all(&[data_bus])
                    .and_then(|_| self.output.flush());
                if let Err(e) = result {
                    warn!("console output failed: {}", e);
                }
            }
            IO_CONTROL => match data_bus {
                CONTROL_RESET => {
                    info!("soft reset requested");
                    self.control.request_reset();
                }
                CONTROL_HALT => {
                    info!("halt requested");
                    self.control.request_halt();
                }
                other => warn!("ignoring control value ${:02X}", other),
            },
            _ => {}
        }
    }
}
