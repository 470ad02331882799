//! Paged memory bus.
//!
//! The 64K address space is split into 4096 pages of 16 bytes. Each page
//! points at most at one mapped [`Region`]; reads and writes are dispatched
//! to that region's hooks through a one-byte data-bus latch. Pages with no
//! region (or regions without the relevant hook) leave the latch alone, so an
//! unmapped read returns whatever was last driven onto the bus.

use std::cell::Cell;
use std::io::{Read, Write};
use std::rc::Rc;

use log::{debug, warn};

use crate::error::MemoryError;
use crate::metrics::record_rom_load;
use crate::regions::{ConsoleIo, Ram, Rom, IO_END, IO_START, RAM_END, RAM_START, ROM_END, ROM_START};

pub const PAGE_SIZE: usize = 16;
pub const PAGE_COUNT: usize = 0x10000 / PAGE_SIZE;

/// A device mapped onto one or more bus pages.
///
/// Both hooks receive the absolute bus address. A read hook drives the shared
/// data bus by writing into `data_bus`; a write hook consumes the value the
/// bus already carries. The default hooks do nothing, which is how a region
/// without a read or write side is expressed.
pub trait Region {
    fn name(&self) -> &'static str;

    fn read(&mut self, _address: u16, _data_bus: &mut u8) {}

    fn write(&mut self, _address: u16, _data_bus: u8) {}

    /// Copies `bytes` into backing storage starting at `address`, bypassing
    /// the bus. Returns how many bytes were stored.
    fn program(&mut self, _address: u16, _bytes: &[u8]) -> usize {
        0
    }
}

/// Identifies a region registered with [`Memory::map`].
pub type RegionId = usize;

/// Reset/halt requests raised by devices and observed by the CPU and run loop.
#[derive(Debug, Clone, Default)]
pub struct ControlLine {
    reset: Rc<Cell<bool>>,
    halt: Rc<Cell<bool>>,
}

impl ControlLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_reset(&self) {
        self.reset.set(true);
    }

    pub fn request_halt(&self) {
        self.halt.set(true);
    }

    /// Returns and clears a pending reset request.
    pub fn take_reset(&self) -> bool {
        self.reset.replace(false)
    }

    pub fn halt_requested(&self) -> bool {
        self.halt.get()
    }

    pub fn clear_halt(&self) {
        self.halt.set(false);
    }
}

#[derive(Debug, Clone, Copy)]
struct RomMapping {
    id: RegionId,
    start: u16,
    end: u16,
}

pub struct Memory {
    pages: Box<[Option<RegionId>]>,
    regions: Vec<Box<dyn Region>>,
    data_bus: u8,
    rom: Option<RomMapping>,
    control: ControlLine,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// An empty bus: every address is open.
    pub fn new() -> Self {
        Memory {
            pages: vec![None; PAGE_COUNT].into_boxed_slice(),
            regions: Vec::new(),
            data_bus: 0,
            rom: None,
            control: ControlLine::new(),
        }
    }

    /// The reference machine: mirrored RAM, PRG-ROM and the console I/O page
    /// laid over the start of ROM.
    pub fn standard(
        input: Box<dyn Read>,
        output: Box<dyn Write>,
    ) -> Result<Self, MemoryError> {
        let mut memory = Memory::new();
        memory.map(RAM_START, RAM_END, Box::new(Ram::new()))?;
        memory.map_rom(ROM_START, ROM_END, Box::new(Rom::new(ROM_START, ROM_END)))?;
        let console = ConsoleIo::new(input, output, memory.control().clone());
        memory.map(IO_START, IO_END, Box::new(console))?;
        Ok(memory)
    }

    /// Installs `region` over `start..=end`, replacing whatever those pages
    /// pointed at before.
    pub fn map(
        &mut self,
        start: u16,
        end: u16,
        region: Box<dyn Region>,
    ) -> Result<RegionId, MemoryError> {
        let first = start as usize;
        let last = end as usize;
        if last < first || first % PAGE_SIZE != 0 || (last + 1) % PAGE_SIZE != 0 {
            return Err(MemoryError::UnalignedRange { start, end });
        }

        debug!("mapping {} at ${:04X}-${:04X}", region.name(), start, end);
        let id = self.regions.len();
        self.regions.push(region);
        for page in &mut self.pages[first / PAGE_SIZE..=last / PAGE_SIZE] {
            *page = Some(id);
        }
        Ok(id)
    }

    /// Like [`Memory::map`], and marks the region as the target of `load_rom`.
    pub fn map_rom(
        &mut self,
        start: u16,
        end: u16,
        region: Box<dyn Region>,
    ) -> Result<RegionId, MemoryError> {
        let id = self.map(start, end, region)?;
        self.rom = Some(RomMapping { id, start, end });
        Ok(id)
    }

    pub fn read(&mut self, address: u16) -> u8 {
        if let Some(id) = self.pages[address as usize / PAGE_SIZE] {
            self.regions[id].read(address, &mut self.data_bus);
        }
        self.data_bus
    }

    pub fn write(&mut self, address: u16, value: u8) {
        self.data_bus = value;
        if let Some(id) = self.pages[address as usize / PAGE_SIZE] {
            self.regions[id].write(address, self.data_bus);
        }
    }

    // Read a 16-bit value in little-endian format
    pub fn read_u16(&mut self, address: u16) -> u16 {
        let low = self.read(address) as u16;
        let high = self.read(address.wrapping_add(1)) as u16;
        (high << 8) | low
    }

    // Write a 16-bit value in little-endian format
    pub fn write_u16(&mut self, address: u16, value: u16) {
        self.write(address, (value & 0xFF) as u8);
        self.write(address.wrapping_add(1), (value >> 8) as u8);
    }

    /// Copies `data` into the ROM region at `base`. Data running past the end
    /// of ROM is clipped; the number of bytes stored is returned.
    pub fn load_rom(&mut self, data: &[u8], base: u16) -> Result<usize, MemoryError> {
        let rom = self.rom.ok_or(MemoryError::NoRomRegion)?;
        if base < rom.start {
            return Err(MemoryError::BelowRomStart { base, rom_start: rom.start });
        }

        let room = (rom.end as usize + 1).saturating_sub(base as usize);
        let len = data.len().min(room);
        if len < data.len() {
            warn!(
                "ROM image of {} bytes at ${:04X} clipped to {} bytes",
                data.len(),
                base,
                len
            );
        }

        let stored = self.regions[rom.id].program(base, &data[..len]);
        record_rom_load(stored);
        Ok(stored)
    }

    /// Last value driven onto the data bus.
    pub fn data_bus(&self) -> u8 {
        self.data_bus
    }

    pub fn region_name(&self, address: u16) -> Option<&'static str> {
        self.pages[address as usize / PAGE_SIZE].map(|id| self.regions[id].name())
    }

    pub fn control(&self) -> &ControlLine {
        &self.control
    }
}
