//! # MOS 6502 Instruction-Level Emulator
//!
//! An instruction-at-a-time model of the MOS 6502 8-bit microprocessor.
//! The address space is split into 16-byte pages, each owned by a memory
//! region with optional read and write hooks, so RAM, ROM and memory-mapped
//! devices all sit behind the same bus.
//!
//! ## Features
//!
//! - The 56 documented operations across all 13 addressing modes
//! - Undefined opcodes decoded as an explicit illegal instruction
//! - Paged memory bus with an open-bus data latch
//! - Console I/O device with soft reset and halt requests
//! - Register snapshots, JSON configuration and Prometheus metrics
//!
//! ## Example
//!
//! ```rust
//! use emu6502::cpu::CPU;
//! use emu6502::memory::Memory;
//! use emu6502::regions::{Ram, Rom, RAM_END, RAM_START, ROM_END, ROM_START};
//!
//! let mut memory = Memory::new();
//! memory.map(RAM_START, RAM_END, Box::new(Ram::new())).unwrap();
//! memory
//!     .map_rom(ROM_START, ROM_END, Box::new(Rom::new(ROM_START, ROM_END)))
//!     .unwrap();
//!
//! // LDA #$42
//! memory.load_rom(&[0xA9, 0x42], 0x8000).unwrap();
//! // Reset vector
//! memory.load_rom(&[0x00, 0x80], 0xFFFC).unwrap();
//!
//! let mut cpu = CPU::new();
//! cpu.reset(&mut memory);
//! cpu.step(&mut memory);
//!
//! assert_eq!(cpu.get_register_a(), 0x42);
//! ```

pub mod addressing;
pub mod config;
pub mod cpu;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod opcodes;
pub mod regions;
pub mod snapshots;

pub use cpu::{StepResult, CPU};
pub use memory::Memory;
