use std::fmt;
use std::io;

/// Errors raised while mapping regions onto the bus or loading ROM content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Region range is empty or does not start/end on a page boundary.
    UnalignedRange { start: u16, end: u16 },
    /// `load_rom` was called before any ROM region was mapped.
    NoRomRegion,
    /// Load base sits below the first ROM address.
    BelowRomStart { base: u16, rom_start: u16 },
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::UnalignedRange { start, end } => write!(
                f,
                "region ${:04X}-${:04X} is not aligned to {}-byte pages",
                start,
                end,
                crate::memory::PAGE_SIZE
            ),
            MemoryError::NoRomRegion => write!(f, "no ROM region is mapped"),
            MemoryError::BelowRomStart { base, rom_start } => write!(
                f,
                "load address ${:04X} is below the ROM start ${:04X}",
                base, rom_start
            ),
        }
    }
}

impl std::error::Error for MemoryError {}

/// Errors raised while building an `EmulatorConfig`.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Json(serde_json::Error),
    InvalidArgument(String),
    MissingValue(String),
    MissingRom,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config file: {}", e),
            ConfigError::Json(e) => write!(f, "config file: {}", e),
            ConfigError::InvalidArgument(arg) => write!(f, "invalid argument '{}'", arg),
            ConfigError::MissingValue(flag) => write!(f, "option '{}' requires a value", flag),
            ConfigError::MissingRom => write!(f, "no ROM file given"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}
