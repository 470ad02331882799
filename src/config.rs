//! Emulator configuration: built-in defaults, an optional JSON file and the
//! command line, in increasing order of precedence.

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cpu::DEFAULT_STACK_POINTER;
use crate::error::ConfigError;

pub const DEFAULT_LOAD_ADDRESS: u16 = 0x8000;

pub const USAGE: &str = "\
Usage: emu6502 [option]... rom

Options:
  -v, --verbose              increment the verbosity level
  -h, --help                 print this help message
  -d, --debug                start in single-step debugging mode
      --load-address <hex>   where the ROM image is loaded (default 8000)
      --stack-pointer <hex>  stack pointer value after reset (default FD)
      --metrics              print Prometheus metrics on exit
      --config <file>        read settings from a JSON file
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub rom_path: Option<PathBuf>,
    pub load_address: u16,
    pub stack_pointer: u8,
    pub verbosity: u8,
    pub step_mode: bool,
    pub dump_metrics: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            rom_path: None,
            load_address: DEFAULT_LOAD_ADDRESS,
            stack_pointer: DEFAULT_STACK_POINTER,
            verbosity: 0,
            step_mode: false,
            dump_metrics: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Run(EmulatorConfig),
    Help,
}

// Values given on the command line, applied over the file/default config.
#[derive(Debug, Default)]
struct Overrides {
    config_path: Option<PathBuf>,
    rom_path: Option<PathBuf>,
    load_address: Option<u16>,
    stack_pointer: Option<u8>,
    verbosity: u8,
    step_mode: bool,
    dump_metrics: bool,
}

impl EmulatorConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Parses the command line, excluding the program name.
    pub fn from_args<I>(args: I) -> Result<CliAction, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut overrides = Overrides::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(CliAction::Help),
                "-v" | "--verbose" => overrides.verbosity = overrides.verbosity.saturating_add(1),
                "-d" | "--debug" => overrides.step_mode = true,
                "--metrics" => overrides.dump_metrics = true,
                "--config" => {
                    overrides.config_path = Some(PathBuf::from(required(&mut args, &arg)?));
                }
                "--load-address" => {
                    let value = required(&mut args, &arg)?;
                    overrides.load_address = Some(parse_hex_u16(&value)?);
                }
                "--stack-pointer" => {
                    let value = required(&mut args, &arg)?;
                    let parsed = parse_hex_u16(&value)?;
                    let sp = u8::try_from(parsed).map_err(|_| ConfigError::InvalidArgument(value))?;
                    overrides.stack_pointer = Some(sp);
                }
                short if short.starts_with('-') && !short.starts_with("--") && short.len() > 1 => {
                    for flag in short[1..].chars() {
                        match flag {
                            'h' => return Ok(CliAction::Help),
                            'v' => overrides.verbosity = overrides.verbosity.saturating_add(1),
                            'd' => overrides.step_mode = true,
                            _ => return Err(ConfigError::InvalidArgument(arg.clone())),
                        }
                    }
                }
                other if other.starts_with('-') => {
                    return Err(ConfigError::InvalidArgument(arg.clone()));
                }
                _ => {
                    if overrides.rom_path.is_some() {
                        return Err(ConfigError::InvalidArgument(arg.clone()));
                    }
                    overrides.rom_path = Some(PathBuf::from(arg));
                }
            }
        }

        let mut config = match &overrides.config_path {
            Some(path) => EmulatorConfig::from_json_file(path)?,
            None => EmulatorConfig::default(),
        };
        config.apply(overrides);

        if config.rom_path.is_none() {
            return Err(ConfigError::MissingRom);
        }
        Ok(CliAction::Run(config))
    }

    fn apply(&mut self, overrides: Overrides) {
        if let Some(rom_path) = overrides.rom_path {
            self.rom_path = Some(rom_path);
        }
        if let Some(load_address) = overrides.load_address {
            self.load_address = load_address;
        }
        if let Some(stack_pointer) = overrides.stack_pointer {
            self.stack_pointer = stack_pointer;
        }
        if overrides.verbosity > 0 {
            self.verbosity = overrides.verbosity;
        }
        self.step_mode |= overrides.step_mode;
        self.dump_metrics |= overrides.dump_metrics;
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn required<I>(args: &mut I, flag: &str) -> Result<String, ConfigError>
where
    I: Iterator<Item = String>,
{
    args.next().ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

/// Accepts `C000`, `0xC000` and `$C000`.
fn parse_hex_u16(value: &str) -> Result<u16, ConfigError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .or_else(|| value.strip_prefix('$'))
        .unwrap_or(value);
    u16::from_str_radix(digits, 16).map_err(|_| ConfigError::InvalidArgument(value.to_string()))
}
