use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;

use env_logger::{Builder, Env};
use log::{error, info};

use emu6502::config::{CliAction, EmulatorConfig, USAGE};
use emu6502::metrics::{init_metrics, render_metrics};
use emu6502::{Memory, StepResult, CPU};

fn main() {
    let config = match EmulatorConfig::from_args(env::args().skip(1)) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            print!("{}", USAGE);
            return;
        }
        Err(e) => {
            eprintln!("emu6502: {}", e);
            eprint!("{}", USAGE);
            process::exit(1);
        }
    };

    Builder::from_env(Env::default().default_filter_or(config.log_level().as_str())).init();

    if let Err(e) = run(&config) {
        error!("{}", e);
        eprintln!("emu6502: {}", e);
        process::exit(1);
    }
}

fn run(config: &EmulatorConfig) -> Result<(), Box<dyn Error>> {
    init_metrics()?;

    let rom_path = config.rom_path.as_ref().ok_or("no ROM image given")?;
    let rom = fs::read(rom_path)
        .map_err(|e| format!("cannot read {}: {}", rom_path.display(), e))?;

    let mut memory = Memory::standard(Box::new(io::stdin()), Box::new(io::stdout()))?;
    let loaded = memory.load_rom(&rom, config.load_address)?;
    info!(
        "loaded {} bytes from {} at ${:04X}",
        loaded,
        rom_path.display(),
        config.load_address
    );

    let mut cpu = CPU::with_stack_pointer(config.stack_pointer);
    cpu.reset(&mut memory);

    let stdin = io::stdin();
    let mut line = String::new();
    while cpu.step(&mut memory) != StepResult::Halted {
        if !config.step_mode {
            continue;
        }

        eprintln!("{}", cpu.snapshot());
        eprint!("> ");
        io::stderr().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 || line.trim_start().starts_with('q') {
            break;
        }
    }

    info!("stopped after {} instructions", cpu.get_steps());
    if config.dump_metrics {
        eprint!("{}", render_metrics()?);
    }
    Ok(())
}
