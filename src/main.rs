mod bus;
mod cartridge;
mod cpu;
mod emulator;
mod mapper;
mod memory;
mod savestate;

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use cartridge::Cartridge;
use emulator::Emulator;
use savestate::SaveState;

fn resolve_rom_path(arg: &str) -> Result<PathBuf, String> {
    let direct = PathBuf::from(arg);
    if direct.exists() {
        return Ok(direct);
    }

    // Infer the extension for arguments like "game" -> "game.nes".
    let mut with_ext = direct.clone();
    if with_ext.extension().is_none() {
        with_ext.set_extension("nes");
        if with_ext.exists() {
            return Ok(with_ext);
        }
    }

    // Fall back to the conventional roms/ directory.
    let in_roms = Path::new("roms").join(arg);
    if in_roms.exists() {
        return Ok(in_roms);
    }
    let mut in_roms_ext = in_roms.clone();
    if in_roms_ext.extension().is_none() {
        in_roms_ext.set_extension("nes");
        if in_roms_ext.exists() {
            return Ok(in_roms_ext);
        }
    }

    Err(format!(
        "ROM '{}' not found. Provide a valid path or place *.nes files under ./roms.",
        arg
    ))
}

fn prompt(label: &str) -> String {
    print!("{}", label);
    io::stdout().flush().expect("failed to flush stdout");
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .expect("failed to read stdin");
    line.trim().to_string()
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!(
            "Usage: {} [--trace] [--state-in FILE] [--state-out FILE] [<rom> [<steps>]]",
            args[0]
        );
        eprintln!("Runs <steps> CPU instructions of an NROM iNES image.");
        return;
    }

    let mut trace = false;
    let mut state_in: Option<PathBuf> = None;
    let mut state_out: Option<PathBuf> = None;
    let mut positional: Vec<String> = Vec::new();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--trace" => {
                trace = true;
                i += 1;
            }
            "--state-in" => {
                if i + 1 >= args.len() {
                    eprintln!("--state-in requires a file path");
                    process::exit(2);
                }
                state_in = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--state-out" => {
                if i + 1 >= args.len() {
                    eprintln!("--state-out requires a file path");
                    process::exit(2);
                }
                state_out = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            other => {
                positional.push(other.to_string());
                i += 1;
            }
        }
    }

    let rom_arg = match positional.first() {
        Some(arg) => arg.clone(),
        None => prompt("ROM path: "),
    };
    let steps_arg = match positional.get(1) {
        Some(arg) => arg.clone(),
        None => prompt("CPU steps: "),
    };
    let steps: u64 = match steps_arg.parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("invalid step count '{}'", steps_arg);
            process::exit(2);
        }
    };

    let rom_path = match resolve_rom_path(&rom_arg) {
        Ok(path) => path,
        Err(msg) => {
            eprintln!("{}", msg);
            process::exit(1);
        }
    };
    let cartridge = match Cartridge::load(&rom_path) {
        Ok(cartridge) => cartridge,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };

    let mut emulator = Emulator::new(cartridge);

    if let Some(path) = state_in {
        let restored = SaveState::load_from_file(&path).and_then(|s| s.restore(&mut emulator));
        match restored {
            Ok(()) => log::info!("resumed from {}", path.display()),
            Err(err) => {
                eprintln!("{}", err);
                process::exit(1);
            }
        }
    }

    let result = if trace {
        (0..steps).try_for_each(|_| emulator.trace_step().map(|t| println!("{}", t)))
    } else {
        emulator.run(steps)
    };
    if let Err(err) = result {
        eprintln!("{}", err);
        process::exit(1);
    }

    if let Some(path) = state_out {
        let state = SaveState::capture(&emulator);
        if let Err(err) = state.save_to_file(&path) {
            eprintln!("{}", err);
            process::exit(1);
        }
        log::info!("save state written to {}", path.display());
    }

    let cpu = emulator.cpu();
    log::info!(
        "ran {} instructions: PC=${:04X} A=${:02X} X=${:02X} Y=${:02X} SP=${:02X} P=${:02X} CYC={}",
        emulator.steps(),
        cpu.pc,
        cpu.a,
        cpu.x,
        cpu.y,
        cpu.sp,
        cpu.status.bits(),
        cpu.total_cycles()
    );
}
