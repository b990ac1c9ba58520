use std::path::PathBuf;
use std::process;

use argh::FromArgs;
use log::error;

use emgen::bus::Bus;
use emgen::disasm::{self, Disasm};
use emgen::display;
use emgen::error::EmuResult;
use emgen::opcodes::OpcodeDecoder;
use emgen::rom::RomImage;
use emgen::{Emulator, Options};

#[derive(FromArgs)]
/// Mega Drive / Genesis emulator.
struct Args {
    #[argh(subcommand)]
    cmd: Cmd,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Cmd {
    Run(RunCmd),
    Disasm(DisasmCmd),
    Info(InfoCmd),
    CheckTable(CheckTableCmd),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
/// run a cartridge image
struct RunCmd {
    /// rom file
    #[argh(positional)]
    rom: PathBuf,
    /// display backend: window, pnm, hash, none
    #[argh(option, default = "String::from(\"window\")")]
    display: String,
    /// stop after this many frames
    #[argh(option)]
    max_frames: Option<u64>,
    /// stop after this many instructions
    #[argh(option)]
    max_instructions: Option<u64>,
    /// speed multiplier
    #[argh(option, default = "1.0")]
    speed: f64,
    /// replay input events from this file
    #[argh(option)]
    read_events: Option<PathBuf>,
    /// record input events to this file
    #[argh(option)]
    write_events: Option<PathBuf>,
    /// exit when playback reaches the end of the event file
    #[argh(switch)]
    exit_after_playback: bool,
    /// dump machine state here periodically and on exit
    #[argh(option)]
    save_state: Option<PathBuf>,
    /// restore machine state from here at startup
    #[argh(option)]
    load_state: Option<PathBuf>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "disasm")]
/// disassemble the reachable code of a cartridge image
struct DisasmCmd {
    /// rom file
    #[argh(positional)]
    rom: PathBuf,
    /// extra entry point (hex), may be repeated
    #[argh(option, from_str_fn(parse_hex))]
    entry: Vec<u32>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "info")]
/// print the cartridge header
struct InfoCmd {
    /// rom file
    #[argh(positional)]
    rom: PathBuf,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "check-table")]
/// verify an instruction table against the whole opcode space
struct CheckTableCmd {
    /// table file; the built-in table when omitted
    #[argh(positional)]
    table: Option<PathBuf>,
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x");
    u32::from_str_radix(digits, 16).map_err(|e| format!("bad address '{}': {}", s, e))
}

fn run_cmd(cmd: RunCmd) -> EmuResult<()> {
    let rom = RomImage::load(&cmd.rom)?;
    let display = display::create_display(&cmd.display)?;
    let opts = Options {
        max_frames: cmd.max_frames,
        max_instructions: cmd.max_instructions,
        speed: cmd.speed,
        save_state: cmd.save_state,
        load_state: cmd.load_state,
        read_events: cmd.read_events,
        write_events: cmd.write_events,
        exit_after_playback: cmd.exit_after_playback,
    };
    Emulator::new(rom, display, opts)?.run()
}

fn disasm_cmd(cmd: DisasmCmd) -> EmuResult<()> {
    let rom = RomImage::load(&cmd.rom)?;
    let rom_bytes = rom.bytes().to_vec();
    let mut bus = Bus::new(rom.into_memory());
    let mut roots = disasm::default_roots(&mut bus);
    roots.extend(cmd.entry);
    let program = Disasm::new()?.disasm_all(&mut bus, &roots)?;
    program.print_listing(&rom_bytes);
    Ok(())
}

fn info_cmd(cmd: InfoCmd) -> EmuResult<()> {
    let rom = RomImage::load(&cmd.rom)?;
    print!("{}", rom.header()?);
    Ok(())
}

fn check_table_cmd(cmd: CheckTableCmd) -> EmuResult<()> {
    let decoder = match &cmd.table {
        Some(path) => OpcodeDecoder::from_table(&std::fs::read_to_string(path)?)?,
        None => OpcodeDecoder::builtin()?,
    };
    println!("Num instructions: {}", decoder.specs().len());
    let report = decoder.verify()?;
    println!("matched: {}", report.matched);
    println!("unmatched: {}", report.unmatched);
    Ok(())
}

fn main() {
    env_logger::init();
    let args: Args = argh::from_env();
    let result = match args.cmd {
        Cmd::Run(cmd) => run_cmd(cmd),
        Cmd::Disasm(cmd) => disasm_cmd(cmd),
        Cmd::Info(cmd) => info_cmd(cmd),
        Cmd::CheckTable(cmd) => check_table_cmd(cmd),
    };
    if let Err(e) = result {
        error!("{}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
