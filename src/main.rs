use std::path::PathBuf;

use clap::Parser;
use clap_derive::Parser;
use log::info;

use crate::bios::a20::set_a20;
use crate::bios::frame::RegisterFrame;
use crate::bios::init::init_bios;
use crate::bios::memmap::{E820_ENTRY_SIZE, MAX_E820_ENTRIES, SMAP_SIGNATURE};
use crate::bios::system::SystemServices;
use crate::config::{CallScript, ConfigError, PlatformConfig};
use crate::vm::runtime::Runtime;

mod bios;
mod config;
mod io;
mod vm;

/// Where the probe sequence asks E820 to store entries (0000:0500).
const PROBE_BUFFER: u16 = 0x0500;

#[derive(Parser, Debug)]
#[command(name = "bios-services", about = "INT 15h system services on an emulated PC")]
struct CLI {
    /// Call script (JSON). Without one, a built-in memory probe is run.
    script: Option<PathBuf>,
    /// Platform description (JSON): RAM size, EBDA segment, memory map
    #[arg(long)]
    config: Option<PathBuf>,
    /// Installed RAM in MiB, overrides the configuration file
    #[arg(long)]
    ram_mb: Option<u32>,
}

/// What a boot loader asks before it picks a place for the kernel.
fn probe_calls() -> Vec<RegisterFrame> {
    let mut calls: Vec<RegisterFrame> = [0x2402u16, 0x2403, 0x8800, 0xE801, 0xC000, 0xC100]
        .into_iter()
        .map(RegisterFrame::with_ax)
        .collect();

    let mut e820 = RegisterFrame::default();
    e820.eax.set_dword(0xE820);
    e820.edx.set_dword(SMAP_SIGNATURE);
    e820.ecx.set_dword(E820_ENTRY_SIZE);
    e820.edi.set(PROBE_BUFFER);
    calls.push(e820);
    calls
}

fn run_probe(vm: &mut Runtime, services: &SystemServices) {
    for regs in probe_calls() {
        if regs.eax.dword() != 0xE820 {
            let out = services.dispatch(vm, &regs);
            println!("AX={:04X} -> {:?}", regs.eax.word(), out);
            continue;
        }

        // follow the continuation cursor until the table is exhausted
        let mut regs = regs;
        for _ in 0..MAX_E820_ENTRIES {
            let out = services.dispatch(vm, &regs);
            if out.carry() {
                println!("E820 cursor {} -> failed, AH={:02X}", regs.ebx.dword(), out.status());
                break;
            }
            let address = PROBE_BUFFER as u32;
            println!(
                "E820 {:016X} {:016X} type {}",
                vm.memory.read_qword(address),
                vm.memory.read_qword(address + 8),
                vm.memory.read_dword(address + 16)
            );
            if out.ebx.dword() == 0 {
                break;
            }
            regs.ebx.set_dword(out.ebx.dword());
        }
    }
}

fn run_script(vm: &mut Runtime, services: &SystemServices, script: &CallScript) {
    if script.a20 {
        set_a20(vm, true);
    }
    for poke in &script.memory {
        vm.memory.write_bytes(poke.address, &poke.bytes);
    }
    if script.a20 {
        set_a20(vm, false);
    }

    for call in &script.calls {
        let regs = RegisterFrame::from(call);
        let out = services.dispatch(vm, &regs);
        println!("{:?}\n  -> {:?}", regs, out);
    }
}

fn run(args: CLI) -> Result<(), ConfigError> {
    let mut config = match &args.config {
        Some(path) => PlatformConfig::load(path)?,
        None => PlatformConfig::default(),
    };
    if let Some(ram_mb) = args.ram_mb {
        config.ram_mb = ram_mb;
    }
    let script = args.script.as_deref().map(CallScript::load).transpose()?;

    let platform = config.into_platform()?;
    let mut vm = Runtime::new(platform.ram_size() as usize);
    init_bios(&mut vm, &platform);
    let services = SystemServices::new(platform);

    match script {
        Some(script) => run_script(&mut vm, &services, &script),
        None => run_probe(&mut vm, &services),
    }
    info!("final machine state: {:?}", vm);
    Ok(())
}

fn main() {
    env_logger::init();
    let args = CLI::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
