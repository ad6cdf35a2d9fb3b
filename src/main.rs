//! rusty_nes_core - headless cartridge inspector
//!
//! Loads a ROM onto the CPU bus without an instruction core, replays bus
//! writes and scanline clocks given on the command line, and prints how the
//! mapper laid out the PRG and CHR windows.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use rusty_nes_core::cartridge::{BankStore, BATTERY_RAM_SIZE};
use rusty_nes_core::cpu::CpuBus;
use rusty_nes_core::headless::{HeadlessPpu, SilentApu};
use rusty_nes_core::mappers::Mapper;
use rusty_nes_core::memory::Bus;
use rusty_nes_core::ppu::PictureUnit;
use rusty_nes_core::savestate::SaveState;
use rusty_nes_core::util::{checksum, combine_bytes, hexdump};

/// Command line arguments for rusty_nes_core
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the NES ROM file
    #[clap(name = "ROM")]
    rom_path: PathBuf,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    /// Bus write to replay, e.g. 8000=0F (hex). May be repeated.
    #[clap(short, long = "write", value_name = "ADDR=VALUE", value_parser = parse_write)]
    writes: Vec<(u16, u8)>,

    /// Scanlines to clock the mapper IRQ counter after the writes
    #[clap(long, default_value = "0")]
    scanlines: u32,

    /// Write a save state after replaying
    #[clap(long, value_name = "PATH")]
    save_state: Option<PathBuf>,

    /// Restore a save state before replaying
    #[clap(long, value_name = "PATH")]
    load_state: Option<PathBuf>,

    /// Battery RAM file, read before loading and written back if changed
    #[clap(long, value_name = "PATH")]
    sram: Option<PathBuf>,

    /// Hexdump this many bytes of each PRG window
    #[clap(long, default_value = "0")]
    dump: usize,
}

fn parse_write(arg: &str) -> Result<(u16, u8)> {
    let Some((address, value)) = arg.split_once('=') else {
        bail!("expected ADDR=VALUE, got '{}'", arg);
    };
    let address = u16::from_str_radix(address.trim_start_matches("0x").trim_start_matches('$'), 16)
        .with_context(|| format!("invalid address '{}'", address))?;
    let value = u8::from_str_radix(value.trim_start_matches("0x").trim_start_matches('$'), 16)
        .with_context(|| format!("invalid value '{}'", value))?;
    Ok((address, value))
}

fn load_banks(rom_path: &Path, sram: Option<&Path>) -> Result<BankStore> {
    let rom_data = std::fs::read(rom_path)
        .with_context(|| format!("Failed to read ROM file: {}", rom_path.display()))?;
    let mut banks = BankStore::from_ines(&rom_data)
        .with_context(|| format!("Failed to parse ROM: {}", rom_path.display()))?;

    if let Some(path) = sram.filter(|p| p.exists()) {
        if banks.has_battery() {
            let ram = std::fs::read(path)
                .with_context(|| format!("Failed to read battery RAM: {}", path.display()))?;
            if ram.len() != BATTERY_RAM_SIZE {
                warn!("Ignoring battery RAM of {} bytes", ram.len());
            } else {
                banks = banks.with_battery_ram(ram);
            }
        } else {
            warn!("Cartridge has no battery, ignoring {}", path.display());
        }
    }
    Ok(banks)
}

fn print_summary(bus: &Bus<HeadlessPpu, SilentApu>, dump: usize) {
    let Some(banks) = bus.cartridge() else {
        return;
    };
    let memory = &bus.memory;

    println!(
        "Mapper: {} ({})",
        bus.mapper_kind().map_or_else(|| "none".to_string(), |k| k.to_string()),
        banks.mapper_number()
    );
    println!("PRG banks: {} x 16KB", banks.rom_count());
    println!("CHR banks: {} x 4KB", banks.vrom_count());
    match bus.ppu.mirroring() {
        Some(mirroring) => println!("Mirroring: {:?}", mirroring),
        None => println!("Mirroring: unset"),
    }
    println!(
        "Reset vector: ${:04X}",
        combine_bytes(memory[0xFFFC], memory[0xFFFD])
    );

    for start in (0x8000..0x10000).step_by(0x2000) {
        let window = &memory[start..start + 0x2000];
        println!("PRG ${:04X}: {:08X}", start, checksum(window));
        if dump > 0 {
            print!("{}", hexdump(&window[..dump.min(window.len())], start as u16));
        }
    }
    for start in (0..0x2000).step_by(0x400) {
        let window = &bus.ppu.pattern_memory()[start..start + 0x400];
        println!("CHR ${:04X}: {:08X}", start, checksum(window));
    }
    if let Some(ram) = bus.battery_ram() {
        println!("Battery RAM: {:08X}", checksum(ram));
    }
    let interrupts = bus.signals.interrupts();
    if !interrupts.is_empty() {
        println!("Pending interrupts: {:?}", interrupts);
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("Loading ROM: {}", args.rom_path.display());
    let banks = load_banks(&args.rom_path, args.sram.as_deref())?;

    let mut bus = Bus::new(HeadlessPpu::new(), SilentApu::new());
    let mapper = Mapper::for_cartridge(&banks)
        .with_context(|| format!("Failed to load ROM: {}", args.rom_path.display()))?;
    bus.install(mapper, banks)
        .with_context(|| format!("Failed to load ROM: {}", args.rom_path.display()))?;

    if let Some(path) = &args.load_state {
        SaveState::read_file(path)
            .and_then(|state| state.apply_to_bus(&mut bus))
            .with_context(|| format!("Failed to load save state: {}", path.display()))?;
    }

    for &(address, value) in &args.writes {
        bus.store(address as u32, value);
    }
    for _ in 0..args.scanlines {
        bus.clock_irq_counter();
    }

    print_summary(&bus, args.dump);

    if let Some(path) = &args.save_state {
        SaveState::capture_bus(&bus)
            .and_then(|state| state.write_file(path))
            .with_context(|| format!("Failed to write save state: {}", path.display()))?;
    }

    if let Some(path) = &args.sram {
        if bus.take_battery_dirty() {
            if let Some(ram) = bus.battery_ram() {
                std::fs::write(path, ram)
                    .with_context(|| format!("Failed to write battery RAM: {}", path.display()))?;
                info!("Battery RAM written to {}", path.display());
            }
        }
    }

    Ok(())
}
