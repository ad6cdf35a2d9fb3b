//! Mapper 000 (NROM) implementation
//!
//! The simplest board: no bank switching at all.
//! Used by games like Super Mario Bros., Donkey Kong, Excitebike, etc.
//!
//! Memory map:
//! - PRG ROM: 16KB (mirrored into both windows) or 32KB at 0x8000-0xFFFF
//! - CHR ROM: 4KB (mirrored) or 8KB at PPU 0x0000-0x1FFF

use log::{info, trace};

use super::banks::{load_battery_ram, load_chr_rom, load_prg_rom};
use super::{check_cartridge, BankSwitching, LoadError, MapperContext, MapperKind};
use crate::cpu::Interrupt;
use crate::ppu::PictureUnit;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapper000;

impl Mapper000 {
    pub fn new() -> Self {
        Mapper000
    }
}

impl BankSwitching for Mapper000 {
    fn kind(&self) -> MapperKind {
        MapperKind::Nrom
    }

    fn reset(&mut self) {}

    fn write<P: PictureUnit>(&mut self, _ctx: &mut MapperContext<'_, P>, address: u16, value: u8) {
        trace!("NROM: ignoring write to ROM ${:04X} = ${:02X}", address, value);
    }

    fn load_rom<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>) -> Result<(), LoadError> {
        check_cartridge(self.kind(), ctx.banks)?;

        load_prg_rom(ctx.banks, ctx.memory);
        load_chr_rom(ctx.banks, ctx.ppu);
        load_battery_ram(ctx.banks, ctx.memory);

        info!(
            "NROM: loaded {} PRG and {} CHR banks",
            ctx.banks.rom_count(),
            ctx.banks.vrom_count()
        );
        ctx.signals.request_interrupt(Interrupt::Reset);
        Ok(())
    }
}
