//! Mapper 001 (MMC1) implementation
//!
//! This mapper features PRG ROM banking, CHR ROM banking, and configurable mirroring.
//! Used by games like The Legend of Zelda, Metroid, Final Fantasy, etc.
//!
//! Registers are loaded serially: each write to 0x8000-0xFFFF shifts bit 0 of
//! the value into a 5-bit buffer, and the fifth write commits the buffer to the
//! register selected by the address of that write. A write with bit 7 set
//! clears the buffer instead.
//!
//! Memory map:
//! - PRG ROM: 16KB/32KB with banking
//! - PRG RAM: 8KB (0x6000-0x7FFF), battery-backed on some boards
//! - CHR ROM: 4KB/8KB with banking

use log::debug;

use super::banks::{
    load_8k_vrom_bank, load_battery_ram, load_chr_rom, load_32k_rom_bank, load_rom_bank,
    load_vrom_bank,
};
use super::{check_cartridge, BankSwitching, LoadError, MapperContext, MapperKind};
use crate::cartridge::{BankStore, Mirroring};
use crate::cpu::Interrupt;
use crate::ppu::PictureUnit;
use crate::savestate::Mmc1State;

/// Writes needed to fill the shift register
const SHIFT_REGISTER_WIDTH: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapper001 {
    /// Shift register for serial writes
    shift_register: u8,

    /// Bits shifted in so far
    shift_count: u8,

    /// Control bits 0-1, last mirroring mode applied
    mirroring: u8,

    /// Control bit 2: 0 switches the window at 0xC000, 1 the one at 0x8000
    prg_switching_area: u8,

    /// Control bit 3: 0 switches 32KB at once, 1 switches 16KB
    prg_switching_size: u8,

    /// Control bit 4: 0 switches 8KB of CHR at once, 1 switches two 4KB banks
    chr_switching_size: u8,

    /// CHR bank 0 register (0xA000-0xBFFF) bit 4, also a PRG bank high bit
    chr_select_0: u8,

    /// CHR bank 1 register (0xC000-0xDFFF) bit 4, also a PRG bank high bit
    chr_select_1: u8,

    /// PRG bank register (0xE000-0xFFFF)
    prg_bank: u8,
}

impl Mapper001 {
    pub fn new() -> Self {
        Mapper001 {
            shift_register: 0,
            shift_count: 0,
            mirroring: 0,
            prg_switching_area: 1,
            prg_switching_size: 1,
            chr_switching_size: 0,
            chr_select_0: 0,
            chr_select_1: 0,
            prg_bank: 0,
        }
    }

    pub fn snapshot(&self) -> Mmc1State {
        Mmc1State {
            shift_register: self.shift_register,
            shift_count: self.shift_count,
            mirroring: self.mirroring,
            prg_switching_area: self.prg_switching_area,
            prg_switching_size: self.prg_switching_size,
            chr_switching_size: self.chr_switching_size,
            chr_select_0: self.chr_select_0,
            chr_select_1: self.chr_select_1,
            prg_bank: self.prg_bank,
        }
    }

    pub fn restore(&mut self, state: &Mmc1State) {
        self.shift_register = state.shift_register;
        self.shift_count = state.shift_count % SHIFT_REGISTER_WIDTH;
        self.mirroring = state.mirroring & 3;
        self.prg_switching_area = state.prg_switching_area & 1;
        self.prg_switching_size = state.prg_switching_size & 1;
        self.chr_switching_size = state.chr_switching_size & 1;
        self.chr_select_0 = state.chr_select_0 & 1;
        self.chr_select_1 = state.chr_select_1 & 1;
        self.prg_bank = state.prg_bank;
    }

    /// Register selected by the address of the fifth write
    fn register_number(address: u16) -> u8 {
        match address {
            0x8000..=0x9FFF => 0,
            0xA000..=0xBFFF => 1,
            0xC000..=0xDFFF => 2,
            _ => 3,
        }
    }

    /// CHR bank for a CHR register value; bit 4 selects the upper half of CHR ROM
    fn chr_bank(banks: &BankStore, select: u8, value: u8) -> usize {
        let bank = (value & 0xF) as usize;
        if select == 0 {
            bank
        } else {
            banks.vrom_count() / 2 + bank
        }
    }

    /// Bank offset on boards with 256KB or more of PRG ROM
    fn prg_base_bank(&self, banks: &BankStore) -> usize {
        let rom_count = banks.rom_count();
        if rom_count >= 32 {
            if self.chr_switching_size == 0 {
                if self.chr_select_0 == 1 {
                    16
                } else {
                    0
                }
            } else {
                ((self.chr_select_0 | (self.chr_select_1 << 1)) as usize) << 3
            }
        } else if rom_count >= 16 && self.chr_select_0 == 1 {
            8
        } else {
            0
        }
    }

    fn set_register<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>, reg: u8, value: u8) {
        debug!("MMC1: register {} = ${:02X}", reg, value);

        match reg {
            0 => {
                let mirroring = value & 3;
                if mirroring != self.mirroring {
                    self.mirroring = mirroring;
                    ctx.ppu.set_mirroring(match mirroring {
                        0 => Mirroring::SingleScreenLower,
                        1 => Mirroring::SingleScreenUpper,
                        2 => Mirroring::Vertical,
                        _ => Mirroring::Horizontal,
                    });
                }

                self.prg_switching_area = (value >> 2) & 1;
                self.prg_switching_size = (value >> 3) & 1;
                self.chr_switching_size = (value >> 4) & 1;
            }
            1 => {
                self.chr_select_0 = (value >> 4) & 1;
                if ctx.banks.vrom_count() > 0 {
                    let bank = Self::chr_bank(ctx.banks, self.chr_select_0, value);
                    if self.chr_switching_size == 0 {
                        load_8k_vrom_bank(ctx.banks, ctx.ppu, bank, 0x0000);
                    } else {
                        load_vrom_bank(ctx.banks, ctx.ppu, bank, 0x0000);
                    }
                }
            }
            2 => {
                self.chr_select_1 = (value >> 4) & 1;
                // In 8KB mode register 1 already covers both pattern tables
                if ctx.banks.vrom_count() > 0 && self.chr_switching_size == 1 {
                    let bank = Self::chr_bank(ctx.banks, self.chr_select_1, value);
                    load_vrom_bank(ctx.banks, ctx.ppu, bank, 0x1000);
                }
            }
            _ => {
                self.prg_bank = value & 0xF;
                let base = self.prg_base_bank(ctx.banks);
                let bank = self.prg_bank as usize;

                if self.prg_switching_size == 0 {
                    load_32k_rom_bank(ctx.banks, ctx.memory, base + bank, 0x8000);
                } else {
                    let address = if self.prg_switching_area == 0 { 0xC000 } else { 0x8000 };
                    load_rom_bank(ctx.banks, ctx.memory, base * 2 + bank, address);
                }
            }
        }
    }
}

impl Default for Mapper001 {
    fn default() -> Self {
        Self::new()
    }
}

impl BankSwitching for Mapper001 {
    fn kind(&self) -> MapperKind {
        MapperKind::Mmc1
    }

    fn reset(&mut self) {
        *self = Mapper001::new();
    }

    fn write<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>, address: u16, value: u8) {
        let reg = Self::register_number(address);

        if value & 0x80 != 0 {
            self.shift_register = 0;
            self.shift_count = 0;
            if reg == 0 {
                self.prg_switching_area = 1;
                self.prg_switching_size = 1;
            }
            return;
        }

        self.shift_register = (self.shift_register & !(1 << self.shift_count))
            | ((value & 1) << self.shift_count);
        self.shift_count += 1;

        if self.shift_count == SHIFT_REGISTER_WIDTH {
            let value = self.shift_register;
            self.shift_register = 0;
            self.shift_count = 0;
            self.set_register(ctx, reg, value);
        }
    }

    fn load_rom<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>) -> Result<(), LoadError> {
        check_cartridge(self.kind(), ctx.banks)?;

        // First bank at the bottom, last bank hardwired at the top
        load_rom_bank(ctx.banks, ctx.memory, 0, 0x8000);
        load_rom_bank(ctx.banks, ctx.memory, ctx.banks.rom_count() - 1, 0xC000);
        load_chr_rom(ctx.banks, ctx.ppu);
        load_battery_ram(ctx.banks, ctx.memory);

        ctx.signals.request_interrupt(Interrupt::Reset);
        Ok(())
    }
}
