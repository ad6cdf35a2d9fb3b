//! Mapper 004 (MMC3) implementation
//!
//! This mapper features PRG ROM banking, CHR ROM banking, and configurable mirroring.
//! It also has an IRQ counter that is clocked once per scanline.
//!
//! Used by games like Super Mario Bros. 2/3, Mega Man 3-6, Kirby's Adventure, etc.
//!
//! Memory map:
//! - PRG ROM: Two switchable 8KB banks + two 8KB banks hardwired to the second-to-last 16KB bank
//! - PRG RAM: 8KB (0x6000-0x7FFF)
//! - CHR ROM: Two switchable 2KB areas (as 1KB pairs) + four switchable 1KB banks

use log::{debug, trace};

use super::banks::{load_1k_vrom_bank, load_8k_rom_bank, load_battery_ram, load_chr_rom};
use super::{check_cartridge, BankSwitching, LoadError, MapperContext, MapperKind};
use crate::cartridge::{BankStore, Mirroring};
use crate::cpu::{CpuSignals, Interrupt};
use crate::memory::CpuMemory;
use crate::ppu::PictureUnit;
use crate::savestate::Mmc3State;

/// Bank select commands ($8000 bits 0-2)
mod command {
    pub const SEL_2_1K_VROM_0000: u8 = 0;
    pub const SEL_2_1K_VROM_0800: u8 = 1;
    pub const SEL_1K_VROM_1000: u8 = 2;
    pub const SEL_1K_VROM_1400: u8 = 3;
    pub const SEL_1K_VROM_1800: u8 = 4;
    pub const SEL_1K_VROM_1C00: u8 = 5;
    pub const SEL_ROM_PAGE1: u8 = 6;
    pub const SEL_ROM_PAGE2: u8 = 7;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapper004 {
    /// Command run by the next bank data write (0-7)
    command: u8,

    /// PRG ROM bank mode: 1 swaps the switchable window at 0x8000 with the fixed one at 0xC000
    prg_address_select: u8,

    /// CHR ROM bank mode: 1 swaps the 0x0000 and 0x1000 halves
    chr_address_select: u8,

    /// Last bank data value written
    page_number: u8,

    /// IRQ counter
    irq_counter: i32,

    /// IRQ counter reload value
    irq_latch_value: u8,

    /// IRQ enabled flag
    irq_enable: bool,

    /// The PRG mode flipped and the hardwired bank must be re-homed
    prg_address_changed: bool,
}

impl Mapper004 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Mmc3State {
        Mmc3State {
            command: self.command,
            prg_address_select: self.prg_address_select,
            chr_address_select: self.chr_address_select,
            page_number: self.page_number,
            irq_counter: self.irq_counter,
            irq_latch_value: self.irq_latch_value,
            irq_enable: self.irq_enable,
            prg_address_changed: self.prg_address_changed,
        }
    }

    pub fn restore(&mut self, state: &Mmc3State) {
        self.command = state.command & 7;
        self.prg_address_select = state.prg_address_select & 1;
        self.chr_address_select = state.chr_address_select & 1;
        self.page_number = state.page_number;
        self.irq_counter = state.irq_counter;
        self.irq_latch_value = state.irq_latch_value;
        self.irq_enable = state.irq_enable;
        self.prg_address_changed = state.prg_address_changed;
    }

    /// Re-home the hardwired second-to-last 8KB bank after a PRG mode change
    fn load_hardwired_bank(&mut self, banks: &BankStore, memory: &mut CpuMemory) {
        if !self.prg_address_changed {
            return;
        }
        let hardwired = banks.rom_count().saturating_sub(1) * 2;
        let address = if self.prg_address_select == 0 { 0xC000 } else { 0x8000 };
        load_8k_rom_bank(banks, memory, hardwired, address);
        self.prg_address_changed = false;
    }

    fn execute_command<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>, arg: u8) {
        debug!("MMC3: command {} arg ${:02X}", self.command, arg);

        let arg = arg as usize;
        // CHR targets flip between the two pattern tables
        let chr_select = self.chr_address_select;
        let chr = move |address: u16| if chr_select == 0 { address } else { address ^ 0x1000 };

        match self.command {
            command::SEL_2_1K_VROM_0000 => {
                load_1k_vrom_bank(ctx.banks, ctx.ppu, arg, chr(0x0000));
                load_1k_vrom_bank(ctx.banks, ctx.ppu, arg + 1, chr(0x0400));
            }
            command::SEL_2_1K_VROM_0800 => {
                load_1k_vrom_bank(ctx.banks, ctx.ppu, arg, chr(0x0800));
                load_1k_vrom_bank(ctx.banks, ctx.ppu, arg + 1, chr(0x0C00));
            }
            command::SEL_1K_VROM_1000 => load_1k_vrom_bank(ctx.banks, ctx.ppu, arg, chr(0x1000)),
            command::SEL_1K_VROM_1400 => load_1k_vrom_bank(ctx.banks, ctx.ppu, arg, chr(0x1400)),
            command::SEL_1K_VROM_1800 => load_1k_vrom_bank(ctx.banks, ctx.ppu, arg, chr(0x1800)),
            command::SEL_1K_VROM_1C00 => load_1k_vrom_bank(ctx.banks, ctx.ppu, arg, chr(0x1C00)),
            command::SEL_ROM_PAGE1 => {
                self.load_hardwired_bank(ctx.banks, ctx.memory);
                let address = if self.prg_address_select == 0 { 0x8000 } else { 0xC000 };
                load_8k_rom_bank(ctx.banks, ctx.memory, arg, address);
            }
            _ => {
                load_8k_rom_bank(ctx.banks, ctx.memory, arg, 0xA000);
                self.load_hardwired_bank(ctx.banks, ctx.memory);
            }
        }
    }
}

impl BankSwitching for Mapper004 {
    fn kind(&self) -> MapperKind {
        MapperKind::Mmc3
    }

    fn reset(&mut self) {
        *self = Mapper004::new();
    }

    fn write<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>, address: u16, value: u8) {
        match address {
            0x8000 => {
                // Bank select
                self.command = value & 0x07;
                let prg_select = (value >> 6) & 0x01;
                if prg_select != self.prg_address_select {
                    self.prg_address_changed = true;
                }
                self.prg_address_select = prg_select;
                self.chr_address_select = (value >> 7) & 0x01;
            }
            0x8001 => {
                // Bank data
                self.page_number = value;
                self.execute_command(ctx, value);
            }
            0xA000 => {
                ctx.ppu.set_mirroring(if value & 0x01 == 0 {
                    Mirroring::Vertical
                } else {
                    Mirroring::Horizontal
                });
            }
            // PRG RAM protect, which the battery window ignores
            0xA001 => {}
            0xC000 => self.irq_counter = value as i32,
            0xC001 => self.irq_latch_value = value,
            0xE000 => self.irq_enable = false,
            0xE001 => self.irq_enable = true,
            _ => trace!("MMC3: ignoring write to ${:04X} = ${:02X}", address, value),
        }
    }

    fn load_rom<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>) -> Result<(), LoadError> {
        check_cartridge(self.kind(), ctx.banks)?;

        // Hardwired banks at 0xC000 and 0xE000, switchable ones at 0x8000 and 0xA000
        let last = (ctx.banks.rom_count() - 1) * 2;
        load_8k_rom_bank(ctx.banks, ctx.memory, last, 0xC000);
        load_8k_rom_bank(ctx.banks, ctx.memory, last + 1, 0xE000);
        load_8k_rom_bank(ctx.banks, ctx.memory, 0, 0x8000);
        load_8k_rom_bank(ctx.banks, ctx.memory, 1, 0xA000);

        load_chr_rom(ctx.banks, ctx.ppu);
        load_battery_ram(ctx.banks, ctx.memory);

        ctx.signals.request_interrupt(Interrupt::Reset);
        Ok(())
    }

    fn clock_irq_counter(&mut self, signals: &mut CpuSignals) {
        if !self.irq_enable {
            return;
        }
        self.irq_counter -= 1;
        if self.irq_counter < 0 {
            signals.request_interrupt(Interrupt::Normal);
            self.irq_counter = self.irq_latch_value as i32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{CHR_BANK_SIZE, PRG_BANK_SIZE};
    use crate::test_util::{chr_byte, numbered_banks, prg_byte, Harness};

    fn harness(prg: usize, chr: usize) -> (Harness, Mapper004) {
        let mut h = Harness::new(BankStore::new(
            numbered_banks(prg, PRG_BANK_SIZE),
            numbered_banks(chr, CHR_BANK_SIZE),
        ));
        let mut mapper = Mapper004::new();
        mapper.load_rom(&mut h.ctx()).unwrap();
        h.signals.clear();
        (h, mapper)
    }

    #[test]
    fn load_rom_layout() {
        let (h, _) = harness(4, 2);
        assert_eq!(h.memory[0x8000], prg_byte(0, 0));
        assert_eq!(h.memory[0xA000], prg_byte(0, 0x2000));
        assert_eq!(h.memory[0xC000], prg_byte(3, 0));
        assert_eq!(h.memory[0xE000], prg_byte(3, 0x2000));
    }

    #[test]
    fn prg_page_commands() {
        let (mut h, mut mapper) = harness(4, 2);
        mapper.write(&mut h.ctx(), 0x8000, command::SEL_ROM_PAGE1);
        mapper.write(&mut h.ctx(), 0x8001, 3);
        assert_eq!(h.memory[0x8000], prg_byte(1, 0x2000));

        mapper.write(&mut h.ctx(), 0x8000, command::SEL_ROM_PAGE2);
        mapper.write(&mut h.ctx(), 0x8001, 4);
        assert_eq!(h.memory[0xA000], prg_byte(2, 0));
    }

    #[test]
    fn prg_mode_flip_rehomes_hardwired_bank() {
        let (mut h, mut mapper) = harness(4, 2);
        mapper.write(&mut h.ctx(), 0x8000, 0x40 | command::SEL_ROM_PAGE1);
        assert!(mapper.snapshot().prg_address_changed);

        mapper.write(&mut h.ctx(), 0x8001, 2);
        assert_eq!(h.memory[0x8000], prg_byte(3, 0));
        assert_eq!(h.memory[0xC000], prg_byte(1, 0));
        assert!(!mapper.snapshot().prg_address_changed);
    }

    #[test]
    fn chr_commands_load_1k_banks() {
        let (mut h, mut mapper) = harness(2, 4);
        mapper.write(&mut h.ctx(), 0x8000, command::SEL_2_1K_VROM_0800);
        mapper.write(&mut h.ctx(), 0x8001, 6);
        assert_eq!(h.ppu.pattern_memory()[0x0800], chr_byte(1, 0x0800));
        assert_eq!(h.ppu.pattern_memory()[0x0C00], chr_byte(1, 0x0C00));

        mapper.write(&mut h.ctx(), 0x8000, command::SEL_1K_VROM_1C00);
        mapper.write(&mut h.ctx(), 0x8001, 13);
        assert_eq!(h.ppu.pattern_memory()[0x1C00], chr_byte(3, 0x0400));
    }

    #[test]
    fn chr_select_swaps_pattern_tables() {
        let (mut h, mut mapper) = harness(2, 4);
        mapper.write(&mut h.ctx(), 0x8000, 0x80 | command::SEL_2_1K_VROM_0000);
        mapper.write(&mut h.ctx(), 0x8001, 8);
        assert_eq!(h.ppu.pattern_memory()[0x1000], chr_byte(2, 0));
        assert_eq!(h.ppu.pattern_memory()[0x1400], chr_byte(2, 0x0400));

        mapper.write(&mut h.ctx(), 0x8000, 0x80 | command::SEL_1K_VROM_1800);
        mapper.write(&mut h.ctx(), 0x8001, 15);
        assert_eq!(h.ppu.pattern_memory()[0x0800], chr_byte(3, 0x0C00));
    }

    #[test]
    fn mirroring_register() {
        let (mut h, mut mapper) = harness(2, 2);
        mapper.write(&mut h.ctx(), 0xA000, 1);
        assert_eq!(h.ppu.mirroring(), Some(Mirroring::Horizontal));
        mapper.write(&mut h.ctx(), 0xA000, 0);
        assert_eq!(h.ppu.mirroring(), Some(Mirroring::Vertical));
    }

    #[test]
    fn irq_counter_underflow() {
        let (mut h, mut mapper) = harness(2, 2);
        mapper.write(&mut h.ctx(), 0xC000, 2);
        mapper.write(&mut h.ctx(), 0xC001, 5);
        mapper.write(&mut h.ctx(), 0xE001, 0);

        mapper.clock_irq_counter(&mut h.signals);
        mapper.clock_irq_counter(&mut h.signals);
        assert_eq!(mapper.snapshot().irq_counter, 0);
        assert!(h.signals.is_empty());

        mapper.clock_irq_counter(&mut h.signals);
        assert_eq!(h.signals.interrupts(), &[Interrupt::Normal]);
        assert_eq!(mapper.snapshot().irq_counter, 5);
    }

    #[test]
    fn disable_freezes_counter() {
        let (mut h, mut mapper) = harness(2, 2);
        mapper.write(&mut h.ctx(), 0xC000, 3);
        mapper.write(&mut h.ctx(), 0xE001, 0);
        mapper.clock_irq_counter(&mut h.signals);

        mapper.write(&mut h.ctx(), 0xE000, 0);
        for _ in 0..10 {
            mapper.clock_irq_counter(&mut h.signals);
        }
        assert_eq!(mapper.snapshot().irq_counter, 2);
        assert!(!mapper.snapshot().irq_enable);
        assert!(h.signals.is_empty());
    }

    #[test]
    fn snapshot_round_trip_replays_identically() {
        let (mut h, mut mapper) = harness(4, 4);
        mapper.write(&mut h.ctx(), 0x8000, 0x40 | command::SEL_ROM_PAGE2);
        mapper.write(&mut h.ctx(), 0xC000, 7);
        mapper.write(&mut h.ctx(), 0xE001, 0);

        let (mut other, mut restored) = harness(4, 4);
        other.memory = h.memory.clone();
        restored.restore(&mapper.snapshot());
        assert_eq!(restored, mapper);

        mapper.write(&mut h.ctx(), 0x8001, 5);
        restored.write(&mut other.ctx(), 0x8001, 5);
        assert_eq!(h.memory, other.memory);
    }

    #[test]
    fn only_exact_register_addresses_decode() {
        let (mut h, mut mapper) = harness(4, 4);
        let memory = h.memory.clone();
        let pattern = h.ppu.pattern_memory().to_vec();
        let before = mapper.clone();

        for address in [0x8002, 0x9FFE, 0x9FFF, 0xA002, 0xBFFE, 0xC002, 0xDFFF, 0xE123, 0xFFFF] {
            mapper.write(&mut h.ctx(), address, 0xC6);
        }

        assert_eq!(mapper, before);
        assert_eq!(h.memory, memory);
        assert_eq!(h.ppu.pattern_memory(), &pattern[..]);
        assert_eq!(h.ppu.mirroring(), None);
    }
}
