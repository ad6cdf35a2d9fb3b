//! Mapper 002 (UNROM) implementation
//!
//! This mapper features PRG ROM banking with fixed last bank.
//! Used by games like Mega Man, Duck Tales, Castlevania, etc.
//!
//! Memory map:
//! - PRG ROM: Switchable 16KB bank at 0x8000 + last bank fixed at 0xC000
//! - CHR: 8KB, never switched

use log::debug;

use super::banks::{load_chr_rom, load_rom_bank};
use super::{check_cartridge, BankSwitching, LoadError, MapperContext, MapperKind};
use crate::cpu::Interrupt;
use crate::ppu::PictureUnit;
use crate::savestate::UnromState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapper002 {
    /// Bank currently mapped at 0x8000
    prg_bank: u8,
}

impl Mapper002 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UnromState {
        UnromState {
            prg_bank: self.prg_bank,
        }
    }

    pub fn restore(&mut self, state: &UnromState) {
        self.prg_bank = state.prg_bank;
    }
}

impl BankSwitching for Mapper002 {
    fn kind(&self) -> MapperKind {
        MapperKind::Unrom
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
    }

    fn write<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>, address: u16, value: u8) {
        let count = ctx.banks.rom_count();
        if count == 0 {
            return;
        }

        self.prg_bank = (value as usize % count) as u8;
        debug!("UNROM: ${:04X} selects PRG bank {}", address, self.prg_bank);
        load_rom_bank(ctx.banks, ctx.memory, value as usize, 0x8000);
    }

    fn load_rom<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>) -> Result<(), LoadError> {
        check_cartridge(self.kind(), ctx.banks)?;

        load_rom_bank(ctx.banks, ctx.memory, 0, 0x8000);
        load_rom_bank(ctx.banks, ctx.memory, ctx.banks.rom_count() - 1, 0xC000);
        load_chr_rom(ctx.banks, ctx.ppu);

        ctx.signals.request_interrupt(Interrupt::Reset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{BankStore, CHR_BANK_SIZE, PRG_BANK_SIZE};
    use crate::test_util::{numbered_banks, prg_byte, Harness};

    fn harness(prg: usize) -> (Harness, Mapper002) {
        let mut h = Harness::new(BankStore::new(
            numbered_banks(prg, PRG_BANK_SIZE),
            numbered_banks(2, CHR_BANK_SIZE),
        ));
        let mut mapper = Mapper002::new();
        mapper.load_rom(&mut h.ctx()).unwrap();
        (h, mapper)
    }

    #[test]
    fn load_rom_fixes_last_bank_on_top() {
        let (h, _) = harness(8);
        assert_eq!(h.memory[0x8000], prg_byte(0, 0));
        assert_eq!(h.memory[0xC000], prg_byte(7, 0));
        assert_eq!(h.signals.interrupts(), &[Interrupt::Reset]);
    }

    #[test]
    fn any_write_switches_lower_window() {
        let (mut h, mut mapper) = harness(8);
        mapper.write(&mut h.ctx(), 0xF123, 3);
        assert_eq!(h.memory[0x8000], prg_byte(3, 0));
        assert_eq!(h.memory[0xBFFF], prg_byte(3, 0x3FFF));
        assert_eq!(h.memory[0xC000], prg_byte(7, 0));
    }

    #[test]
    fn bank_number_wraps() {
        let (mut h, mut mapper) = harness(8);
        mapper.write(&mut h.ctx(), 0x8000, 11);
        assert_eq!(h.memory[0x8000], prg_byte(3, 0));
        assert_eq!(mapper.snapshot().prg_bank, 3);
    }

    #[test]
    fn upper_window_never_changes() {
        let (mut h, mut mapper) = harness(4);
        let top = h.memory[0xC000..].to_vec();
        for bank in 0..=255u8 {
            mapper.write(&mut h.ctx(), 0x8000, bank);
        }
        assert_eq!(h.memory[0xC000..], top[..]);
    }
}
