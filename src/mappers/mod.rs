//! Mapper implementations for NES cartridges
//!
//! The NES uses various memory mappers to expand the capabilities of the hardware.
//! This module provides the four boards this core supports (NROM, MMC1, UNROM
//! and MMC3) as variants of one [`Mapper`] sum type. Mappers never read ROM
//! on the fly: every bank switch copies the selected bank out of the
//! [`BankStore`] into the CPU memory image or the PPU's pattern memory through
//! the primitives in [`banks`].

pub mod banks;
mod mapper000; // NROM
mod mapper001; // MMC1
mod mapper002; // UNROM
mod mapper004; // MMC3

pub use mapper000::Mapper000;
pub use mapper001::Mapper001;
pub use mapper002::Mapper002;
pub use mapper004::Mapper004;

use std::fmt;

use bincode::{Decode, Encode};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cartridge::{BankStore, CartridgeError};
use crate::cpu::CpuSignals;
use crate::memory::CpuMemory;
use crate::ppu::PictureUnit;
use crate::savestate::{MapperState, SaveStateError};

/// Errors raised when a mapper cannot lay out a cartridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("{0}: invalid ROM, unable to load")]
    InvalidCartridge(MapperKind),

    #[error("{0}: cartridge has no PRG banks")]
    NoPrgBanks(MapperKind),

    #[error(transparent)]
    Cartridge(#[from] CartridgeError),
}

/// Supported boards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum MapperKind {
    /// Mapper 0, no bank switching
    Nrom,

    /// Mapper 1, serial shift register
    Mmc1,

    /// Mapper 2, one switchable 16KB window
    Unrom,

    /// Mapper 4, command/address select with scanline IRQ
    Mmc3,
}

impl MapperKind {
    /// Look up a board by iNES mapper number
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(MapperKind::Nrom),
            1 => Some(MapperKind::Mmc1),
            2 => Some(MapperKind::Unrom),
            4 => Some(MapperKind::Mmc3),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            MapperKind::Nrom => 0,
            MapperKind::Mmc1 => 1,
            MapperKind::Unrom => 2,
            MapperKind::Mmc3 => 4,
        }
    }
}

impl fmt::Display for MapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MapperKind::Nrom => "NROM",
            MapperKind::Mmc1 => "MMC1",
            MapperKind::Unrom => "UNROM",
            MapperKind::Mmc3 => "MMC3",
        };
        write!(f, "{}", name)
    }
}

/// Everything a mapper may touch while handling a write or laying out a cartridge
pub struct MapperContext<'a, P: PictureUnit> {
    pub banks: &'a BankStore,
    pub memory: &'a mut CpuMemory,
    pub ppu: &'a mut P,
    pub signals: &'a mut CpuSignals,
}

/// Behaviour shared by every board
pub trait BankSwitching {
    fn kind(&self) -> MapperKind;

    /// Zero all registers
    fn reset(&mut self);

    /// Write to the cartridge window ($8000-$FFFF)
    fn write<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>, address: u16, value: u8);

    /// Power-on bank layout for a freshly inserted cartridge. Requests a reset
    /// interrupt on success.
    fn load_rom<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>) -> Result<(), LoadError>;

    /// Called once per scanline
    fn clock_irq_counter(&mut self, _signals: &mut CpuSignals) {}

    /// PPU address latch snoop
    fn latch_access(&mut self, _address: u16) {}
}

/// Refuse images that failed validation or carry no program banks
pub fn check_cartridge(kind: MapperKind, banks: &BankStore) -> Result<(), LoadError> {
    if !banks.is_valid() {
        warn!("{}: Invalid ROM! Unable to load.", kind);
        return Err(LoadError::InvalidCartridge(kind));
    }
    if banks.rom_count() == 0 {
        warn!("{}: ROM has no PRG banks. Unable to load.", kind);
        return Err(LoadError::NoPrgBanks(kind));
    }
    Ok(())
}

/// The active board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapper {
    Nrom(Mapper000),
    Mmc1(Mapper001),
    Unrom(Mapper002),
    Mmc3(Mapper004),
}

impl Mapper {
    /// A board in its reset state
    pub fn create(kind: MapperKind) -> Self {
        match kind {
            MapperKind::Nrom => Mapper::Nrom(Mapper000::new()),
            MapperKind::Mmc1 => Mapper::Mmc1(Mapper001::new()),
            MapperKind::Unrom => Mapper::Unrom(Mapper002::new()),
            MapperKind::Mmc3 => Mapper::Mmc3(Mapper004::new()),
        }
    }

    /// Pick the board named by the cartridge header and check the image
    pub fn for_cartridge(banks: &BankStore) -> Result<Self, LoadError> {
        let number = banks.mapper_number();
        let kind =
            MapperKind::from_number(number).ok_or(CartridgeError::UnsupportedMapper(number))?;
        check_cartridge(kind, banks)?;
        Ok(Mapper::create(kind))
    }

    pub fn kind(&self) -> MapperKind {
        match self {
            Mapper::Nrom(m) => m.kind(),
            Mapper::Mmc1(m) => m.kind(),
            Mapper::Unrom(m) => m.kind(),
            Mapper::Mmc3(m) => m.kind(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Mapper::Nrom(m) => m.reset(),
            Mapper::Mmc1(m) => m.reset(),
            Mapper::Unrom(m) => m.reset(),
            Mapper::Mmc3(m) => m.reset(),
        }
    }

    pub fn write<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>, address: u16, value: u8) {
        match self {
            Mapper::Nrom(m) => m.write(ctx, address, value),
            Mapper::Mmc1(m) => m.write(ctx, address, value),
            Mapper::Unrom(m) => m.write(ctx, address, value),
            Mapper::Mmc3(m) => m.write(ctx, address, value),
        }
    }

    pub fn load_rom<P: PictureUnit>(&mut self, ctx: &mut MapperContext<'_, P>) -> Result<(), LoadError> {
        match self {
            Mapper::Nrom(m) => m.load_rom(ctx),
            Mapper::Mmc1(m) => m.load_rom(ctx),
            Mapper::Unrom(m) => m.load_rom(ctx),
            Mapper::Mmc3(m) => m.load_rom(ctx),
        }
    }

    pub fn clock_irq_counter(&mut self, signals: &mut CpuSignals) {
        match self {
            Mapper::Nrom(m) => m.clock_irq_counter(signals),
            Mapper::Mmc1(m) => m.clock_irq_counter(signals),
            Mapper::Unrom(m) => m.clock_irq_counter(signals),
            Mapper::Mmc3(m) => m.clock_irq_counter(signals),
        }
    }

    pub fn latch_access(&mut self, address: u16) {
        match self {
            Mapper::Nrom(m) => m.latch_access(address),
            Mapper::Mmc1(m) => m.latch_access(address),
            Mapper::Unrom(m) => m.latch_access(address),
            Mapper::Mmc3(m) => m.latch_access(address),
        }
    }

    /// Register state of the board
    pub fn snapshot(&self) -> MapperState {
        match self {
            Mapper::Nrom(_) => MapperState::Nrom,
            Mapper::Mmc1(m) => MapperState::Mmc1(m.snapshot()),
            Mapper::Unrom(m) => MapperState::Unrom(m.snapshot()),
            Mapper::Mmc3(m) => MapperState::Mmc3(m.snapshot()),
        }
    }

    /// Put registers back from a snapshot of the same board
    pub fn restore(&mut self, state: &MapperState) -> Result<(), SaveStateError> {
        match (self, state) {
            (Mapper::Nrom(_), MapperState::Nrom) => {}
            (Mapper::Mmc1(m), MapperState::Mmc1(s)) => m.restore(s),
            (Mapper::Unrom(m), MapperState::Unrom(s)) => m.restore(s),
            (Mapper::Mmc3(m), MapperState::Mmc3(s)) => m.restore(s),
            (mapper, state) => {
                let expected = mapper.kind();
                let found = state.kind();
                warn!("Save state rejected: it was taken with {}, cartridge uses {}", found, expected);
                return Err(SaveStateError::MapperMismatch { expected, found });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::PRG_BANK_SIZE;
    use crate::savestate::UnromState;
    use crate::test_util::numbered_banks;

    #[test]
    fn kind_round_trips_mapper_numbers() {
        for kind in [MapperKind::Nrom, MapperKind::Mmc1, MapperKind::Unrom, MapperKind::Mmc3] {
            assert_eq!(MapperKind::from_number(kind.number()), Some(kind));
            assert_eq!(Mapper::create(kind).kind(), kind);
        }
        assert_eq!(MapperKind::from_number(3), None);
    }

    #[test]
    fn for_cartridge_rejects_unknown_boards() {
        let banks = BankStore::new(numbered_banks(1, PRG_BANK_SIZE), Vec::new()).with_mapper(7);
        assert_eq!(
            Mapper::for_cartridge(&banks),
            Err(LoadError::Cartridge(CartridgeError::UnsupportedMapper(7)))
        );
    }

    #[test]
    fn for_cartridge_rejects_invalid_images() {
        assert_eq!(
            Mapper::for_cartridge(&BankStore::invalid()),
            Err(LoadError::InvalidCartridge(MapperKind::Nrom))
        );

        let empty = BankStore::new(Vec::new(), Vec::new()).with_mapper(4);
        assert_eq!(
            Mapper::for_cartridge(&empty),
            Err(LoadError::NoPrgBanks(MapperKind::Mmc3))
        );
    }

    #[test]
    fn restore_rejects_other_board() {
        let mut mapper = Mapper::create(MapperKind::Mmc1);
        let result = mapper.restore(&MapperState::Unrom(UnromState { prg_bank: 1 }));
        assert!(matches!(
            result,
            Err(SaveStateError::MapperMismatch {
                expected: MapperKind::Mmc1,
                found: MapperKind::Unrom,
            })
        ));
    }

    #[test]
    fn display_names() {
        assert_eq!(MapperKind::Mmc3.to_string(), "MMC3");
        assert_eq!(
            LoadError::InvalidCartridge(MapperKind::Unrom).to_string(),
            "UNROM: invalid ROM, unable to load"
        );
    }
}
