//! NES cartridge image
//!
//! This module decodes the iNES format into the fixed-size banks the mappers
//! copy from. PRG ROM is kept as 16KB banks and CHR ROM as 4KB banks; every CHR
//! bank also carries its decoded tiles so a bank swap never has to re-decode.
//! Banks are immutable once the cartridge is loaded.

use std::fmt;
use bincode::{Decode, Encode};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tile::{decode_tiles, Tile};

/// Size of the iNES header
const INES_HEADER_SIZE: usize = 16;

/// Size of the optional trainer block that precedes PRG ROM
const TRAINER_SIZE: usize = 512;

/// iNES CHR size unit (the header counts 8KB units)
const INES_CHR_UNIT: usize = 8 * 1024;

/// Size of a PRG ROM bank (16KB)
pub const PRG_BANK_SIZE: usize = 16 * 1024;

/// Size of a CHR ROM bank (4KB)
pub const CHR_BANK_SIZE: usize = 4 * 1024;

/// Decoded tiles per CHR bank
pub const TILES_PER_CHR_BANK: usize = CHR_BANK_SIZE / 16;

/// Size of battery-backed save RAM at $6000-$7FFF
pub const BATTERY_RAM_SIZE: usize = 0x2000;

/// Mapper numbers this core implements
const SUPPORTED_MAPPERS: [u8; 4] = [0, 1, 2, 4];

/// Errors that can occur when parsing ROM files
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("Invalid iNES header")]
    InvalidHeader,

    #[error("Invalid ROM size: expected {expected} bytes, found {found}")]
    InvalidRomSize { expected: usize, found: usize },

    #[error("Unsupported mapper: {0}")]
    UnsupportedMapper(u8),

    #[error("Cartridge contains no PRG ROM")]
    NoPrgRom,
}

/// Nametable mirroring modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum Mirroring {
    /// Horizontal mirroring (vertical arrangement of nametables)
    Horizontal,

    /// Vertical mirroring (horizontal arrangement of nametables)
    Vertical,

    /// Four-screen mirroring (no mirroring)
    FourScreen,

    /// Single-screen mirroring, lower bank
    SingleScreenLower,

    /// Single-screen mirroring, upper bank
    SingleScreenUpper,
}

/// Decoded PRG/CHR banks of a cartridge
pub struct BankStore {
    /// 16KB PRG banks
    rom: Vec<Box<[u8]>>,

    /// 4KB CHR banks
    vrom: Vec<Box<[u8]>>,

    /// Decoded tiles for each CHR bank
    vrom_tiles: Vec<Box<[Tile]>>,

    /// Battery-backed RAM, present only on battery cartridges
    battery_ram: Option<Vec<u8>>,

    /// Mirroring from the header
    mirroring: Mirroring,

    /// iNES mapper number
    mapper_number: u8,

    /// Whether the image decoded cleanly
    valid: bool,
}

impl BankStore {
    /// Build a store from already-split banks. Each bank is padded or
    /// truncated to its fixed size.
    pub fn new(prg_banks: Vec<Vec<u8>>, chr_banks: Vec<Vec<u8>>) -> Self {
        let rom = prg_banks
            .into_iter()
            .map(|bank| fixed_bank(bank, PRG_BANK_SIZE))
            .collect();
        let vrom: Vec<Box<[u8]>> = chr_banks
            .into_iter()
            .map(|bank| fixed_bank(bank, CHR_BANK_SIZE))
            .collect();
        let vrom_tiles = vrom
            .iter()
            .map(|bank| decode_tiles(bank).into_boxed_slice())
            .collect();

        BankStore {
            rom,
            vrom,
            vrom_tiles,
            battery_ram: None,
            mirroring: Mirroring::Horizontal,
            mapper_number: 0,
            valid: true,
        }
    }

    /// A store for an image that failed validation
    pub fn invalid() -> Self {
        BankStore {
            valid: false,
            ..BankStore::new(Vec::new(), Vec::new())
        }
    }

    pub fn with_mapper(mut self, mapper_number: u8) -> Self {
        self.mapper_number = mapper_number;
        self
    }

    pub fn with_mirroring(mut self, mirroring: Mirroring) -> Self {
        self.mirroring = mirroring;
        self
    }

    pub fn with_battery_ram(mut self, ram: Vec<u8>) -> Self {
        self.battery_ram = Some(ram);
        self
    }

    /// Create a cartridge from ROM data in iNES format
    pub fn from_ines(data: &[u8]) -> Result<Self, CartridgeError> {
        // Check for valid iNES header
        if data.len() < INES_HEADER_SIZE || data[0..4] != [0x4E, 0x45, 0x53, 0x1A] {
            return Err(CartridgeError::InvalidHeader);
        }

        let prg_rom_size = data[4] as usize * PRG_BANK_SIZE;
        let chr_rom_size = data[5] as usize * INES_CHR_UNIT;

        let flags6 = data[6];
        let flags7 = data[7];

        let mirroring = if (flags6 & 0x08) != 0 {
            Mirroring::FourScreen
        } else if (flags6 & 0x01) != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let has_battery = (flags6 & 0x02) != 0;
        let has_trainer = (flags6 & 0x04) != 0;
        let mapper_number = (flags7 & 0xF0) | ((flags6 >> 4) & 0x0F);

        if prg_rom_size == 0 {
            return Err(CartridgeError::NoPrgRom);
        }
        if !SUPPORTED_MAPPERS.contains(&mapper_number) {
            return Err(CartridgeError::UnsupportedMapper(mapper_number));
        }

        let prg_start = INES_HEADER_SIZE + if has_trainer { TRAINER_SIZE } else { 0 };
        let prg_end = prg_start + prg_rom_size;
        let chr_end = prg_end + chr_rom_size;
        if data.len() < chr_end {
            return Err(CartridgeError::InvalidRomSize {
                expected: chr_end,
                found: data.len(),
            });
        }

        let prg_banks = data[prg_start..prg_end]
            .chunks(PRG_BANK_SIZE)
            .map(<[u8]>::to_vec)
            .collect();
        let chr_banks = data[prg_end..chr_end]
            .chunks(CHR_BANK_SIZE)
            .map(<[u8]>::to_vec)
            .collect();

        let mut store = BankStore::new(prg_banks, chr_banks)
            .with_mapper(mapper_number)
            .with_mirroring(mirroring);
        if has_battery {
            store = store.with_battery_ram(vec![0; BATTERY_RAM_SIZE]);
        }

        info!(
            "Loaded cartridge - Mapper: {}, PRG ROM: {}KB, CHR ROM: {}KB, Mirroring: {:?}, Battery: {}",
            mapper_number,
            prg_rom_size / 1024,
            chr_rom_size / 1024,
            mirroring,
            has_battery
        );

        Ok(store)
    }

    /// Number of 16KB PRG banks
    #[inline]
    pub fn rom_count(&self) -> usize {
        self.rom.len()
    }

    /// Number of 4KB CHR banks
    #[inline]
    pub fn vrom_count(&self) -> usize {
        self.vrom.len()
    }

    /// PRG bank data. `bank` must already be reduced modulo `rom_count`.
    #[inline]
    pub fn rom(&self, bank: usize) -> &[u8] {
        &self.rom[bank]
    }

    /// CHR bank data. `bank` must already be reduced modulo `vrom_count`.
    #[inline]
    pub fn vrom(&self, bank: usize) -> &[u8] {
        &self.vrom[bank]
    }

    #[inline]
    pub fn vrom_tiles(&self, bank: usize) -> &[Tile] {
        &self.vrom_tiles[bank]
    }

    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.battery_ram.as_deref()
    }

    pub fn has_battery(&self) -> bool {
        self.battery_ram.is_some()
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn mapper_number(&self) -> u8 {
        self.mapper_number
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl fmt::Debug for BankStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankStore")
            .field("mapper", &self.mapper_number)
            .field("mirroring", &self.mirroring)
            .field("rom_count", &self.rom.len())
            .field("vrom_count", &self.vrom.len())
            .field("has_battery", &self.battery_ram.is_some())
            .field("valid", &self.valid)
            .finish()
    }
}

fn fixed_bank(mut bank: Vec<u8>, size: usize) -> Box<[u8]> {
    bank.resize(size, 0);
    bank.into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ines_image(prg_banks: u8, chr_units: u8, flags6: u8, flags7: u8) -> Vec<u8> {
        let mut data = vec![0x4E, 0x45, 0x53, 0x1A, prg_banks, chr_units, flags6, flags7];
        data.resize(INES_HEADER_SIZE, 0);
        for bank in 0..prg_banks {
            data.extend(std::iter::repeat(0x10 + bank).take(PRG_BANK_SIZE));
        }
        for unit in 0..chr_units as usize * 2 {
            data.extend(std::iter::repeat(0x80 + unit as u8).take(CHR_BANK_SIZE));
        }
        data
    }

    #[test]
    fn parses_nrom_image() {
        let store = BankStore::from_ines(&ines_image(1, 1, 0x01, 0)).unwrap();
        assert!(store.is_valid());
        assert_eq!(store.rom_count(), 1);
        assert_eq!(store.vrom_count(), 2);
        assert_eq!(store.mirroring(), Mirroring::Vertical);
        assert_eq!(store.mapper_number(), 0);
        assert!(store.rom(0).iter().all(|&b| b == 0x10));
        assert!(store.vrom(1).iter().all(|&b| b == 0x81));
        assert_eq!(store.vrom_tiles(0).len(), TILES_PER_CHR_BANK);
        assert!(!store.has_battery());
    }

    #[test]
    fn mapper_number_combines_both_nibbles() {
        let store = BankStore::from_ines(&ines_image(2, 0, 0x40 | 0x02, 0x00)).unwrap();
        assert_eq!(store.mapper_number(), 4);
        assert_eq!(store.battery_ram().map(<[u8]>::len), Some(BATTERY_RAM_SIZE));
        assert_eq!(store.vrom_count(), 0);
    }

    #[test]
    fn trainer_is_skipped() {
        let mut data = ines_image(1, 0, 0x04, 0);
        let trainer = vec![0xEE; TRAINER_SIZE];
        data.splice(INES_HEADER_SIZE..INES_HEADER_SIZE, trainer);
        let store = BankStore::from_ines(&data).unwrap();
        assert!(store.rom(0).iter().all(|&b| b == 0x10));
    }

    #[test]
    fn four_screen_flag_wins() {
        let store = BankStore::from_ines(&ines_image(1, 1, 0x09, 0)).unwrap();
        assert_eq!(store.mirroring(), Mirroring::FourScreen);
    }

    #[test]
    fn rejects_bad_images() {
        assert_eq!(
            BankStore::from_ines(b"NOPE").unwrap_err(),
            CartridgeError::InvalidHeader
        );
        assert_eq!(
            BankStore::from_ines(&ines_image(1, 1, 0x30, 0)).unwrap_err(),
            CartridgeError::UnsupportedMapper(3)
        );
        assert_eq!(
            BankStore::from_ines(&ines_image(0, 1, 0, 0)).unwrap_err(),
            CartridgeError::NoPrgRom
        );

        let mut truncated = ines_image(2, 0, 0, 0);
        truncated.truncate(INES_HEADER_SIZE + PRG_BANK_SIZE);
        assert!(matches!(
            BankStore::from_ines(&truncated),
            Err(CartridgeError::InvalidRomSize { .. })
        ));
    }

    #[test]
    fn new_pads_short_banks() {
        let store = BankStore::new(vec![vec![1, 2, 3]], vec![vec![4; 10]]);
        assert_eq!(store.rom(0).len(), PRG_BANK_SIZE);
        assert_eq!(store.vrom(0).len(), CHR_BANK_SIZE);
        assert_eq!(&store.rom(0)[..4], &[1, 2, 3, 0]);
        assert!(!BankStore::invalid().is_valid());
    }
}
