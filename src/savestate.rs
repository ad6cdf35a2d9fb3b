//! Save state implementation
//!
//! A save state holds the 64KB CPU memory image, the PPU pattern tables the
//! mapper filled and the current mirroring, together with an explicit register
//! record for the active mapper and the controller strobe counters. The tile
//! cache is rebuilt from the pattern tables on restore.
//! Each mapper variant has its own record type, so a field added to a board
//! has to be added to its record before it can be saved.
//!
//! Save states are versioned to ensure compatibility across different versions
//! of the emulator. Files are serialized using bincode with Serde.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use bincode::{decode_from_std_read, encode_into_std_write, Decode, Encode};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::apu::AudioUnit;
use crate::cartridge::Mirroring;
use crate::cpu::Cpu;
use crate::mappers::MapperKind;
use crate::memory::{Bus, CpuMemory, MEMORY_SIZE};
use crate::nes::Nes;
use crate::ppu::{PictureUnit, PATTERN_MEMORY_SIZE};

/// Current save state format version
pub const CURRENT_SAVE_STATE_VERSION: u32 = 2;

/// Errors that can occur during save state operations
#[derive(Error, Debug)]
pub enum SaveStateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Deserialization error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Incompatible save state version: found {found}, expected {expected}")]
    IncompatibleVersion { found: u32, expected: u32 },

    #[error("Save state was taken with {found}, cartridge uses {expected}")]
    MapperMismatch { expected: MapperKind, found: MapperKind },

    #[error("Invalid save state data")]
    InvalidData,

    #[error("No cartridge loaded")]
    NoCartridge,
}

/// Read position of both controller ports and the last strobe write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct StrobeSnapshot {
    pub joy1_strobe_state: u8,
    pub joy2_strobe_state: u8,
    pub joypad_last_write: u8,
}

/// MMC1 registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Mmc1State {
    pub shift_register: u8,
    pub shift_count: u8,
    pub mirroring: u8,
    pub prg_switching_area: u8,
    pub prg_switching_size: u8,
    pub chr_switching_size: u8,
    pub chr_select_0: u8,
    pub chr_select_1: u8,
    pub prg_bank: u8,
}

/// UNROM registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct UnromState {
    pub prg_bank: u8,
}

/// MMC3 registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Mmc3State {
    pub command: u8,
    pub prg_address_select: u8,
    pub chr_address_select: u8,
    pub page_number: u8,
    pub irq_counter: i32,
    pub irq_latch_value: u8,
    pub irq_enable: bool,
    pub prg_address_changed: bool,
}

/// Register record of one mapper variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum MapperState {
    Nrom,
    Mmc1(Mmc1State),
    Unrom(UnromState),
    Mmc3(Mmc3State),
}

impl MapperState {
    pub fn kind(&self) -> MapperKind {
        match self {
            MapperState::Nrom => MapperKind::Nrom,
            MapperState::Mmc1(_) => MapperKind::Mmc1,
            MapperState::Unrom(_) => MapperKind::Unrom,
            MapperState::Mmc3(_) => MapperKind::Mmc3,
        }
    }
}

/// Everything the cartridge side of the bus needs to resume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct MapperSnapshot {
    pub strobe: StrobeSnapshot,
    pub state: MapperState,
}

impl MapperSnapshot {
    pub fn new(strobe: StrobeSnapshot, state: MapperState) -> Self {
        MapperSnapshot { strobe, state }
    }
}

/// Save state data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct SaveState {
    /// Save state format version
    version: u32,

    /// CPU memory image
    memory: Vec<u8>,

    /// PPU pattern tables ($0000-$1FFF)
    pattern_memory: Vec<u8>,

    /// Nametable mirroring last set on the PPU
    mirroring: Option<Mirroring>,

    /// Mapper registers and strobe counters
    mapper: MapperSnapshot,
}

/// Create a bincode configuration optimized for size
fn config() -> bincode::config::Configuration {
    bincode::config::standard()
}

impl SaveState {
    /// Capture the bus side of a running system
    pub fn capture<C, P, A>(nes: &Nes<C, P, A>) -> Result<Self, SaveStateError>
    where
        C: Cpu,
        P: PictureUnit,
        A: AudioUnit,
    {
        Self::capture_bus(nes.bus())
    }

    pub fn capture_bus<P: PictureUnit, A: AudioUnit>(bus: &Bus<P, A>) -> Result<Self, SaveStateError> {
        let mapper = bus.snapshot_mapper().ok_or(SaveStateError::NoCartridge)?;

        Ok(SaveState {
            version: CURRENT_SAVE_STATE_VERSION,
            memory: bus.memory.to_vec(),
            pattern_memory: bus.ppu.pattern_memory().to_vec(),
            mirroring: bus.ppu.mirroring(),
            mapper,
        })
    }

    /// Restore into a system running the same kind of cartridge
    pub fn apply_to<C, P, A>(&self, nes: &mut Nes<C, P, A>) -> Result<(), SaveStateError>
    where
        C: Cpu,
        P: PictureUnit,
        A: AudioUnit,
    {
        self.apply_to_bus(nes.bus_mut())
    }

    pub fn apply_to_bus<P: PictureUnit, A: AudioUnit>(
        &self,
        bus: &mut Bus<P, A>,
    ) -> Result<(), SaveStateError> {
        self.check_version()?;
        if self.memory.len() != MEMORY_SIZE {
            warn!("Memory image size mismatch: {} vs {}", self.memory.len(), MEMORY_SIZE);
            return Err(SaveStateError::InvalidData);
        }
        if self.pattern_memory.len() != PATTERN_MEMORY_SIZE {
            warn!(
                "Pattern memory size mismatch: {} vs {}",
                self.pattern_memory.len(),
                PATTERN_MEMORY_SIZE
            );
            return Err(SaveStateError::InvalidData);
        }

        bus.restore_mapper(&self.mapper)?;
        bus.memory = CpuMemory::from_bytes(&self.memory);
        bus.restore_pattern_memory(&self.pattern_memory);
        if let Some(mirroring) = self.mirroring {
            bus.ppu.set_mirroring(mirroring);
        }

        info!("Save state restored successfully");
        Ok(())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn pattern_memory(&self) -> &[u8] {
        &self.pattern_memory
    }

    pub fn mirroring(&self) -> Option<Mirroring> {
        self.mirroring
    }

    pub fn mapper(&self) -> &MapperSnapshot {
        &self.mapper
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveStateError> {
        let mut buffer = Vec::new();
        encode_into_std_write(self, &mut buffer, config())?;
        Ok(buffer)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SaveStateError> {
        let state: SaveState = decode_from_std_read(&mut &*data, config())?;
        state.check_version()?;
        Ok(state)
    }

    /// Save the current state of the system to a file
    pub fn save_to_file<C, P, A, Q>(nes: &Nes<C, P, A>, path: Q) -> Result<(), SaveStateError>
    where
        C: Cpu,
        P: PictureUnit,
        A: AudioUnit,
        Q: AsRef<Path>,
    {
        Self::capture(nes)?.write_file(path)
    }

    /// Load a state from a file and apply it to the system
    pub fn load_from_file<C, P, A, Q>(nes: &mut Nes<C, P, A>, path: Q) -> Result<(), SaveStateError>
    where
        C: Cpu,
        P: PictureUnit,
        A: AudioUnit,
        Q: AsRef<Path>,
    {
        Self::read_file(path)?.apply_to(nes)
    }

    pub fn write_file<Q: AsRef<Path>>(&self, path: Q) -> Result<(), SaveStateError> {
        let data = self.to_bytes()?;

        let mut file = File::create(path.as_ref())?;
        file.write_all(&data)?;

        info!("Save state written to {}", path.as_ref().display());
        Ok(())
    }

    pub fn read_file<Q: AsRef<Path>>(path: Q) -> Result<Self, SaveStateError> {
        let mut data = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut data)?;

        let state = Self::from_bytes(&data)?;
        info!("Save state loaded from {}", path.as_ref().display());
        Ok(state)
    }

    fn check_version(&self) -> Result<(), SaveStateError> {
        if self.version != CURRENT_SAVE_STATE_VERSION {
            warn!(
                "Save state rejected: version {}, expected {}",
                self.version, CURRENT_SAVE_STATE_VERSION
            );
            return Err(SaveStateError::IncompatibleVersion {
                found: self.version,
                expected: CURRENT_SAVE_STATE_VERSION,
            });
        }
        Ok(())
    }
}
