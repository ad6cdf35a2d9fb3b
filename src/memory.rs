//! CPU address decoder for the NES
//!
//! The NES has a 16-bit address space (0x0000 - 0xFFFF). Every CPU access goes
//! through [`Bus`], which routes it to internal RAM, a PPU/APU/controller
//! register hook, or the cartridge window. Cartridge ROM is copied into the
//! memory image by the mapper, so cartridge reads are plain array reads.
//!
//! Memory Map:
//! - 0x0000 - 0x07FF: 2KB internal RAM
//! - 0x0800 - 0x1FFF: Mirrors of internal RAM
//! - 0x2000 - 0x2007: PPU registers
//! - 0x2008 - 0x3FFF: Mirrors of PPU registers
//! - 0x4000 - 0x4017: APU and I/O registers
//! - 0x4018 - 0x7FFF: Expansion area and battery-backed RAM
//! - 0x8000 - 0xFFFF: PRG ROM windows; writes go to the mapper

use std::ops::{Deref, DerefMut};

use log::{trace, warn};

use crate::apu::AudioUnit;
use crate::cartridge::BankStore;
use crate::controller::{InputState, Joypads};
use crate::cpu::{CpuBus, CpuSignals, SPRITE_DMA_HALT_CYCLES};
use crate::mappers::{LoadError, Mapper, MapperContext, MapperKind};
use crate::mappers::banks::BATTERY_RAM_START;
use crate::ppu::PictureUnit;
use crate::savestate::{MapperSnapshot, SaveStateError};
use crate::tile::decode_tiles;

/// Size of the CPU address space
pub const MEMORY_SIZE: usize = 0x10000;

/// Size of the internal RAM (2KB)
pub const RAM_SIZE: usize = 0x0800;

/// Internal RAM is mirrored every 2KB up to 0x2000
pub const RAM_MASK: u16 = (RAM_SIZE - 1) as u16;

/// Last address of the register window
const REGISTER_WINDOW_END: u16 = 0x4017;

/// First address decoded by the mapper
const PRG_WINDOW_START: u16 = 0x8000;

/// The 64KB CPU memory image
#[derive(Clone, PartialEq, Eq)]
pub struct CpuMemory(Vec<u8>);

impl CpuMemory {
    pub fn new() -> Self {
        CpuMemory(vec![0; MEMORY_SIZE])
    }

    /// Build an image from raw bytes, padded or truncated to 64KB
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = bytes.to_vec();
        data.resize(MEMORY_SIZE, 0);
        CpuMemory(data)
    }

    pub fn clear(&mut self) {
        self.0.fill(0);
    }
}

impl Default for CpuMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for CpuMemory {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for CpuMemory {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl std::fmt::Debug for CpuMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CpuMemory({} bytes)", self.0.len())
    }
}

/// Address decoder connecting the CPU to RAM, the PPU, the APU, the
/// controllers and the cartridge
pub struct Bus<P: PictureUnit, A: AudioUnit> {
    /// The flat CPU memory image
    pub memory: CpuMemory,

    pub ppu: P,

    pub apu: A,

    /// Button and pointer state supplied by the host
    pub input: InputState,

    /// Controller strobe state
    pub joypads: Joypads,

    /// Interrupts and stalls raised during the current instruction
    pub signals: CpuSignals,

    mapper: Option<Mapper>,
    cartridge: Option<BankStore>,

    /// Battery RAM was written since the host last looked
    battery_dirty: bool,
}

impl<P: PictureUnit, A: AudioUnit> Bus<P, A> {
    pub fn new(ppu: P, apu: A) -> Self {
        Bus {
            memory: CpuMemory::new(),
            ppu,
            apu,
            input: InputState::new(),
            joypads: Joypads::new(),
            signals: CpuSignals::new(),
            mapper: None,
            cartridge: None,
            battery_dirty: false,
        }
    }

    /// Return RAM, the collaborators and the strobe latch to power-on state.
    /// The installed cartridge and mapper are kept.
    pub fn reset(&mut self) {
        self.memory.clear();
        self.ppu.reset();
        self.apu.reset();
        self.joypads.reset();
        self.signals.clear();
        self.battery_dirty = false;
    }

    /// Lay out a freshly created mapper over `banks` and make it current.
    /// On error nothing is installed and the previous cartridge stays.
    pub fn install(&mut self, mut mapper: Mapper, banks: BankStore) -> Result<(), LoadError> {
        {
            let mut ctx = MapperContext {
                banks: &banks,
                memory: &mut self.memory,
                ppu: &mut self.ppu,
                signals: &mut self.signals,
            };
            mapper.load_rom(&mut ctx)?;
        }
        self.ppu.set_mirroring(banks.mirroring());

        self.mapper = Some(mapper);
        self.cartridge = Some(banks);
        Ok(())
    }

    /// Reset the installed mapper and redo its power-on bank layout
    pub fn reload_cartridge(&mut self) -> Result<(), LoadError> {
        let (Some(mapper), Some(banks)) = (self.mapper.as_mut(), self.cartridge.as_ref()) else {
            return Ok(());
        };

        mapper.reset();
        let mut ctx = MapperContext {
            banks,
            memory: &mut self.memory,
            ppu: &mut self.ppu,
            signals: &mut self.signals,
        };
        mapper.load_rom(&mut ctx)?;
        self.ppu.set_mirroring(banks.mirroring());
        Ok(())
    }

    pub fn mapper(&self) -> Option<&Mapper> {
        self.mapper.as_ref()
    }

    pub fn mapper_kind(&self) -> Option<MapperKind> {
        self.mapper.as_ref().map(Mapper::kind)
    }

    pub fn cartridge(&self) -> Option<&BankStore> {
        self.cartridge.as_ref()
    }

    /// Once per scanline, from the frame scheduler
    pub fn clock_irq_counter(&mut self) {
        if let Some(mapper) = self.mapper.as_mut() {
            mapper.clock_irq_counter(&mut self.signals);
        }
    }

    /// PPU address latch snoop
    pub fn latch_access(&mut self, address: u16) {
        if let Some(mapper) = self.mapper.as_mut() {
            mapper.latch_access(address);
        }
    }

    /// The battery-backed window ($6000-$7FFF) when the cartridge has one
    pub fn battery_ram(&self) -> Option<&[u8]> {
        match &self.cartridge {
            Some(banks) if banks.has_battery() => {
                let start = BATTERY_RAM_START as usize;
                Some(&self.memory[start..PRG_WINDOW_START as usize])
            }
            _ => None,
        }
    }

    /// Report and clear the battery RAM dirty flag
    pub fn take_battery_dirty(&mut self) -> bool {
        std::mem::take(&mut self.battery_dirty)
    }

    pub fn snapshot_mapper(&self) -> Option<MapperSnapshot> {
        self.mapper
            .as_ref()
            .map(|mapper| MapperSnapshot::new(self.joypads.snapshot(), mapper.snapshot()))
    }

    pub fn restore_mapper(&mut self, snapshot: &MapperSnapshot) -> Result<(), SaveStateError> {
        let Some(mapper) = self.mapper.as_mut() else {
            warn!("Save state rejected: no cartridge loaded");
            return Err(SaveStateError::NoCartridge);
        };
        mapper.restore(&snapshot.state)?;
        self.joypads.restore(&snapshot.strobe);
        Ok(())
    }

    /// Put a saved pattern table image back and rebuild the tile cache over it
    pub fn restore_pattern_memory(&mut self, pattern: &[u8]) {
        self.ppu.trigger_rendering();

        let memory = self.ppu.pattern_memory_mut();
        let len = pattern.len().min(memory.len());
        memory[..len].copy_from_slice(&pattern[..len]);

        let tiles = decode_tiles(&pattern[..len]);
        for (slot, tile) in self.ppu.pattern_tiles_mut().iter_mut().zip(tiles) {
            *slot = tile;
        }
    }

    fn register_load(&mut self, address: u16) -> u8 {
        match address >> 12 {
            0x2 | 0x3 => match address & 0x7 {
                // Control registers read back the last value written
                0x0 => self.memory[0x2000],
                0x1 => self.memory[0x2001],
                0x2 => self.ppu.read_status_register(),
                0x4 => self.ppu.sram_load(),
                0x7 => self.ppu.vram_load(),
                _ => {
                    trace!("Read from write-only PPU register ${:04X}", address);
                    0
                }
            },
            _ => match address {
                0x4015 => self.apu.read_reg(address),
                0x4016 => self.joypads.read_joy1(&self.input),
                0x4017 => self
                    .joypads
                    .read_joy2(&self.input, self.ppu.frame_buffer()),
                _ => {
                    trace!("Read from write-only register ${:04X}", address);
                    0
                }
            },
        }
    }

    fn register_store(&mut self, address: u16, value: u8) {
        match address {
            0x2000 => {
                self.memory[0x2000] = value;
                self.ppu.update_control_reg1(value);
            }
            0x2001 => {
                self.memory[0x2001] = value;
                self.ppu.update_control_reg2(value);
            }
            0x2003 => self.ppu.write_sram_address(value),
            0x2004 => self.ppu.sram_write(value),
            0x2005 => self.ppu.scroll_write(value),
            0x2006 => self.ppu.write_vram_address(value),
            0x2007 => self.ppu.vram_write(value),
            0x4014 => {
                let base = (value as usize) << 8;
                self.ppu.sprite_dma(&self.memory[base..base + 0x100]);
                self.signals.halt(SPRITE_DMA_HALT_CYCLES);
            }
            0x4016 => self.joypads.write_strobe(value),
            0x4000..=0x4017 => self.apu.write_reg(address, value),
            _ => trace!("Write to read-only register ${:04X} = ${:02X}", address, value),
        }
    }

    fn cartridge_store(&mut self, address: u16, value: u8) {
        if address < PRG_WINDOW_START {
            self.memory[address as usize] = value;
            if address >= BATTERY_RAM_START
                && self.cartridge.as_ref().is_some_and(BankStore::has_battery)
            {
                self.battery_dirty = true;
            }
            return;
        }

        let (Some(mapper), Some(banks)) = (self.mapper.as_mut(), self.cartridge.as_ref()) else {
            trace!("Write to cartridge space with no cartridge: ${:04X} = ${:02X}", address, value);
            return;
        };
        let mut ctx = MapperContext {
            banks,
            memory: &mut self.memory,
            ppu: &mut self.ppu,
            signals: &mut self.signals,
        };
        mapper.write(&mut ctx, address, value);
    }
}

impl<P: PictureUnit, A: AudioUnit> CpuBus for Bus<P, A> {
    fn load(&mut self, address: u32) -> u8 {
        let address = (address & 0xFFFF) as u16;

        if address > REGISTER_WINDOW_END {
            self.memory[address as usize]
        } else if address >= 0x2000 {
            self.register_load(address)
        } else {
            self.memory[(address & RAM_MASK) as usize]
        }
    }

    fn store(&mut self, address: u32, value: u8) {
        let address = (address & 0xFFFF) as u16;

        if address < 0x2000 {
            self.memory[(address & RAM_MASK) as usize] = value;
        } else if address > REGISTER_WINDOW_END {
            self.cartridge_store(address, value);
        } else if address > 0x2007 && address < 0x4000 {
            self.register_store(0x2000 + (address & 0x7), value);
        } else {
            self.register_store(address, value);
        }
    }
}
