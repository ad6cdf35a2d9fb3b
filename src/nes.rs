//! NES system implementation
//!
//! This module ties the CPU, the address decoder, the cartridge mapper and the
//! PPU/APU collaborators together and runs them in lockstep, one frame per
//! call to [`Nes::frame`].

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{info, trace, warn};

use crate::apu::AudioUnit;
use crate::cartridge::BankStore;
use crate::controller::InputState;
use crate::cpu::Cpu;
use crate::mappers::{LoadError, Mapper, MapperKind};
use crate::memory::Bus;
use crate::options::Options;
use crate::ppu::{PictureUnit, DOTS_PER_SCANLINE, SPRITE_ZERO_SCANLINE_OFFSET};

/// Most halted CPU cycles consumed per scheduler step
const HALT_STEP: u32 = 8;

/// PPU dots per CPU cycle
const DOTS_PER_CPU_CYCLE: u32 = 3;

/// Represents the NES hardware system
pub struct Nes<C: Cpu, P: PictureUnit, A: AudioUnit> {
    pub cpu: C,

    bus: Bus<P, A>,

    pub options: Options,

    /// iNES image of the current cartridge, kept for `reload_rom`
    rom_data: Option<Vec<u8>>,

    /// Frames completed since power-on
    frame_count: u64,

    /// Frames completed since the last frame rate report
    fps_frame_count: u64,

    last_fps_time: Option<Instant>,
}

impl<C: Cpu, P: PictureUnit, A: AudioUnit> Nes<C, P, A> {
    pub fn new(cpu: C, ppu: P, apu: A, options: Options) -> Self {
        Nes {
            cpu,
            bus: Bus::new(ppu, apu),
            options,
            rom_data: None,
            frame_count: 0,
            fps_frame_count: 0,
            last_fps_time: None,
        }
    }

    pub fn bus(&self) -> &Bus<P, A> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus<P, A> {
        &mut self.bus
    }

    pub fn ppu(&self) -> &P {
        &self.bus.ppu
    }

    pub fn apu(&self) -> &A {
        &self.bus.apu
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.bus.input
    }

    pub fn mapper_kind(&self) -> Option<MapperKind> {
        self.bus.mapper_kind()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Load an iNES image. On error the running cartridge is left untouched.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), LoadError> {
        let banks = BankStore::from_ines(data).map_err(|e| {
            warn!("Failed to load ROM: {}", e);
            e
        })?;
        self.load_cartridge(banks)?;
        self.rom_data = Some(data.to_vec());
        Ok(())
    }

    /// Load an NES cartridge from a file
    pub fn load_rom_from_file<Q: AsRef<Path>>(&mut self, path: Q) -> Result<()> {
        let rom_data = std::fs::read(&path)
            .with_context(|| format!("Failed to read ROM file: {}", path.as_ref().display()))?;

        self.load_rom(&rom_data)
            .with_context(|| format!("Failed to load ROM: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Install already-decoded banks. On error the running cartridge is left untouched.
    pub fn load_cartridge(&mut self, banks: BankStore) -> Result<(), LoadError> {
        let mapper = Mapper::for_cartridge(&banks)?;
        let kind = mapper.kind();

        self.reset_components();
        self.bus.install(mapper, banks)?;
        self.bus.signals.deliver(&mut self.cpu);
        self.rom_data = None;

        info!("{} cartridge loaded", kind);
        Ok(())
    }

    /// Parse and load the last iNES image again
    pub fn reload_rom(&mut self) -> Result<(), LoadError> {
        let Some(data) = self.rom_data.clone() else {
            return Ok(());
        };
        self.load_rom(&data)
    }

    /// Power-cycle the system, keeping the inserted cartridge
    pub fn reset(&mut self) -> Result<(), LoadError> {
        self.reset_components();
        self.bus.reload_cartridge()?;
        self.bus.signals.deliver(&mut self.cpu);
        Ok(())
    }

    fn reset_components(&mut self) {
        self.cpu.reset();
        self.bus.reset();
    }

    /// Run until the PPU enters vertical blank
    pub fn frame(&mut self) {
        self.bus.ppu.start_frame();

        'frame: loop {
            let halted = self.cpu.cycles_to_halt();
            let dots = if halted == 0 {
                let cycles = self.cpu.execute_one(&mut self.bus);
                self.bus.signals.deliver(&mut self.cpu);
                if self.options.emulate_sound {
                    self.bus.apu.clock_frame_counter(cycles);
                }
                cycles * DOTS_PER_CPU_CYCLE
            } else {
                let cycles = halted.min(HALT_STEP);
                if self.options.emulate_sound {
                    self.bus.apu.clock_frame_counter(cycles);
                }
                self.cpu.set_cycles_to_halt(halted - cycles);
                cycles * DOTS_PER_CPU_CYCLE
            };

            for _ in 0..dots {
                if self.step_dot() {
                    break 'frame;
                }
            }
            self.bus.signals.deliver(&mut self.cpu);
        }

        self.bus.signals.deliver(&mut self.cpu);
        self.frame_count += 1;
        self.fps_frame_count += 1;
        trace!("Frame {} done", self.frame_count);
    }

    /// Advance the PPU one dot. Returns true once vertical blank starts.
    fn step_dot(&mut self) -> bool {
        let ppu = &mut self.bus.ppu;

        let clock = *ppu.clock_mut();
        if clock.cur_x == clock.spr0_hit_x
            && clock.sprites_visible
            && clock.scanline - SPRITE_ZERO_SCANLINE_OFFSET == clock.spr0_hit_y
        {
            ppu.set_sprite_zero_hit();
        }

        let clock = ppu.clock_mut();
        if clock.request_end_frame {
            clock.nmi_counter -= 1;
            if clock.nmi_counter == 0 {
                clock.request_end_frame = false;
                ppu.start_vblank();
                return true;
            }
        }

        let clock = ppu.clock_mut();
        clock.cur_x += 1;
        if clock.cur_x == DOTS_PER_SCANLINE {
            clock.cur_x = 0;
            ppu.end_scanline();
            self.bus.clock_irq_counter();
        }
        false
    }

    /// Measured frame rate, once every `fps_interval` of wall time
    pub fn take_fps(&mut self, now: Instant) -> Option<f64> {
        let Some(last) = self.last_fps_time else {
            self.last_fps_time = Some(now);
            self.fps_frame_count = 0;
            return None;
        };

        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.options.fps_interval() || elapsed.is_zero() {
            return None;
        }

        let fps = self.fps_frame_count as f64 / elapsed.as_secs_f64();
        self.fps_frame_count = 0;
        self.last_fps_time = Some(now);
        Some(fps)
    }
}
