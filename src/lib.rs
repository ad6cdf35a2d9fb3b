//! rusty_nes_core - NES address decoding, cartridge mappers and frame scheduling
//!
//! The CPU instruction core, the PPU renderer and the APU synthesizer are
//! collaborators behind the [`cpu::Cpu`], [`ppu::PictureUnit`] and
//! [`apu::AudioUnit`] traits. This crate owns everything between them: the
//! 64KB CPU memory image, register dispatch, controller strobing, the four
//! supported mapper boards and the loop that runs one frame.

pub mod apu;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod headless;
pub mod mappers;
pub mod memory;
pub mod nes;
pub mod options;
pub mod ppu;
pub mod savestate;
pub mod tile;
pub mod util;

#[cfg(test)]
mod test_util;
