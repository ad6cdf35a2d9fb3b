//! CPU collaborator interface
//!
//! The 2A03 instruction core lives outside this crate. The frame scheduler only
//! needs to run it one instruction at a time, stall it during sprite DMA and
//! raise interrupts on its behalf. Requests raised while an instruction is
//! running (by the bus or the mapper) are queued in [`CpuSignals`] and handed
//! to the CPU once the instruction returns.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// CPU stall after a $4014 sprite DMA
pub const SPRITE_DMA_HALT_CYCLES: u32 = 513;

/// Interrupt kinds the core can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum Interrupt {
    /// Maskable IRQ (mapper scanline counter, APU)
    Normal,

    /// Non-maskable interrupt (vertical blank)
    Nmi,

    /// Reset vector
    Reset,
}

/// Memory access as seen by the CPU
pub trait CpuBus {
    /// Read a byte. Addresses are masked to 16 bits.
    fn load(&mut self, address: u32) -> u8;

    /// Write a byte. Addresses are masked to 16 bits.
    fn store(&mut self, address: u32, value: u8);
}

/// The instruction core driven by the frame scheduler
pub trait Cpu {
    /// Execute one instruction and return the CPU cycles it took
    fn execute_one(&mut self, bus: &mut dyn CpuBus) -> u32;

    /// Cycles the CPU still has to sit out (DMA stall)
    fn cycles_to_halt(&self) -> u32;

    fn set_cycles_to_halt(&mut self, cycles: u32);

    fn request_interrupt(&mut self, kind: Interrupt);

    /// Return to power-on state
    fn reset(&mut self) {}
}

/// Interrupt requests and stalls raised on the CPU's behalf
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuSignals {
    interrupts: Vec<Interrupt>,
    halt_cycles: u32,
}

impl CpuSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_interrupt(&mut self, kind: Interrupt) {
        self.interrupts.push(kind);
    }

    /// Add stall cycles on top of any already queued
    pub fn halt(&mut self, cycles: u32) {
        self.halt_cycles += cycles;
    }

    pub fn interrupts(&self) -> &[Interrupt] {
        &self.interrupts
    }

    pub fn halt_cycles(&self) -> u32 {
        self.halt_cycles
    }

    pub fn is_empty(&self) -> bool {
        self.interrupts.is_empty() && self.halt_cycles == 0
    }

    pub fn clear(&mut self) {
        self.interrupts.clear();
        self.halt_cycles = 0;
    }

    /// Hand everything queued so far to the CPU, in request order
    pub fn deliver(&mut self, cpu: &mut dyn Cpu) {
        for kind in self.interrupts.drain(..) {
            cpu.request_interrupt(kind);
        }
        if self.halt_cycles > 0 {
            let halted = cpu.cycles_to_halt();
            cpu.set_cycles_to_halt(halted + self.halt_cycles);
            self.halt_cycles = 0;
        }
    }
}
