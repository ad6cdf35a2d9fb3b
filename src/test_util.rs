//! Shared fixtures for unit tests

use crate::cartridge::BankStore;
use crate::cpu::{Cpu, CpuBus, CpuSignals, Interrupt};
use crate::headless::HeadlessPpu;
use crate::mappers::MapperContext;
use crate::memory::CpuMemory;

const CHUNK: usize = 1024;

/// Banks whose every 1KB chunk is filled with `bank * chunks_per_bank + chunk`
pub fn numbered_banks(count: usize, size: usize) -> Vec<Vec<u8>> {
    let chunks = size / CHUNK;
    (0..count)
        .map(|bank| {
            (0..size)
                .map(|i| (bank * chunks + i / CHUNK) as u8)
                .collect()
        })
        .collect()
}

/// Byte at `offset` of a numbered 16KB PRG bank
pub fn prg_byte(bank: usize, offset: usize) -> u8 {
    (bank * 16 + offset / CHUNK) as u8
}

/// Byte at `offset` of a numbered 4KB CHR bank
pub fn chr_byte(bank: usize, offset: usize) -> u8 {
    (bank * 4 + offset / CHUNK) as u8
}

/// Everything a mapper needs, owned in one place
pub struct Harness {
    pub banks: BankStore,
    pub memory: CpuMemory,
    pub ppu: HeadlessPpu,
    pub signals: CpuSignals,
}

impl Harness {
    pub fn new(banks: BankStore) -> Self {
        Harness {
            banks,
            memory: CpuMemory::new(),
            ppu: HeadlessPpu::new(),
            signals: CpuSignals::new(),
        }
    }

    pub fn ctx(&mut self) -> MapperContext<'_, HeadlessPpu> {
        MapperContext {
            banks: &self.banks,
            memory: &mut self.memory,
            ppu: &mut self.ppu,
            signals: &mut self.signals,
        }
    }
}

/// One step of a scripted CPU program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Take the given number of cycles without touching the bus
    Idle(u32),

    /// Store a byte, taking four cycles
    Store(u16, u8),

    /// Load a byte into the log, taking four cycles
    Load(u16),
}

/// CPU stand-in that plays back a fixed list of bus accesses, then idles
/// two cycles per instruction
#[derive(Debug, Clone, Default)]
pub struct ScriptedCpu {
    program: Vec<Step>,
    pc: usize,
    cycles_to_halt: u32,
    pub interrupts: Vec<Interrupt>,
    pub loads: Vec<u8>,
    pub executed: usize,
}

impl ScriptedCpu {
    pub fn new(program: Vec<Step>) -> Self {
        ScriptedCpu {
            program,
            ..Self::default()
        }
    }
}

impl Cpu for ScriptedCpu {
    fn execute_one(&mut self, bus: &mut dyn CpuBus) -> u32 {
        self.executed += 1;
        let step = self.program.get(self.pc).copied();
        self.pc += 1;

        match step {
            Some(Step::Idle(cycles)) => cycles,
            Some(Step::Store(address, value)) => {
                bus.store(address as u32, value);
                4
            }
            Some(Step::Load(address)) => {
                let value = bus.load(address as u32);
                self.loads.push(value);
                4
            }
            None => 2,
        }
    }

    fn cycles_to_halt(&self) -> u32 {
        self.cycles_to_halt
    }

    fn set_cycles_to_halt(&mut self, cycles: u32) {
        self.cycles_to_halt = cycles;
    }

    fn request_interrupt(&mut self, kind: Interrupt) {
        self.interrupts.push(kind);
    }

    fn reset(&mut self) {
        self.pc = 0;
        self.cycles_to_halt = 0;
        self.interrupts.clear();
        self.loads.clear();
    }
}
