//! Headless collaborators
//!
//! A picture unit that keeps pattern memory, the tile cache, sprite memory
//! and the frame counters but never draws, and an audio unit that only
//! records register traffic. Used by the command-line tool and the tests.

use log::trace;

use crate::apu::AudioUnit;
use crate::cartridge::Mirroring;
use crate::ppu::{
    status, PictureUnit, PpuClock, NMI_DELAY, PATTERN_TILE_COUNT, SCREEN_HEIGHT, SCREEN_WIDTH,
};
use crate::tile::Tile;

/// Last scanline of a frame
const LAST_SCANLINE: i32 = 261;

/// PPU address space ($0000-$3FFF)
const VRAM_SIZE: usize = 0x4000;

pub struct HeadlessPpu {
    clock: PpuClock,
    vram: Vec<u8>,
    tiles: Vec<Tile>,
    sprite_mem: [u8; 256],
    sram_address: u8,
    vram_address: u16,
    first_write: bool,
    read_buffer: u8,
    control1: u8,
    control2: u8,
    status: u8,
    scroll: [u8; 2],
    mirroring: Option<Mirroring>,
    frame_buffer: Vec<u32>,
    rendering_flushes: usize,
    frames: u64,
}

impl HeadlessPpu {
    pub fn new() -> Self {
        HeadlessPpu {
            clock: PpuClock::default(),
            vram: vec![0; VRAM_SIZE],
            tiles: vec![Tile::default(); PATTERN_TILE_COUNT],
            sprite_mem: [0; 256],
            sram_address: 0,
            vram_address: 0,
            first_write: true,
            read_buffer: 0,
            control1: 0,
            control2: 0,
            status: 0,
            scroll: [0; 2],
            mirroring: None,
            frame_buffer: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            rendering_flushes: 0,
            frames: 0,
        }
    }

    pub fn pattern_tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn sprite_memory(&self) -> &[u8; 256] {
        &self.sprite_mem
    }

    pub fn control_registers(&self) -> (u8, u8) {
        (self.control1, self.control2)
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn scroll(&self) -> [u8; 2] {
        self.scroll
    }

    pub fn clock(&self) -> &PpuClock {
        &self.clock
    }

    pub fn frame_buffer_mut(&mut self) -> &mut [u32] {
        &mut self.frame_buffer
    }

    /// Times `trigger_rendering` was called
    pub fn rendering_flushes(&self) -> usize {
        self.rendering_flushes
    }

    /// Vertical blanks started so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn increment_vram_address(&mut self) {
        let step = if self.control1 & 0x04 != 0 { 32 } else { 1 };
        self.vram_address = self.vram_address.wrapping_add(step) & 0x3FFF;
    }
}

impl Default for HeadlessPpu {
    fn default() -> Self {
        Self::new()
    }
}

impl PictureUnit for HeadlessPpu {
    fn update_control_reg1(&mut self, value: u8) {
        self.control1 = value;
    }

    fn update_control_reg2(&mut self, value: u8) {
        self.control2 = value;
        self.clock.sprites_visible = value & 0x10 != 0;
    }

    fn read_status_register(&mut self) -> u8 {
        let value = self.status;
        self.status &= !status::VBLANK;
        self.first_write = true;
        value
    }

    fn write_sram_address(&mut self, value: u8) {
        self.sram_address = value;
    }

    fn sram_load(&mut self) -> u8 {
        self.sprite_mem[self.sram_address as usize]
    }

    fn sram_write(&mut self, value: u8) {
        self.sprite_mem[self.sram_address as usize] = value;
        self.sram_address = self.sram_address.wrapping_add(1);
    }

    fn scroll_write(&mut self, value: u8) {
        let index = if self.first_write { 0 } else { 1 };
        self.scroll[index] = value;
        self.first_write = !self.first_write;
    }

    fn write_vram_address(&mut self, value: u8) {
        if self.first_write {
            self.vram_address = ((value as u16) << 8 | (self.vram_address & 0x00FF)) & 0x3FFF;
        } else {
            self.vram_address = (self.vram_address & 0xFF00) | value as u16;
        }
        self.first_write = !self.first_write;
    }

    fn vram_load(&mut self) -> u8 {
        let value = self.read_buffer;
        self.read_buffer = self.vram[self.vram_address as usize];
        self.increment_vram_address();
        value
    }

    fn vram_write(&mut self, value: u8) {
        let address = self.vram_address as usize;
        self.vram[address] = value;
        if address < 0x2000 {
            let tile = address >> 4;
            let base = tile << 4;
            self.tiles[tile] = Tile::from_pattern(&self.vram[base..base + 16]);
        }
        self.increment_vram_address();
    }

    fn sprite_dma(&mut self, page: &[u8]) {
        for (i, &value) in page.iter().take(256).enumerate() {
            self.sprite_mem[(self.sram_address as usize + i) & 0xFF] = value;
        }
    }

    fn set_mirroring(&mut self, mirroring: Mirroring) {
        self.mirroring = Some(mirroring);
    }

    fn mirroring(&self) -> Option<Mirroring> {
        self.mirroring
    }

    fn trigger_rendering(&mut self) {
        self.rendering_flushes += 1;
    }

    fn pattern_memory(&self) -> &[u8] {
        &self.vram[..0x2000]
    }

    fn pattern_memory_mut(&mut self) -> &mut [u8] {
        &mut self.vram[..0x2000]
    }

    fn pattern_tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    fn frame_buffer(&self) -> &[u32] {
        &self.frame_buffer
    }

    fn clock_mut(&mut self) -> &mut PpuClock {
        &mut self.clock
    }

    fn start_frame(&mut self) {
        self.status &= !(status::SPRITE0_HIT | status::SPRITE_OVERFLOW);
    }

    fn end_scanline(&mut self) {
        if self.clock.scanline == LAST_SCANLINE {
            self.clock.request_end_frame = true;
            self.clock.nmi_counter = NMI_DELAY;
            self.clock.scanline = -1;
        }
        self.clock.scanline += 1;
    }

    fn set_sprite_zero_hit(&mut self) {
        self.status |= status::SPRITE0_HIT;
    }

    fn start_vblank(&mut self) {
        self.status |= status::VBLANK;
        self.frames += 1;
        trace!("Vertical blank, frame {}", self.frames);
    }

    fn reset(&mut self) {
        *self = HeadlessPpu::new();
    }
}

/// Audio unit that records register writes and frame-sequencer clocks
#[derive(Debug, Clone, Default)]
pub struct SilentApu {
    registers: [u8; 0x18],
    clocked_cycles: u64,
}

impl SilentApu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value written to an APU register ($4000-$4017)
    pub fn register(&self, address: u16) -> u8 {
        self.registers
            .get(address.wrapping_sub(0x4000) as usize)
            .copied()
            .unwrap_or(0)
    }

    /// CPU cycles fed to the frame sequencer so far
    pub fn clocked_cycles(&self) -> u64 {
        self.clocked_cycles
    }
}

impl AudioUnit for SilentApu {
    fn read_reg(&mut self, address: u16) -> u8 {
        // Channel enable bits read back as status
        if address == 0x4015 {
            self.register(0x4015) & 0x1F
        } else {
            0
        }
    }

    fn write_reg(&mut self, address: u16, value: u8) {
        if let Some(slot) = self.registers.get_mut(address.wrapping_sub(0x4000) as usize) {
            *slot = value;
        }
    }

    fn clock_frame_counter(&mut self, cycles: u32) {
        self.clocked_cycles += cycles as u64;
    }

    fn reset(&mut self) {
        *self = SilentApu::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_scanline_requests_end_of_frame_after_last_line() {
        let mut ppu = HeadlessPpu::new();
        for _ in 0..LAST_SCANLINE {
            ppu.end_scanline();
        }
        assert_eq!(ppu.clock().scanline, LAST_SCANLINE);
        assert!(!ppu.clock().request_end_frame);

        ppu.end_scanline();
        assert_eq!(ppu.clock().scanline, 0);
        assert!(ppu.clock().request_end_frame);
        assert_eq!(ppu.clock().nmi_counter, NMI_DELAY);
    }

    #[test]
    fn vram_writes_refresh_tile_cache() {
        let mut ppu = HeadlessPpu::new();
        ppu.write_vram_address(0x00);
        ppu.write_vram_address(0x10);
        for _ in 0..8 {
            ppu.vram_write(0xFF);
        }
        assert!(ppu.pattern_tiles()[1].opaque.iter().all(|&o| o));
        assert_eq!(ppu.pattern_tiles()[1].pix[0], 1);
    }

    #[test]
    fn status_read_clears_vblank() {
        let mut ppu = HeadlessPpu::new();
        ppu.start_vblank();
        assert_eq!(ppu.read_status_register() & status::VBLANK, status::VBLANK);
        assert_eq!(ppu.read_status_register() & status::VBLANK, 0);
    }
}
