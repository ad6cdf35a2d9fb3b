//! PPU collaborator interface
//!
//! Rendering lives outside this crate. The core needs three things from the
//! picture unit: register hooks for the CPU bus, write access to pattern
//! memory and its tile cache for bank swaps, and the dot/scanline counters the
//! frame scheduler steps.

use crate::cartridge::Mirroring;
use crate::tile::Tile;

/// PPU screen width in pixels
pub const SCREEN_WIDTH: usize = 256;

/// PPU screen height in pixels
pub const SCREEN_HEIGHT: usize = 240;

/// Dots per scanline
pub const DOTS_PER_SCANLINE: i32 = 341;

/// The sprite-zero hit line is stored relative to the first visible scanline,
/// which the scheduler's scanline counter places 21 lines into the frame.
pub const SPRITE_ZERO_SCANLINE_OFFSET: i32 = 21;

/// Dots between the end-of-frame request and the start of vertical blank
pub const NMI_DELAY: i32 = 9;

/// Pattern memory ($0000-$1FFF)
pub const PATTERN_MEMORY_SIZE: usize = 0x2000;

/// Tiles covering pattern memory
pub const PATTERN_TILE_COUNT: usize = PATTERN_MEMORY_SIZE / 16;

/// Status register bits
pub mod status {
    pub const SPRITE_OVERFLOW: u8 = 0x20;
    pub const SPRITE0_HIT: u8 = 0x40;
    pub const VBLANK: u8 = 0x80;
}

/// Timing state the frame scheduler reads and advances every dot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpuClock {
    /// Current dot within the scanline (0-340)
    pub cur_x: i32,

    /// Current scanline, counted from the start of the frame
    pub scanline: i32,

    /// Dot at which sprite 0 overlaps the background
    pub spr0_hit_x: i32,

    /// Visible line at which sprite 0 overlaps the background
    pub spr0_hit_y: i32,

    /// Sprite rendering enabled ($2001 bit 4)
    pub sprites_visible: bool,

    /// Set by the PPU once the last scanline is done
    pub request_end_frame: bool,

    /// Dots left until vertical blank starts
    pub nmi_counter: i32,
}

impl Default for PpuClock {
    fn default() -> Self {
        PpuClock {
            cur_x: 0,
            scanline: 0,
            // Off-screen until the renderer finds a hit
            spr0_hit_x: -4,
            spr0_hit_y: -4,
            sprites_visible: false,
            request_end_frame: false,
            nmi_counter: 0,
        }
    }
}

/// Picture unit hooks used by the bus, the mappers and the frame scheduler
pub trait PictureUnit {
    /// $2000 write
    fn update_control_reg1(&mut self, value: u8);

    /// $2001 write
    fn update_control_reg2(&mut self, value: u8);

    /// $2002 read
    fn read_status_register(&mut self) -> u8;

    /// $2003 write
    fn write_sram_address(&mut self, value: u8);

    /// $2004 read
    fn sram_load(&mut self) -> u8;

    /// $2004 write
    fn sram_write(&mut self, value: u8);

    /// $2005 write
    fn scroll_write(&mut self, value: u8);

    /// $2006 write
    fn write_vram_address(&mut self, value: u8);

    /// $2007 read
    fn vram_load(&mut self) -> u8;

    /// $2007 write
    fn vram_write(&mut self, value: u8);

    /// $4014: copy one 256-byte page of CPU memory into sprite memory
    fn sprite_dma(&mut self, page: &[u8]);

    fn set_mirroring(&mut self, mirroring: Mirroring);

    /// Mirroring last set by the cartridge, if any
    fn mirroring(&self) -> Option<Mirroring>;

    /// Flush in-flight rendering before pattern memory changes
    fn trigger_rendering(&mut self);

    /// Pattern memory, `PATTERN_MEMORY_SIZE` bytes
    fn pattern_memory(&self) -> &[u8];

    fn pattern_memory_mut(&mut self) -> &mut [u8];

    /// Tile cache over pattern memory, `PATTERN_TILE_COUNT` entries
    fn pattern_tiles_mut(&mut self) -> &mut [Tile];

    /// Rendered frame, 0xRRGGBB per pixel, `SCREEN_WIDTH` pixels per row
    fn frame_buffer(&self) -> &[u32];

    fn clock_mut(&mut self) -> &mut PpuClock;

    fn start_frame(&mut self);

    /// Finish the current scanline and move to the next
    fn end_scanline(&mut self);

    fn set_sprite_zero_hit(&mut self);

    fn start_vblank(&mut self);

    fn reset(&mut self) {}
}
