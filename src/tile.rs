//! Decoded pattern-table tiles
//!
//! Each 8x8 tile in CHR memory is stored as two bit planes of 8 bytes. The
//! renderer works on 2-bit palette indices, so CHR banks are decoded once at
//! cartridge load and bank swaps only copy the decoded tiles around.

/// Bytes per tile in pattern memory (two 8-byte bit planes)
pub const TILE_BYTES: usize = 16;

/// A decoded 8x8 tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Palette index (0-3) per pixel, row-major
    pub pix: [u8; 64],

    /// Whether each row is free of transparent pixels
    pub opaque: [bool; 8],
}

impl Default for Tile {
    fn default() -> Self {
        Tile {
            pix: [0; 64],
            opaque: [false; 8],
        }
    }
}

impl Tile {
    /// Decode a tile from its 16-byte pattern-table entry.
    /// Missing bytes are treated as zero.
    pub fn from_pattern(pattern: &[u8]) -> Self {
        let byte = |i: usize| pattern.get(i).copied().unwrap_or(0);
        let mut tile = Tile::default();
        for line in 0..8 {
            tile.set_scanline(line, byte(line), byte(line + 8));
        }
        tile
    }

    /// Set one row from its low and high bit-plane bytes
    pub fn set_scanline(&mut self, line: usize, low: u8, high: u8) {
        let base = line << 3;
        let mut opaque = true;
        for x in 0..8 {
            let shift = 7 - x;
            let value = ((low >> shift) & 1) | (((high >> shift) & 1) << 1);
            self.pix[base + x] = value;
            if value == 0 {
                opaque = false;
            }
        }
        self.opaque[line] = opaque;
    }
}

/// Decode a block of pattern memory into consecutive tiles
pub fn decode_tiles(pattern: &[u8]) -> Vec<Tile> {
    pattern.chunks(TILE_BYTES).map(Tile::from_pattern).collect()
}
