//! Utility functions used by the command-line tool
//!
//! Formatting helpers for inspecting CPU memory windows.

use std::fmt::Write;

/// Combine two 8-bit values into a 16-bit value (little-endian)
#[inline]
pub fn combine_bytes(low: u8, high: u8) -> u16 {
    u16::from_le_bytes([low, high])
}

/// Adler-32 checksum of a memory window
pub fn checksum(data: &[u8]) -> u32 {
    adler2::adler32_slice(data)
}

/// Hexdump of a memory region, 16 bytes per line
pub fn hexdump(data: &[u8], start_addr: u16) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        let addr = start_addr.wrapping_add((i * 16) as u16);
        let _ = write!(out, "{:04X}: ", addr);

        for (j, byte) in chunk.iter().enumerate() {
            let _ = write!(out, "{:02X} ", byte);
            if j == 7 {
                out.push(' ');
            }
        }

        // Padding for incomplete lines
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        if chunk.len() <= 8 {
            out.push(' ');
        }

        out.push_str(" |");
        for &byte in chunk {
            out.push(if (0x20..0x7F).contains(&byte) { byte as char } else { '.' });
        }
        out.push_str("|\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_is_little_endian() {
        assert_eq!(combine_bytes(0x34, 0x12), 0x1234);
    }

    #[test]
    fn checksum_matches_adler32() {
        assert_eq!(checksum(b""), 1);
        assert_eq!(checksum(b"Wikipedia"), 0x11E6_0398);
    }

    #[test]
    fn hexdump_pads_short_lines() {
        let dump = hexdump(b"NES\x1a", 0x8000);
        assert_eq!(
            dump,
            format!("8000: 4E 45 53 1A {}  |NES.|\n", "   ".repeat(12))
        );
    }
}
