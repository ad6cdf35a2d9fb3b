//! Bank loading primitives shared by every mapper
//!
//! Each primitive copies one fixed-size block out of the bank store into the
//! CPU memory image or the PPU's pattern memory. Bank indices wrap modulo the
//! bank count, and a cartridge with no banks of the relevant kind turns every
//! call into a no-op.

use crate::cartridge::{BankStore, BATTERY_RAM_SIZE, CHR_BANK_SIZE, PRG_BANK_SIZE};
use crate::memory::CpuMemory;
use crate::ppu::PictureUnit;

const PRG_8K: usize = 8 * 1024;
const CHR_1K: usize = 1024;
const CHR_2K: usize = 2 * 1024;

/// Start of battery-backed RAM in CPU space
pub const BATTERY_RAM_START: u16 = 0x6000;

/// Copy `src` into `dest` at `offset`, dropping whatever would run past the end
fn copy_block<T: Copy>(src: &[T], dest: &mut [T], offset: usize) {
    if offset >= dest.len() {
        return;
    }
    let len = src.len().min(dest.len() - offset);
    dest[offset..offset + len].copy_from_slice(&src[..len]);
}

/// Copy one 16KB PRG bank to `address`
pub fn load_rom_bank(banks: &BankStore, memory: &mut CpuMemory, bank: usize, address: u16) {
    let count = banks.rom_count();
    if count == 0 {
        return;
    }
    copy_block(banks.rom(bank % count), memory, address as usize);
}

/// Copy one 8KB half of a PRG bank to `address`
pub fn load_8k_rom_bank(banks: &BankStore, memory: &mut CpuMemory, bank8k: usize, address: u16) {
    let count = banks.rom_count();
    if count == 0 {
        return;
    }
    let bank16k = (bank8k / 2) % count;
    let offset = (bank8k % 2) * PRG_8K;
    copy_block(
        &banks.rom(bank16k)[offset..offset + PRG_8K],
        memory,
        address as usize,
    );
}

/// Copy two consecutive PRG banks (32KB) starting at `address`
pub fn load_32k_rom_bank(banks: &BankStore, memory: &mut CpuMemory, bank: usize, address: u16) {
    let count = banks.rom_count();
    if count == 0 {
        return;
    }
    load_rom_bank(banks, memory, (bank * 2) % count, address);
    load_rom_bank(
        banks,
        memory,
        (bank * 2 + 1) % count,
        address.wrapping_add(PRG_BANK_SIZE as u16),
    );
}

/// Copy one 4KB CHR bank and its tiles to pattern address `address`
pub fn load_vrom_bank<P: PictureUnit>(banks: &BankStore, ppu: &mut P, bank: usize, address: u16) {
    let count = banks.vrom_count();
    if count == 0 {
        return;
    }
    ppu.trigger_rendering();

    let bank = bank % count;
    copy_block(banks.vrom(bank), ppu.pattern_memory_mut(), address as usize);
    copy_block(
        banks.vrom_tiles(bank),
        ppu.pattern_tiles_mut(),
        (address >> 4) as usize,
    );
}

/// Copy two consecutive CHR banks (8KB) starting at `address`
pub fn load_8k_vrom_bank<P: PictureUnit>(
    banks: &BankStore,
    ppu: &mut P,
    bank4k_start: usize,
    address: u16,
) {
    let count = banks.vrom_count();
    if count == 0 {
        return;
    }
    ppu.trigger_rendering();

    load_vrom_bank(banks, ppu, bank4k_start % count, address);
    load_vrom_bank(
        banks,
        ppu,
        (bank4k_start + 1) % count,
        address.wrapping_add(CHR_BANK_SIZE as u16),
    );
}

/// Copy one 1KB quarter of a CHR bank to `address`
pub fn load_1k_vrom_bank<P: PictureUnit>(banks: &BankStore, ppu: &mut P, bank1k: usize, address: u16) {
    load_sub_vrom_bank(banks, ppu, bank1k, CHR_1K, address);
}

/// Copy one 2KB half of a CHR bank to `address`
pub fn load_2k_vrom_bank<P: PictureUnit>(banks: &BankStore, ppu: &mut P, bank2k: usize, address: u16) {
    load_sub_vrom_bank(banks, ppu, bank2k, CHR_2K, address);
}

fn load_sub_vrom_bank<P: PictureUnit>(
    banks: &BankStore,
    ppu: &mut P,
    sub_bank: usize,
    size: usize,
    address: u16,
) {
    let count = banks.vrom_count();
    if count == 0 {
        return;
    }
    ppu.trigger_rendering();

    let per_bank = CHR_BANK_SIZE / size;
    let bank4k = (sub_bank / per_bank) % count;
    let offset = (sub_bank % per_bank) * size;
    copy_block(
        &banks.vrom(bank4k)[offset..offset + size],
        ppu.pattern_memory_mut(),
        address as usize,
    );

    let tile_offset = offset >> 4;
    copy_block(
        &banks.vrom_tiles(bank4k)[tile_offset..tile_offset + (size >> 4)],
        ppu.pattern_tiles_mut(),
        (address >> 4) as usize,
    );
}

/// Default PRG layout: the first two banks, or the only bank mirrored into both windows
pub fn load_prg_rom(banks: &BankStore, memory: &mut CpuMemory) {
    if banks.rom_count() > 1 {
        load_rom_bank(banks, memory, 0, 0x8000);
        load_rom_bank(banks, memory, 1, 0xC000);
    } else {
        load_rom_bank(banks, memory, 0, 0x8000);
        load_rom_bank(banks, memory, 0, 0xC000);
    }
}

/// Default CHR layout: the first two banks, or the only bank mirrored into both windows
pub fn load_chr_rom<P: PictureUnit>(banks: &BankStore, ppu: &mut P) {
    match banks.vrom_count() {
        0 => {}
        1 => {
            load_vrom_bank(banks, ppu, 0, 0x0000);
            load_vrom_bank(banks, ppu, 0, 0x1000);
        }
        _ => {
            load_vrom_bank(banks, ppu, 0, 0x0000);
            load_vrom_bank(banks, ppu, 1, 0x1000);
        }
    }
}

/// Copy battery RAM into $6000-$7FFF when the cartridge has a full 8KB of it
pub fn load_battery_ram(banks: &BankStore, memory: &mut CpuMemory) {
    if let Some(ram) = banks.battery_ram() {
        if ram.len() == BATTERY_RAM_SIZE {
            copy_block(ram, memory, BATTERY_RAM_START as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessPpu;
    use crate::test_util::{chr_byte, numbered_banks, prg_byte};

    fn store(prg: usize, chr: usize) -> BankStore {
        BankStore::new(
            numbered_banks(prg, PRG_BANK_SIZE),
            numbered_banks(chr, CHR_BANK_SIZE),
        )
    }

    #[test]
    fn rom_bank_index_wraps() {
        let banks = store(3, 0);
        let mut wrapped = CpuMemory::new();
        let mut direct = CpuMemory::new();

        load_rom_bank(&banks, &mut wrapped, 3, 0x8000);
        load_rom_bank(&banks, &mut direct, 0, 0x8000);
        assert_eq!(wrapped[0x8000..0xC000], direct[0x8000..0xC000]);

        load_rom_bank(&banks, &mut wrapped, 5, 0xC000);
        assert_eq!(wrapped[0xC000], prg_byte(2, 0));
    }

    #[test]
    fn repeated_loads_are_idempotent() {
        let banks = store(4, 0);
        let mut memory = CpuMemory::new();
        load_rom_bank(&banks, &mut memory, 2, 0x8000);
        let first = memory.to_vec();
        load_rom_bank(&banks, &mut memory, 2, 0x8000);
        assert_eq!(memory.to_vec(), first);
    }

    #[test]
    fn eight_k_loads_pick_the_right_half() {
        let banks = store(2, 0);
        let mut memory = CpuMemory::new();

        load_8k_rom_bank(&banks, &mut memory, 3, 0xA000);
        assert_eq!(memory[0xA000], prg_byte(1, 0x2000));
        assert_eq!(memory[0xBFFF], prg_byte(1, 0x3FFF));

        // 8KB bank 4 wraps to 16KB bank 0
        load_8k_rom_bank(&banks, &mut memory, 4, 0x8000);
        assert_eq!(memory[0x8000], prg_byte(0, 0));
    }

    #[test]
    fn thirty_two_k_loads_consecutive_banks() {
        let banks = store(4, 0);
        let mut memory = CpuMemory::new();
        load_32k_rom_bank(&banks, &mut memory, 1, 0x8000);
        assert_eq!(memory[0x8000], prg_byte(2, 0));
        assert_eq!(memory[0xC000], prg_byte(3, 0));
        assert_eq!(memory[0xFFFF], prg_byte(3, 0x3FFF));
    }

    #[test]
    fn empty_store_is_a_no_op() {
        let banks = store(0, 0);
        let mut memory = CpuMemory::new();
        let mut ppu = HeadlessPpu::new();

        load_rom_bank(&banks, &mut memory, 1, 0x8000);
        load_8k_rom_bank(&banks, &mut memory, 1, 0x8000);
        load_32k_rom_bank(&banks, &mut memory, 1, 0x8000);
        load_vrom_bank(&banks, &mut ppu, 1, 0x0000);
        load_1k_vrom_bank(&banks, &mut ppu, 1, 0x0000);
        load_2k_vrom_bank(&banks, &mut ppu, 1, 0x0000);

        assert!(memory.iter().all(|&b| b == 0));
        assert!(ppu.pattern_memory().iter().all(|&b| b == 0));
        assert_eq!(ppu.rendering_flushes(), 0);
    }

    #[test]
    fn vrom_bank_copies_bytes_and_tiles() {
        let banks = store(1, 3);
        let mut ppu = HeadlessPpu::new();

        load_vrom_bank(&banks, &mut ppu, 4, 0x1000);
        assert_eq!(&ppu.pattern_memory()[0x1000..0x2000], banks.vrom(1));
        assert_eq!(&ppu.pattern_tiles()[256..512], banks.vrom_tiles(1));
        assert_eq!(ppu.rendering_flushes(), 1);
    }

    #[test]
    fn one_k_vrom_bank_uses_quarter_of_4k_bank() {
        let banks = store(1, 2);
        let mut ppu = HeadlessPpu::new();

        // 1KB bank 6 = 4KB bank 1, quarter 2
        load_1k_vrom_bank(&banks, &mut ppu, 6, 0x0400);
        assert_eq!(ppu.pattern_memory()[0x0400], chr_byte(1, 0x0800));
        assert_eq!(ppu.pattern_memory()[0x07FF], chr_byte(1, 0x0BFF));
        assert_eq!(ppu.pattern_memory()[0x0000], 0);
        assert_eq!(&ppu.pattern_tiles()[64..128], &banks.vrom_tiles(1)[128..192]);
    }

    #[test]
    fn two_k_vrom_bank_uses_half_of_4k_bank() {
        let banks = store(1, 2);
        let mut ppu = HeadlessPpu::new();

        load_2k_vrom_bank(&banks, &mut ppu, 3, 0x1800);
        assert_eq!(ppu.pattern_memory()[0x1800], chr_byte(1, 0x0800));
        assert_eq!(&ppu.pattern_tiles()[384..512], &banks.vrom_tiles(1)[128..256]);
    }

    #[test]
    fn battery_ram_needs_full_size() {
        let mut memory = CpuMemory::new();
        let short = store(1, 0).with_battery_ram(vec![0xAA; 16]);
        load_battery_ram(&short, &mut memory);
        assert_eq!(memory[0x6000], 0);

        let full = store(1, 0).with_battery_ram(vec![0xAA; BATTERY_RAM_SIZE]);
        load_battery_ram(&full, &mut memory);
        assert_eq!(memory[0x6000], 0xAA);
        assert_eq!(memory[0x7FFF], 0xAA);
    }
}
