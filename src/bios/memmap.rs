use byteorder::{ByteOrder, LittleEndian};
use num_derive::FromPrimitive;
use thiserror::Error;

use crate::vm::memory::{BIOS_ROM, HIGH_MEMORY};

/// 'SMAP', expected in EDX and echoed back in EAX.
pub const SMAP_SIGNATURE: u32 = 0x534D_4150;
/// base (u64) + length (u64) + type (u32), packed.
pub const E820_ENTRY_SIZE: u32 = 20;
pub const MAX_E820_ENTRIES: usize = 32;

const CONVENTIONAL_END: u64 = 0xA0000;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum E820Type {
    Ram = 1,
    Reserved = 2,
    Acpi = 3,
    Nvs = 4,
    Unusable = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct E820Entry {
    pub base: u64,
    pub length: u64,
    pub kind: E820Type,
}

impl E820Entry {
    pub const fn new(base: u64, length: u64, kind: E820Type) -> Self {
        Self { base, length, kind }
    }

    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }

    /// Wire layout handed to the caller's buffer.
    pub fn to_bytes(&self) -> [u8; E820_ENTRY_SIZE as usize] {
        let mut buf = [0u8; E820_ENTRY_SIZE as usize];
        LittleEndian::write_u64(&mut buf[0..8], self.base);
        LittleEndian::write_u64(&mut buf[8..16], self.length);
        LittleEndian::write_u32(&mut buf[16..20], self.kind as u32);
        buf
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryMapError {
    #[error("memory map has {0} entries, at most 32 are supported")]
    TooManyEntries(usize),
    #[error("memory map entry at {0:#x} has zero length")]
    ZeroLength(u64),
    #[error("memory map entries at {0:#x} and {1:#x} overlap")]
    Overlap(u64, u64),
}

/// Physical memory layout reported through E820.
///
/// Built once while the platform is probed and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    entries: Vec<E820Entry>,
}

impl MemoryMap {
    pub fn new(mut entries: Vec<E820Entry>) -> Result<Self, MemoryMapError> {
        if entries.len() > MAX_E820_ENTRIES {
            return Err(MemoryMapError::TooManyEntries(entries.len()));
        }
        if let Some(entry) = entries.iter().find(|e| e.length == 0) {
            return Err(MemoryMapError::ZeroLength(entry.base));
        }
        entries.sort_by_key(|e| e.base);
        for pair in entries.windows(2) {
            if pair[0].end() > pair[1].base {
                return Err(MemoryMapError::Overlap(pair[0].base, pair[1].base));
            }
        }
        Ok(Self { entries })
    }

    /// Default layout for `ram_size` bytes of RAM with the EBDA at `ebda_base`.
    pub fn probe(ram_size: u64, ebda_base: u64) -> Self {
        let ebda_base = ebda_base.min(CONVENTIONAL_END);
        let mut entries = Vec::with_capacity(4);
        if ebda_base > 0 {
            entries.push(E820Entry::new(0, ebda_base, E820Type::Ram));
        }
        if ebda_base < CONVENTIONAL_END {
            entries.push(E820Entry::new(ebda_base, CONVENTIONAL_END - ebda_base, E820Type::Reserved));
        }
        entries.push(E820Entry::new(
            BIOS_ROM as u64,
            (HIGH_MEMORY - BIOS_ROM) as u64,
            E820Type::Reserved,
        ));
        if ram_size > HIGH_MEMORY as u64 {
            entries.push(E820Entry::new(
                HIGH_MEMORY as u64,
                ram_size - HIGH_MEMORY as u64,
                E820Type::Ram,
            ));
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[E820Entry] {
        &self.entries
    }

    /// One enumeration step: the entry at `cursor` and the cursor to pass
    /// next time, 0 once the last entry has been returned.
    pub fn next(&self, cursor: u32) -> Option<(E820Entry, u32)> {
        let entry = *self.entries.get(cursor as usize)?;
        let next = if cursor as usize + 1 == self.entries.len() {
            0
        } else {
            cursor + 1
        };
        Some((entry, next))
    }
}
