use crate::bios::memmap::MemoryMap;
use crate::vm::memory::real_address;

pub const DEFAULT_EBDA_SEGMENT: u16 = 0x9FC0;

/// Process-wide facts the services answer from: installed RAM, the E820
/// table and where the EBDA lives.
///
/// Filled in once by the platform probe, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    ram_size: u32,
    ebda_segment: u16,
    memory_map: MemoryMap,
}

impl Platform {
    /// Probes the default memory layout for `ram_size` bytes of RAM.
    pub fn probe(ram_size: u32, ebda_segment: u16) -> Self {
        let ebda_base = real_address(ebda_segment, 0) as u64;
        Self {
            ram_size,
            ebda_segment,
            memory_map: MemoryMap::probe(ram_size as u64, ebda_base),
        }
    }

    pub fn with_memory_map(ram_size: u32, ebda_segment: u16, memory_map: MemoryMap) -> Self {
        Self {
            ram_size,
            ebda_segment,
            memory_map,
        }
    }

    pub fn ram_size(&self) -> u32 {
        self.ram_size
    }

    pub fn ebda_segment(&self) -> u16 {
        self.ebda_segment
    }

    pub fn memory_map(&self) -> &MemoryMap {
        &self.memory_map
    }

    /// Conventional memory below the EBDA, in KiB.
    pub fn conventional_kb(&self) -> u16 {
        (real_address(self.ebda_segment, 0) / 1024) as u16
    }
}
