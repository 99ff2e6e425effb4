use log::trace;

use crate::vm::descriptor::{Descriptor, DESCRIPTOR_SIZE};
use crate::vm::memory::Memory;

#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum CpuFlag {
    Carry = 0,
    Interrupt = 9,
}

#[derive(Copy, Clone, Debug)]
#[repr(u8)]
pub enum SegmentType {
    ES = 0b_00,
    CS = 0b_01,
    DS = 0b_11,
}

/// Protection enable bit of CR0.
pub const CR0_PE: u32 = 1 << 0;

/// Bit 1 of FLAGS always reads as set.
pub const FLAGS_FIXED: u16 = 0x0002;

/// GDTR / IDTR contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableRegister {
    pub base: u32,
    pub limit: u16,
}

/// Real-mode interrupt vector table: 256 far pointers at address 0.
pub const REAL_MODE_IDT: TableRegister = TableRegister { base: 0, limit: 0x03FF };

/// Empty table used while the block move runs in protected mode.
pub const TRANSITION_IDT: TableRegister = TableRegister { base: 0, limit: 0 };

/// Selector plus the hidden base/limit the CPU cached when it was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentCache {
    pub selector: u16,
    pub base: u32,
    pub limit: u32,
}

impl SegmentCache {
    pub const fn real(selector: u16) -> Self {
        Self {
            selector,
            base: (selector as u32) << 4,
            limit: 0xFFFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub cr0: u32,
    pub gdtr: TableRegister,
    pub idtr: TableRegister,
    pub cs: SegmentCache,
    pub ds: SegmentCache,
    pub es: SegmentCache,
    pub flags: u16,
}

impl Cpu {
    /// CPU state as seen by firmware code running in the ROM segment.
    pub fn new() -> Self {
        Self {
            cr0: 0,
            gdtr: TableRegister::default(),
            idtr: REAL_MODE_IDT,
            cs: SegmentCache::real(0xF000),
            ds: SegmentCache::real(0x0000),
            es: SegmentCache::real(0x0000),
            flags: FLAGS_FIXED,
        }
    }

    #[inline]
    pub fn is_protected(&self) -> bool {
        self.cr0 & CR0_PE != 0
    }

    #[inline]
    pub fn get_segment(&mut self, segment: SegmentType) -> &mut SegmentCache {
        match segment {
            SegmentType::ES => &mut self.es,
            SegmentType::CS => &mut self.cs,
            SegmentType::DS => &mut self.ds,
        }
    }

    /// Loads a segment register the way a `mov sreg` / far jump does.
    ///
    /// In protected mode the descriptor is fetched from the GDT without any
    /// limit or access-rights checks.
    pub fn load_segment(&mut self, segment: SegmentType, selector: u16, memory: &Memory) {
        let cache = if self.is_protected() {
            let index = selector as u32 >> 3;
            let address = self.gdtr.base.wrapping_add(index * DESCRIPTOR_SIZE);
            let descriptor = Descriptor::decode(memory.read_qword(address));
            SegmentCache {
                selector,
                base: descriptor.base,
                limit: descriptor.limit,
            }
        } else {
            SegmentCache::real(selector)
        };
        trace!("load {:?} <- {:04x} base={:08x} limit={:08x}", segment, selector, cache.base, cache.limit);
        *self.get_segment(segment) = cache;
    }

    #[inline(always)]
    pub fn set_flag(&mut self, flag: CpuFlag) {
        self.flags |= 1u16 << (flag as u8);
    }

    #[inline(always)]
    pub fn unset_flag(&mut self, flag: CpuFlag) {
        self.flags &= !(1u16 << (flag as u8));
    }

    #[inline(always)]
    pub fn update_flag(&mut self, flag: CpuFlag, active: bool) {
        if active {
            self.set_flag(flag);
        } else {
            self.unset_flag(flag);
        }
    }

    #[inline(always)]
    pub fn check_flag(&self, flag: CpuFlag) -> bool {
        (self.flags & 1u16 << (flag as u8)) != 0
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
