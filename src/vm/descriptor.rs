// x86 segment descriptor (8 bytes)
//
//   bits  0..15  limit 0..15
//   bits 16..39  base 0..23
//   bits 40..47  access byte
//   bits 48..51  limit 16..19
//   bits 52..55  flags (G = bit 55)
//   bits 56..63  base 24..31

pub const DESCRIPTOR_SIZE: u32 = 8;

/// Present, ring 0, read/write data segment.
pub const ACCESS_DATA: u8 = 0x93;
/// Present, ring 0, execute/read code segment.
pub const ACCESS_CODE: u8 = 0x9B;

const FLAG_GRANULARITY: u8 = 0x8;
const MAX_BYTE_LIMIT: u32 = 0xF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Descriptor {
    pub base: u32,
    /// Effective limit in bytes (granularity already applied).
    pub limit: u32,
    pub access: u8,
    pub flags: u8,
}

impl Descriptor {
    pub const fn data(base: u32, limit: u32) -> Self {
        Self { base, limit, access: ACCESS_DATA, flags: 0 }
    }

    pub const fn code(base: u32, limit: u32) -> Self {
        Self { base, limit, access: ACCESS_CODE, flags: 0 }
    }

    pub fn decode(raw: u64) -> Self {
        let base = ((raw >> 16) & 0xFF_FFFF) as u32 | (((raw >> 56) as u32) << 24);
        let raw_limit = (raw & 0xFFFF) as u32 | ((((raw >> 48) & 0xF) as u32) << 16);
        let access = (raw >> 40) as u8;
        let flags = ((raw >> 52) & 0xF) as u8;
        let limit = if flags & FLAG_GRANULARITY != 0 {
            (raw_limit << 12) | 0xFFF
        } else {
            raw_limit
        };
        Self { base, limit, access, flags }
    }

    pub fn encode(&self) -> u64 {
        let (raw_limit, flags) = if self.limit > MAX_BYTE_LIMIT {
            (self.limit >> 12, self.flags | FLAG_GRANULARITY)
        } else {
            (self.limit, self.flags & !FLAG_GRANULARITY)
        };

        (raw_limit as u64 & 0xFFFF)
            | ((self.base as u64 & 0xFF_FFFF) << 16)
            | ((self.access as u64) << 40)
            | (((raw_limit as u64 >> 16) & 0xF) << 48)
            | (((flags as u64) & 0xF) << 52)
            | (((self.base as u64) >> 24) << 56)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_encodings() {
        // Flat 4 GiB code segment as loaded by most boot loaders
        let flat = Descriptor::decode(0x00CF_9A00_0000_FFFF);
        assert_eq!(flat.base, 0);
        assert_eq!(flat.limit, 0xFFFF_FFFF);
        assert_eq!(flat.access, 0x9A);

        let rom = Descriptor::code(0xF0000, 0xFFFF);
        assert_eq!(rom.encode(), 0x0000_9B0F_0000_FFFF);
    }

    #[test]
    fn high_base_bytes_are_split() {
        let desc = Descriptor::data(0x1234_5678, 0x7FFF);
        let raw = desc.encode();
        assert_eq!((raw >> 56) as u8, 0x12, "base 24..31 lives in byte 7");
        assert_eq!(((raw >> 16) & 0xFF_FFFF) as u32, 0x34_5678);
        assert_eq!(Descriptor::decode(raw), desc);
    }

    #[test]
    fn large_limit_switches_to_page_granularity() {
        let desc = Descriptor::data(0, 0x00FF_FFFF);
        let decoded = Descriptor::decode(desc.encode());
        assert_eq!(decoded.limit, 0x00FF_FFFF);
        assert_ne!(decoded.flags & FLAG_GRANULARITY, 0);
    }
}
