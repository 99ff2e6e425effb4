use byteorder::{ByteOrder, LittleEndian};

use crate::io::port92::A20Line;

pub const BIOS_ROM: u32 = 0xF0000;
pub const HIGH_MEMORY: u32 = 0x10_0000;

/// Smallest backing store: conventional memory, ROM and the high memory area.
pub const MIN_MEMORY_SIZE: usize = 0x11_0000;

const A20_MASK: u32 = 1 << 20;

/// Physical address of a real-mode `segment:offset` pair.
#[inline(always)]
pub const fn real_address(segment: u16, offset: u16) -> u32 {
    ((segment as u32) << 4) + offset as u32
}

/// Guest physical memory.
///
/// Every access goes through the A20 line first: with the gate closed,
/// address bit 20 is forced low and the first megabyte wraps around.
pub struct Memory {
    data: Vec<u8>,
    a20: A20Line,
}

impl Memory {
    pub fn new(size: usize, a20: A20Line) -> Self {
        Self {
            data: vec![0u8; size.max(MIN_MEMORY_SIZE)],
            a20,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn filter_address(&self, address: u32) -> u32 {
        if self.a20.get() {
            address
        } else {
            address & !A20_MASK
        }
    }

    #[inline]
    fn index(&self, address: u32) -> Option<usize> {
        let index = self.filter_address(address) as usize;
        (index < self.data.len()).then_some(index)
    }

    pub fn read_byte(&self, address: u32) -> u8 {
        self.index(address).map_or(0xFF, |i| self.data[i])
    }

    pub fn write_byte(&mut self, address: u32, value: u8) {
        if let Some(i) = self.index(address) {
            self.data[i] = value;
        }
    }

    pub fn read_bytes(&self, address: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.read_byte(address.wrapping_add(i as u32));
        }
    }

    pub fn write_bytes(&mut self, address: u32, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            self.write_byte(address.wrapping_add(i as u32), byte);
        }
    }

    pub fn read_word(&self, address: u32) -> u16 {
        let mut buf = [0u8; 2];
        self.read_bytes(address, &mut buf);
        LittleEndian::read_u16(&buf)
    }

    pub fn write_word(&mut self, address: u32, value: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.write_bytes(address, &buf);
    }

    pub fn read_dword(&self, address: u32) -> u32 {
        let mut buf = [0u8; 4];
        self.read_bytes(address, &mut buf);
        LittleEndian::read_u32(&buf)
    }

    pub fn read_qword(&self, address: u32) -> u64 {
        let mut buf = [0u8; 8];
        self.read_bytes(address, &mut buf);
        LittleEndian::read_u64(&buf)
    }

    pub fn write_qword(&mut self, address: u32, value: u64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.write_bytes(address, &buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::port92::a20_line;

    #[test]
    fn a20_off_wraps_high_memory_area() {
        let line = a20_line(false);
        let mut memory = Memory::new(MIN_MEMORY_SIZE, line.clone());

        // FFFF:0010 is physical 0x100000, which aliases 0x0 with A20 off
        memory.write_byte(real_address(0xFFFF, 0x0010), 0xAA);
        assert_eq!(memory.read_byte(0x0000), 0xAA);

        line.set(true);
        memory.write_byte(HIGH_MEMORY, 0x55);
        assert_eq!(memory.read_byte(0x0000), 0xAA, "A20 on must not alias");
        assert_eq!(memory.read_byte(HIGH_MEMORY), 0x55);
    }

    #[test]
    fn out_of_range_access_is_open_bus() {
        let mut memory = Memory::new(MIN_MEMORY_SIZE, a20_line(true));
        let beyond = MIN_MEMORY_SIZE as u32 + 0x10;
        memory.write_qword(beyond, 0x1234_5678);
        assert_eq!(memory.read_dword(beyond), 0xFFFF_FFFF);
    }

    #[test]
    fn little_endian_layout() {
        let mut memory = Memory::new(MIN_MEMORY_SIZE, a20_line(true));
        memory.write_qword(0x500, 0x0807_0605_0403_0201);
        assert_eq!(memory.read_byte(0x500), 0x01);
        assert_eq!(memory.read_word(0x506), 0x0807);
        assert_eq!(memory.read_dword(0x502), 0x0605_0403);
    }
}
