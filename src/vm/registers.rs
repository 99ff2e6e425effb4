use std::fmt::{Debug, Formatter};

/// A 32-bit general purpose register with its 16-bit and 8-bit views.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct Register {
    value: u32,
}

impl Register {
    pub const fn new(value: u32) -> Self {
        Self { value }
    }

    #[inline(always)]
    pub fn dword(&self) -> u32 {
        self.value
    }

    #[inline(always)]
    pub fn word(&self) -> u16 {
        self.value as u16
    }

    #[inline(always)]
    pub fn low(&self) -> u8 {
        self.value as u8
    }

    #[inline(always)]
    pub fn high(&self) -> u8 {
        (self.value >> 8) as u8
    }

    #[inline(always)]
    pub fn set_dword(&mut self, value: u32) {
        self.value = value;
    }

    /// Writes the low 16 bits, the upper half is preserved.
    #[inline(always)]
    pub fn set(&mut self, word: u16) {
        self.value = (self.value & 0xFFFF_0000) | word as u32;
    }

    #[inline(always)]
    pub fn set_low(&mut self, byte: u8) {
        self.value = (self.value & !0xFF) | byte as u32;
    }

    #[inline(always)]
    pub fn set_high(&mut self, byte: u8) {
        self.value = (self.value & !0xFF00) | ((byte as u32) << 8);
    }
}

impl From<u32> for Register {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl Debug for Register {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_views_share_storage() {
        let mut reg = Register::new(0xDEAD_BEEF);
        assert_eq!(reg.word(), 0xBEEF);
        assert_eq!(reg.high(), 0xBE);
        assert_eq!(reg.low(), 0xEF);

        reg.set_high(0x12);
        assert_eq!(reg.dword(), 0xDEAD_12EF);
        reg.set_low(0x34);
        assert_eq!(reg.dword(), 0xDEAD_1234);
    }

    #[test]
    fn word_write_keeps_upper_half() {
        let mut reg = Register::new(0x534D_4150);
        reg.set(0x0086);
        assert_eq!(reg.dword(), 0x534D_0086);
    }
}
