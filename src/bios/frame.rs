use std::fmt::{Debug, Formatter};

use crate::vm::cpu::{CpuFlag, FLAGS_FIXED};
use crate::vm::registers::Register;

pub const RET_SUCCESS: u8 = 0x00;
/// "Function not supported" status returned in AH.
pub const RET_EUNSUPPORTED: u8 = 0x86;

/// Caller-visible registers of one software-interrupt service call.
///
/// The dispatcher never mutates the caller's frame: it takes the input by
/// reference and hands back a new frame holding the results.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RegisterFrame {
    pub eax: Register,
    pub ebx: Register,
    pub ecx: Register,
    pub edx: Register,
    pub esi: Register,
    pub edi: Register,
    pub ebp: Register,
    /// No service reads DS. It is carried so the caller gets it back unchanged.
    pub ds: u16,
    pub es: u16,
    /// Caller's stack segment, mirrored by the block-move stack descriptor.
    pub ss: u16,
    pub flags: u16,
}

impl Default for RegisterFrame {
    fn default() -> Self {
        Self {
            eax: Register::default(),
            ebx: Register::default(),
            ecx: Register::default(),
            edx: Register::default(),
            esi: Register::default(),
            edi: Register::default(),
            ebp: Register::default(),
            ds: 0,
            es: 0,
            ss: 0,
            flags: FLAGS_FIXED,
        }
    }
}

impl RegisterFrame {
    /// Frame for service `AH:AL`, every other register zero.
    pub fn with_ax(ax: u16) -> Self {
        let mut frame = Self::default();
        frame.eax.set(ax);
        frame
    }

    #[inline]
    pub fn major(&self) -> u8 {
        self.eax.high()
    }

    #[inline]
    pub fn minor(&self) -> u8 {
        self.eax.low()
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.eax.high()
    }

    #[inline]
    pub fn carry(&self) -> bool {
        self.flags & (1 << CpuFlag::Carry as u8) != 0
    }

    #[inline]
    pub fn set_carry(&mut self, carry: bool) {
        let bit = 1u16 << CpuFlag::Carry as u8;
        if carry {
            self.flags |= bit;
        } else {
            self.flags &= !bit;
        }
    }
}

/// How a leaf service finished. Exactly one is produced per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// CF clear, AH untouched.
    Success,
    /// CF clear, AH = code.
    SuccessCode(u8),
    /// CF set, AH = code.
    Fail(u8),
}

impl Outcome {
    pub fn apply(self, frame: &mut RegisterFrame) {
        match self {
            Outcome::Success => frame.set_carry(false),
            Outcome::SuccessCode(code) => {
                frame.eax.set_high(code);
                frame.set_carry(false);
            }
            Outcome::Fail(code) => {
                frame.eax.set_high(code);
                frame.set_carry(true);
            }
        }
    }
}

impl Debug for RegisterFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "eax={:?} ebx={:?} ecx={:?} edx={:?} esi={:?} edi={:?} ebp={:?} ds={:04x} es={:04x} ss={:04x} fl={:04x} {}",
            self.eax,
            self.ebx,
            self.ecx,
            self.edx,
            self.esi,
            self.edi,
            self.ebp,
            self.ds,
            self.es,
            self.ss,
            self.flags,
            if self.carry() { 'C' } else { '-' }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_primitives() {
        let mut frame = RegisterFrame::with_ax(0x2403);
        frame.set_carry(true);
        Outcome::Success.apply(&mut frame);
        assert!(!frame.carry());
        assert_eq!(frame.eax.word(), 0x2403, "Success leaves AH alone");

        Outcome::Fail(RET_EUNSUPPORTED).apply(&mut frame);
        assert!(frame.carry());
        assert_eq!(frame.eax.word(), 0x8603);

        Outcome::SuccessCode(RET_SUCCESS).apply(&mut frame);
        assert!(!frame.carry());
        assert_eq!(frame.eax.word(), 0x0003);
        assert_eq!(frame.flags & FLAGS_FIXED, FLAGS_FIXED);
    }
}
