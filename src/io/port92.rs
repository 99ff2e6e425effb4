use std::cell::Cell;
use std::rc::Rc;

use log::warn;

use crate::io::bus::IoDevice;

pub const PORT_A20: u16 = 0x92;
pub const A20_ENABLE_BIT: u8 = 0x02;
pub const FAST_RESET_BIT: u8 = 0x01;

/// The A20 address line, shared between port 0x92 and physical memory.
pub type A20Line = Rc<Cell<bool>>;

pub fn a20_line(enabled: bool) -> A20Line {
    Rc::new(Cell::new(enabled))
}

/// System Control Port A (0x92)
///
/// Bit 1 drives the A20 line, bit 0 requests a fast CPU reset. The other
/// bits are latched and read back unchanged.
pub struct SystemControlA {
    value: u8,
    a20: A20Line,
    reset_requests: u32,
}

impl SystemControlA {
    pub fn new(a20: A20Line) -> Self {
        let value = if a20.get() { A20_ENABLE_BIT } else { 0 };
        Self {
            value,
            a20,
            reset_requests: 0,
        }
    }

    #[cfg(test)]
    pub fn reset_requests(&self) -> u32 {
        self.reset_requests
    }
}

impl IoDevice for SystemControlA {
    fn port_in_byte(&mut self, _port: u16) -> u8 {
        self.value
    }

    fn port_out_byte(&mut self, _port: u16, value: u8) {
        if value & FAST_RESET_BIT != 0 && self.value & FAST_RESET_BIT == 0 {
            self.reset_requests += 1;
            warn!("fast reset requested through port 92h ({} so far)", self.reset_requests);
        }
        self.value = value;
        self.a20.set(value & A20_ENABLE_BIT != 0);
    }

    fn name(&self) -> &'static str {
        "System Control Port A"
    }
}
