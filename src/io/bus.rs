use log::trace;

/// A byte-wide device on the port bus.
pub trait IoDevice {
    fn port_in_byte(&mut self, port: u16) -> u8;
    fn port_out_byte(&mut self, port: u16, value: u8);
    fn name(&self) -> &'static str;
}

struct PortMapping {
    start: u16,
    end: u16,
    device_idx: usize,
}

pub struct IoBus {
    devices: Vec<Box<dyn IoDevice>>,
    mappings: Vec<PortMapping>,
}

impl IoBus {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            mappings: Vec::new(),
        }
    }

    pub fn register(&mut self, start: u16, end: u16, device: Box<dyn IoDevice>) {
        trace!("I/O {:04x}-{:04x}: {}", start, end, device.name());
        let idx = self.devices.len();
        self.devices.push(device);
        self.mappings.push(PortMapping {
            start,
            end,
            device_idx: idx,
        });
    }

    fn device(&mut self, port: u16) -> Option<&mut Box<dyn IoDevice>> {
        let idx = self
            .mappings
            .iter()
            .find(|m| (m.start..=m.end).contains(&port))?
            .device_idx;
        self.devices.get_mut(idx)
    }

    /// Unmapped ports float high.
    pub fn port_in_byte(&mut self, port: u16) -> u8 {
        self.device(port).map_or(0xFF, |d| d.port_in_byte(port))
    }

    /// Writes to unmapped ports are dropped.
    pub fn port_out_byte(&mut self, port: u16, value: u8) {
        match self.device(port) {
            Some(device) => device.port_out_byte(port, value),
            None => trace!("I/O {:04x} <- {:02x}: no device", port, value),
        }
    }
}

impl Default for IoBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Latch(u8);

    impl IoDevice for Latch {
        fn port_in_byte(&mut self, _port: u16) -> u8 {
            self.0
        }
        fn port_out_byte(&mut self, _port: u16, value: u8) {
            self.0 = value;
        }
        fn name(&self) -> &'static str {
            "Latch"
        }
    }

    #[test]
    fn unmapped_ports_float_high() {
        let mut bus = IoBus::new();
        bus.port_out_byte(0x80, 0x12);
        assert_eq!(bus.port_in_byte(0x80), 0xFF);
    }

    #[test]
    fn routes_to_registered_range() {
        let mut bus = IoBus::new();
        bus.register(0x70, 0x71, Box::new(Latch(0)));
        bus.register(0x92, 0x92, Box::new(Latch(0xC0)));

        bus.port_out_byte(0x71, 0x5A);
        assert_eq!(bus.port_in_byte(0x70), 0x5A, "both ports reach the same latch");
        assert_eq!(bus.port_in_byte(0x92), 0xC0, "second device untouched");
        assert_eq!(bus.port_in_byte(0x72), 0xFF, "range end is inclusive, not open-ended");
    }
}
