use std::fmt::{Debug, Formatter};

use log::debug;

use crate::io::bus::IoBus;
use crate::io::port92::{a20_line, A20Line, SystemControlA, PORT_A20};
use crate::vm::cpu::{Cpu, CpuFlag};
use crate::vm::memory::Memory;

/// The emulated machine the firmware services run on: CPU mode state,
/// physical memory and the port bus.
pub struct Runtime {
    pub cpu: Cpu,
    pub memory: Memory,
    io_bus: IoBus,
    a20: A20Line,
}

impl Runtime {
    /// Builds a machine with `ram_size` bytes of RAM and the A20 gate closed,
    /// the state a PC comes out of reset in.
    pub fn new(ram_size: usize) -> Self {
        let a20 = a20_line(false);
        let memory = Memory::new(ram_size, a20.clone());

        let mut io_bus = IoBus::new();
        io_bus.register(PORT_A20, PORT_A20, Box::new(SystemControlA::new(a20.clone())));

        debug!("machine: {} KiB RAM", memory.size() / 1024);
        Self {
            cpu: Cpu::new(),
            memory,
            io_bus,
            a20,
        }
    }

    /// Current level of the A20 line, as seen by the memory system.
    #[cfg(test)]
    pub fn a20_line(&self) -> bool {
        self.a20.get()
    }

    pub fn port_in_byte(&mut self, port: u16) -> u8 {
        self.io_bus.port_in_byte(port)
    }

    pub fn port_out_byte(&mut self, port: u16, value: u8) {
        self.io_bus.port_out_byte(port, value);
    }
}

#[inline(always)]
fn show_flag(cpu: &Cpu, flag: CpuFlag, c: char) -> char {
    if cpu.check_flag(flag) {
        return c;
    }
    '-'
}

impl Debug for Runtime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let cpu = &self.cpu;
        write!(
            f,
            "cr0={:08x} gdtr={:08x}/{:04x} idtr={:08x}/{:04x} cs={:04x} ds={:04x} es={:04x} {}{} a20={}",
            cpu.cr0,
            cpu.gdtr.base,
            cpu.gdtr.limit,
            cpu.idtr.base,
            cpu.idtr.limit,
            cpu.cs.selector,
            cpu.ds.selector,
            cpu.es.selector,
            show_flag(cpu, CpuFlag::Interrupt, 'I'),
            show_flag(cpu, CpuFlag::Carry, 'C'),
            self.a20.get() as u8,
        )
    }
}
