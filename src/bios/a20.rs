use log::trace;

use crate::io::port92::{A20_ENABLE_BIT, PORT_A20};
use crate::vm::runtime::Runtime;

/// A20 support reported by INT 15h AX=2403h: keyboard controller and port 92h.
pub const A20_SUPPORT: u16 = 0x0003;

/// Sets the A20 gate through System Control Port A.
///
/// Read-modify-write: the other bits of port 92h keep their value. Returns
/// whether the gate was enabled before the call.
pub fn set_a20(vm: &mut Runtime, enable: bool) -> bool {
    let old = vm.port_in_byte(PORT_A20);
    let new = if enable {
        old | A20_ENABLE_BIT
    } else {
        old & !A20_ENABLE_BIT
    };
    vm.port_out_byte(PORT_A20, new);
    trace!("A20 {:02x} -> {:02x}", old, new);
    old & A20_ENABLE_BIT != 0
}

/// Reads the gate back from the port; nothing is cached.
pub fn query_a20(vm: &mut Runtime) -> bool {
    vm.port_in_byte(PORT_A20) & A20_ENABLE_BIT != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_returns_previous_state() {
        let mut vm = Runtime::new(0);
        assert!(!set_a20(&mut vm, true));
        assert!(query_a20(&mut vm));
        assert!(set_a20(&mut vm, true));
        assert!(set_a20(&mut vm, false));
        assert!(!query_a20(&mut vm));
        assert!(!vm.a20_line());
    }

    #[test]
    fn preserves_other_port_bits() {
        let mut vm = Runtime::new(0);
        vm.port_out_byte(PORT_A20, 0xF0);
        set_a20(&mut vm, true);
        assert_eq!(vm.port_in_byte(PORT_A20), 0xF2);
        set_a20(&mut vm, false);
        assert_eq!(vm.port_in_byte(PORT_A20), 0xF0);
    }
}
