//! INT 15h AH=87h: copy words between two flat 32-bit addresses.
//!
//! The caller hands over a six slot descriptor table at ES:SI:
//!
//! | offset | slot        | filled by |
//! |--------|-------------|-----------|
//! | 00h    | null        | caller (zero) |
//! | 08h    | GDT alias   | firmware  |
//! | 10h    | source      | caller    |
//! | 18h    | destination | caller    |
//! | 20h    | code        | firmware  |
//! | 28h    | stack       | firmware  |
//!
//! The copy runs in protected mode with DS/ES loaded from the source and
//! destination slots. Descriptors are used as given: no limit or
//! access-rights validation is done, a malformed table gives an undefined
//! copy, never an error.

use log::trace;

use crate::bios::a20::set_a20;
use crate::vm::cpu::{
    CpuFlag, SegmentCache, SegmentType, TableRegister, CR0_PE, TRANSITION_IDT,
};
use crate::vm::descriptor::{Descriptor, DESCRIPTOR_SIZE};
use crate::vm::memory::{real_address, BIOS_ROM};
use crate::vm::runtime::Runtime;

pub const GDT_SLOTS: u32 = 6;

const SLOT_GDT: u32 = 1;
const SLOT_CODE: u32 = 4;
const SLOT_STACK: u32 = 5;

const SEL_SOURCE: u16 = 2 << 3;
const SEL_DEST: u16 = 3 << 3;
const SEL_CODE: u16 = (SLOT_CODE as u16) << 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    Setup,
    Armed,
    Transferred,
    Restored,
}

struct SavedMode {
    cr0: u32,
    gdtr: TableRegister,
    idtr: TableRegister,
    cs: SegmentCache,
    ds: SegmentCache,
    es: SegmentCache,
    interrupts: bool,
    a20: bool,
}

/// Protected mode round trip around one block copy.
///
/// Opening the window forces A20 on. Dropping it puts back CR0, both
/// descriptor table registers, the segment caches, IF and the previous A20
/// state, whichever way the window is left.
pub struct ProtectedModeWindow<'a> {
    vm: &'a mut Runtime,
    saved: SavedMode,
    state: MoveState,
}

impl<'a> ProtectedModeWindow<'a> {
    pub fn open(vm: &'a mut Runtime) -> Self {
        let a20 = set_a20(vm, true);
        let cpu = &vm.cpu;
        let saved = SavedMode {
            cr0: cpu.cr0,
            gdtr: cpu.gdtr,
            idtr: cpu.idtr,
            cs: cpu.cs,
            ds: cpu.ds,
            es: cpu.es,
            interrupts: cpu.check_flag(CpuFlag::Interrupt),
            a20,
        };
        trace!("block move: {:?} (A20 was {})", MoveState::Setup, a20 as u8);
        Self {
            vm,
            saved,
            state: MoveState::Setup,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> MoveState {
        self.state
    }

    /// Writes the firmware-owned slots of the table at flat address `table`.
    /// The stack slot covers the caller's stack segment `ss`.
    pub fn install_descriptors(&mut self, table: u32, ss: u16) {
        let slot = |index: u32| table.wrapping_add(index * DESCRIPTOR_SIZE);

        let gdt = Descriptor::data(table, GDT_SLOTS * DESCRIPTOR_SIZE - 1);
        let code = Descriptor::code(BIOS_ROM, 0xFFFF);
        let stack = Descriptor::data(real_address(ss, 0), 0xFFFF);

        let memory = &mut self.vm.memory;
        memory.write_qword(slot(SLOT_GDT), gdt.encode());
        memory.write_qword(slot(SLOT_CODE), code.encode());
        memory.write_qword(slot(SLOT_STACK), stack.encode());
    }

    /// Loads the table, masks interrupts and enters protected mode.
    pub fn arm(&mut self, table: u32) {
        let vm = &mut *self.vm;

        // lgdt reads the first six bytes of the GDT alias slot as a
        // pseudo-descriptor; a 16-bit operand only keeps 24 bits of base.
        let alias = table.wrapping_add(SLOT_GDT * DESCRIPTOR_SIZE);
        vm.cpu.gdtr = TableRegister {
            limit: vm.memory.read_word(alias),
            base: vm.memory.read_dword(alias.wrapping_add(2)) & 0x00FF_FFFF,
        };
        vm.cpu.idtr = TRANSITION_IDT;
        vm.cpu.unset_flag(CpuFlag::Interrupt);
        vm.cpu.cr0 |= CR0_PE;

        vm.cpu.load_segment(SegmentType::CS, SEL_CODE, &vm.memory);
        vm.cpu.load_segment(SegmentType::DS, SEL_SOURCE, &vm.memory);
        vm.cpu.load_segment(SegmentType::ES, SEL_DEST, &vm.memory);

        self.state = MoveState::Armed;
        trace!("block move: {:?} {:?}", self.state, self.vm);
    }

    /// `rep movsw` from DS:0 to ES:0. Offsets wrap at 16 bits.
    pub fn transfer(&mut self, words: u16) -> u16 {
        let vm = &mut *self.vm;
        let src = vm.cpu.ds.base;
        let dst = vm.cpu.es.base;
        for i in 0..words {
            let offset = i.wrapping_mul(2) as u32;
            let word = vm.memory.read_word(src.wrapping_add(offset));
            vm.memory.write_word(dst.wrapping_add(offset), word);
        }

        self.state = MoveState::Transferred;
        trace!("block move: {:?} {} words {:08x} -> {:08x}", self.state, words, src, dst);
        words
    }
}

impl Drop for ProtectedModeWindow<'_> {
    fn drop(&mut self) {
        let saved = &self.saved;
        let cpu = &mut self.vm.cpu;

        cpu.cr0 = saved.cr0;
        cpu.cs = saved.cs;
        cpu.idtr = saved.idtr;
        cpu.gdtr = saved.gdtr;
        cpu.ds = saved.ds;
        cpu.es = saved.es;
        cpu.update_flag(CpuFlag::Interrupt, saved.interrupts);

        set_a20(self.vm, saved.a20);

        self.state = MoveState::Restored;
        trace!("block move: {:?} {:?}", self.state, self.vm);
    }
}

/// Runs a complete block move for a caller on stack segment `ss` and returns
/// the number of words copied.
pub fn block_move(vm: &mut Runtime, table: u32, ss: u16, words: u16) -> u16 {
    let mut window = ProtectedModeWindow::open(vm);
    window.install_descriptors(table, ss);
    window.arm(table);
    window.transfer(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::a20::query_a20;
    use crate::vm::memory::HIGH_MEMORY;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    const TABLE: u32 = 0x7000;
    const STACK: u16 = 0x0030;

    fn setup(src: u32, dst: u32) -> Runtime {
        let mut vm = Runtime::new(4 * 1024 * 1024);
        vm.cpu.set_flag(CpuFlag::Interrupt);
        let slot = |i: u32| TABLE + i * DESCRIPTOR_SIZE;
        vm.memory.write_qword(slot(2), Descriptor::data(src, 0xFFFF).encode());
        vm.memory.write_qword(slot(3), Descriptor::data(dst, 0xFFFF).encode());
        vm
    }

    #[test]
    fn copies_above_one_megabyte_with_a20_forced_on() {
        let src = 0x0020_0000;
        let mut vm = setup(src, HIGH_MEMORY);
        set_a20(&mut vm, true);
        for i in 0..0x100u32 {
            vm.memory.write_byte(src + i, i as u8);
        }
        set_a20(&mut vm, false);
        let before = vm.cpu.clone();

        let moved = block_move(&mut vm, TABLE, STACK, 0x80);

        assert_eq!(moved, 0x80);
        assert!(!query_a20(&mut vm), "A20 must be closed again");
        assert_eq!(vm.cpu, before, "CPU mode state must be restored");
        // with the gate closed the HMA aliases page zero, which must be untouched
        assert_eq!(vm.memory.read_byte(0x00), 0x00);
        set_a20(&mut vm, true);
        for i in 0..0x100u32 {
            assert_eq!(vm.memory.read_byte(HIGH_MEMORY + i), i as u8, "byte {:#x}", i);
        }
    }

    #[test]
    fn keeps_a20_enabled_when_it_was_enabled() {
        let mut vm = setup(0x1000, 0x2000);
        set_a20(&mut vm, true);
        block_move(&mut vm, TABLE, STACK, 1);
        assert!(query_a20(&mut vm));
        assert!(vm.a20_line());
    }

    #[test]
    fn fills_firmware_slots() {
        let mut vm = setup(0x1000, 0x2000);
        block_move(&mut vm, TABLE, STACK, 0);

        let read = |vm: &Runtime, i: u32| Descriptor::decode(vm.memory.read_qword(TABLE + i * 8));
        assert_eq!(read(&vm, 1), Descriptor::data(TABLE, 0x2F));
        assert_eq!(read(&vm, 4), Descriptor::code(0xF0000, 0xFFFF));
        assert_eq!(read(&vm, 5), Descriptor::data(0x300, 0xFFFF));
    }

    #[test]
    fn state_machine_order() {
        let mut vm = setup(0x1000, 0x2000);
        vm.memory.write_word(0x1000, 0xBEEF);

        let mut window = ProtectedModeWindow::open(&mut vm);
        assert_eq!(window.state(), MoveState::Setup);
        window.install_descriptors(TABLE, STACK);
        window.arm(TABLE);
        assert_eq!(window.state(), MoveState::Armed);
        assert!(window.vm.cpu.is_protected());
        assert!(!window.vm.cpu.check_flag(CpuFlag::Interrupt), "interrupts masked while armed");
        assert_eq!(window.vm.cpu.idtr, TRANSITION_IDT);
        assert_eq!(window.vm.cpu.gdtr, TableRegister { base: TABLE, limit: 0x2F });
        assert_eq!(window.vm.cpu.ds.base, 0x1000);
        assert_eq!(window.vm.cpu.es.base, 0x2000);
        assert_eq!(window.transfer(1), 1);
        assert_eq!(window.state(), MoveState::Transferred);
        drop(window);

        assert!(!vm.cpu.is_protected());
        assert!(vm.cpu.check_flag(CpuFlag::Interrupt));
        assert_eq!(vm.memory.read_word(0x2000), 0xBEEF);
    }

    #[test]
    fn restores_when_unwinding() {
        let mut vm = setup(0x1000, 0x2000);
        let before = vm.cpu.clone();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut window = ProtectedModeWindow::open(&mut vm);
            window.install_descriptors(TABLE, STACK);
            window.arm(TABLE);
            panic!("fault inside the window");
        }));

        assert!(result.is_err());
        assert_eq!(vm.cpu, before);
        assert!(!query_a20(&mut vm));
    }
}
