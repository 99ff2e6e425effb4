use log::{debug, warn};

use crate::bios::a20::{query_a20, set_a20, A20_SUPPORT};
use crate::bios::bda;
use crate::bios::block_move::block_move;
use crate::bios::frame::{Outcome, RegisterFrame, RET_EUNSUPPORTED, RET_SUCCESS};
use crate::bios::memmap::{E820_ENTRY_SIZE, SMAP_SIGNATURE};
use crate::bios::platform::Platform;
use crate::vm::memory::real_address;
use crate::vm::runtime::Runtime;

const KB: u32 = 1024;
const MB: u32 = 1024 * KB;

/// A leaf service: reads the caller's registers, writes results into `out`
/// and reports how it finished.
pub type Handler = fn(&mut Runtime, &Platform, &RegisterFrame, &mut RegisterFrame) -> Outcome;

#[derive(Clone, Copy)]
enum Service {
    Leaf(Handler),
    /// Selected further by AL.
    Multiplexed(&'static [(u8, Handler)]),
}

static A20_SERVICES: [(u8, Handler); 4] = [
    (0x00, a20_disable),
    (0x01, a20_enable),
    (0x02, a20_status),
    (0x03, a20_support),
];

static E8_SERVICES: [(u8, Handler); 2] = [
    (0x01, extended_memory_e801),
    (0x20, memory_map_e820),
];

/// INT 15h system services.
///
/// Every (AH, AL) pair maps to exactly one handler; anything not in the table
/// fails with "function not supported".
pub struct SystemServices {
    platform: Platform,
    services: [Option<Service>; 256],
}

impl SystemServices {
    pub fn new(platform: Platform) -> Self {
        let mut services: [Option<Service>; 256] = [None; 256];
        services[0x24] = Some(Service::Multiplexed(&A20_SERVICES));
        services[0x4F] = Some(Service::Leaf(keyboard_intercept));
        services[0x52] = Some(Service::Leaf(media_eject));
        services[0x86] = Some(Service::Leaf(wait));
        services[0x87] = Some(Service::Leaf(move_block));
        services[0x88] = Some(Service::Leaf(extended_memory_size));
        services[0x90] = Some(Service::Leaf(device_busy));
        services[0x91] = Some(Service::Leaf(interrupt_complete));
        services[0xC0] = Some(Service::Leaf(config_table));
        services[0xC1] = Some(Service::Leaf(ebda_segment));
        services[0xE8] = Some(Service::Multiplexed(&E8_SERVICES));
        Self { platform, services }
    }

    #[cfg(test)]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    fn lookup(&self, major: u8, minor: u8) -> Handler {
        match self.services[major as usize] {
            Some(Service::Leaf(handler)) => handler,
            Some(Service::Multiplexed(table)) => table
                .iter()
                .find(|(code, _)| *code == minor)
                .map_or(unsupported as Handler, |&(_, handler)| handler),
            None => unsupported,
        }
    }

    /// Runs one INT 15h call. `regs` is left as the caller passed it; the
    /// returned frame carries the results.
    pub fn dispatch(&self, vm: &mut Runtime, regs: &RegisterFrame) -> RegisterFrame {
        debug!("INT 15h {:02X}{:02X}: {:?}", regs.major(), regs.minor(), regs);

        let handler = self.lookup(regs.major(), regs.minor());
        let mut out = *regs;
        let outcome = handler(vm, &self.platform, regs, &mut out);
        outcome.apply(&mut out);

        debug!("INT 15h {:02X}{:02X} -> {:?}", regs.major(), regs.minor(), outcome);
        out
    }
}

fn unsupported(_vm: &mut Runtime, _p: &Platform, regs: &RegisterFrame, _out: &mut RegisterFrame) -> Outcome {
    warn!("INT 15h: unsupported function AX={:04X}", regs.eax.word());
    Outcome::Fail(RET_EUNSUPPORTED)
}

// AX=2400h - disable A20
fn a20_disable(vm: &mut Runtime, _p: &Platform, _regs: &RegisterFrame, _out: &mut RegisterFrame) -> Outcome {
    set_a20(vm, false);
    Outcome::SuccessCode(RET_SUCCESS)
}

// AX=2401h - enable A20
fn a20_enable(vm: &mut Runtime, _p: &Platform, _regs: &RegisterFrame, _out: &mut RegisterFrame) -> Outcome {
    set_a20(vm, true);
    Outcome::SuccessCode(RET_SUCCESS)
}

// AX=2402h - A20 status in AL
fn a20_status(vm: &mut Runtime, _p: &Platform, _regs: &RegisterFrame, out: &mut RegisterFrame) -> Outcome {
    out.eax.set_low(query_a20(vm) as u8);
    Outcome::SuccessCode(RET_SUCCESS)
}

// AX=2403h - A20 support bitmask in BX
fn a20_support(_vm: &mut Runtime, _p: &Platform, _regs: &RegisterFrame, out: &mut RegisterFrame) -> Outcome {
    out.ebx.set(A20_SUPPORT);
    Outcome::SuccessCode(RET_SUCCESS)
}

// AH=4Fh - keyboard intercept. CF set tells INT 09h to keep the scancode in
// AL; AH still reads 4Fh.
fn keyboard_intercept(_vm: &mut Runtime, _p: &Platform, regs: &RegisterFrame, _out: &mut RegisterFrame) -> Outcome {
    Outcome::Fail(regs.major())
}

// AH=52h - removable media eject
fn media_eject(_vm: &mut Runtime, _p: &Platform, _regs: &RegisterFrame, _out: &mut RegisterFrame) -> Outcome {
    Outcome::SuccessCode(RET_SUCCESS)
}

// AH=86h - wait CX:DX microseconds. There is no guest clock to wait on.
fn wait(_vm: &mut Runtime, _p: &Platform, regs: &RegisterFrame, _out: &mut RegisterFrame) -> Outcome {
    let usec = ((regs.ecx.word() as u32) << 16) | regs.edx.word() as u32;
    debug!("INT 15h wait {} us", usec);
    Outcome::Success
}

// AH=87h - block move, ES:SI descriptor table, CX words.
// The handler runs on the caller's stack, so the stack slot mirrors its SS.
fn move_block(vm: &mut Runtime, _p: &Platform, regs: &RegisterFrame, out: &mut RegisterFrame) -> Outcome {
    let table = real_address(regs.es, regs.esi.word());
    let moved = block_move(vm, table, regs.ss, regs.ecx.word());
    out.ecx.set(moved);
    Outcome::SuccessCode(RET_SUCCESS)
}

// AH=88h - extended memory above 1 MiB in KiB.
// Real machines report at most 63 MiB here.
fn extended_memory_size(_vm: &mut Runtime, p: &Platform, _regs: &RegisterFrame, out: &mut RegisterFrame) -> Outcome {
    let ram = p.ram_size();
    let kb = if ram > 64 * MB {
        63 * KB
    } else {
        ram.saturating_sub(MB) / KB
    };
    out.eax.set(kb as u16);
    Outcome::Success
}

// AH=90h - device busy, called by INT 16h when no key is available
fn device_busy(_vm: &mut Runtime, _p: &Platform, _regs: &RegisterFrame, _out: &mut RegisterFrame) -> Outcome {
    Outcome::Success
}

// AH=91h - interrupt complete, called by INT 16h when a key arrives
fn interrupt_complete(_vm: &mut Runtime, _p: &Platform, _regs: &RegisterFrame, _out: &mut RegisterFrame) -> Outcome {
    Outcome::Success
}

// AH=C0h - ES:BX -> system configuration table
fn config_table(_vm: &mut Runtime, _p: &Platform, _regs: &RegisterFrame, out: &mut RegisterFrame) -> Outcome {
    out.es = bda::SEG_BIOS;
    out.ebx.set(bda::CONFIG_TABLE_OFFSET);
    Outcome::SuccessCode(RET_SUCCESS)
}

// AH=C1h - ES = EBDA segment
fn ebda_segment(_vm: &mut Runtime, p: &Platform, _regs: &RegisterFrame, out: &mut RegisterFrame) -> Outcome {
    out.es = p.ebda_segment();
    Outcome::Success
}

// AX=E801h - extended memory split at 16 MiB.
// AX/CX: KiB between 1 MiB and 16 MiB, BX/DX: 64 KiB blocks above 16 MiB.
fn extended_memory_e801(_vm: &mut Runtime, p: &Platform, _regs: &RegisterFrame, out: &mut RegisterFrame) -> Outcome {
    let ram = p.ram_size();
    let (low, high) = if ram > 16 * MB {
        (15 * KB, (ram - 16 * MB) / (64 * KB))
    } else {
        (ram.saturating_sub(MB) / KB, 0)
    };
    out.ecx.set(low as u16);
    out.edx.set(high as u16);
    // configured memory is reported equal to extended memory
    out.eax.set(low as u16);
    out.ebx.set(high as u16);
    Outcome::Success
}

// AX=E820h - one memory map entry per call, cursor in EBX
fn memory_map_e820(vm: &mut Runtime, p: &Platform, regs: &RegisterFrame, out: &mut RegisterFrame) -> Outcome {
    if regs.edx.dword() != SMAP_SIGNATURE || regs.ecx.dword() < E820_ENTRY_SIZE {
        return Outcome::Fail(RET_EUNSUPPORTED);
    }
    let Some((entry, next)) = p.memory_map().next(regs.ebx.dword()) else {
        return Outcome::Fail(RET_EUNSUPPORTED);
    };

    vm.memory.write_bytes(real_address(regs.es, regs.edi.word()), &entry.to_bytes());
    out.ebx.set_dword(next);
    out.eax.set_dword(SMAP_SIGNATURE);
    out.ecx.set_dword(E820_ENTRY_SIZE);
    Outcome::Success
}
