use log::info;

use crate::bios::bda;
use crate::bios::platform::Platform;
use crate::vm::memory::real_address;
use crate::vm::runtime::Runtime;

/// Boot-time part of the system services: publishes the configuration table
/// and the EBDA location. Runs once per machine.
pub fn init_bios(vm: &mut Runtime, platform: &Platform) {
    // Configuration table: size word (bytes that follow) then 8 bytes
    let table = real_address(bda::SEG_BIOS, bda::CONFIG_TABLE_OFFSET);
    let body = [
        bda::MODEL_ID,
        bda::SUBMODEL_ID,
        bda::BIOS_REVISION,
        bda::FEATURE1,
        bda::FEATURE2,
        0x00,
        0x00,
        0x00,
    ];
    vm.memory.write_word(table, body.len() as u16);
    vm.memory.write_bytes(table + 2, &body);

    vm.memory.write_word(bda::EBDA_SEGMENT, platform.ebda_segment());
    vm.memory.write_word(bda::MEMORY_SIZE_KB, platform.conventional_kb());

    // First byte of the EBDA holds its size in KB
    let ebda = real_address(platform.ebda_segment(), 0);
    let ebda_kb = (0xA0000u32.saturating_sub(ebda) / 1024) as u8;
    vm.memory.write_byte(ebda, ebda_kb);

    info!(
        "[BIOS] {} MiB RAM, {} KiB conventional, EBDA at {:04X}h, {} E820 entries",
        platform.ram_size() >> 20,
        platform.conventional_kb(),
        platform.ebda_segment(),
        platform.memory_map().len()
    );
}
