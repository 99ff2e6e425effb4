// BIOS Data Area (BDA) - physical addresses (segment 0x0040 base = 0x400)

pub const EBDA_SEGMENT: u32 = 0x40E;       // Segment of the extended BDA (word)
pub const MEMORY_SIZE_KB: u32 = 0x413;     // Conventional memory in KB (word)

// System configuration table reported by INT 15h AH=C0h, at F000:E6F5
pub const SEG_BIOS: u16 = 0xF000;
pub const CONFIG_TABLE_OFFSET: u16 = 0xE6F5;

pub const MODEL_ID: u8 = 0xFC;             // AT class machine
pub const SUBMODEL_ID: u8 = 0x00;
pub const BIOS_REVISION: u8 = 0x01;

// Feature byte 1: second 8259, RTC, INT 15h/4Fh called by INT 09h, EBDA allocated
pub const FEATURE1: u8 = 0x74;
// Feature byte 2: INT 16h/09h supported
pub const FEATURE2: u8 = 0x40;
