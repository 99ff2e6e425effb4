use std::io;
use std::path::{Path, PathBuf};

use num_traits::FromPrimitive;
use serde::Deserialize;
use thiserror::Error;

use crate::bios::frame::RegisterFrame;
use crate::bios::memmap::{E820Entry, E820Type, MemoryMap, MemoryMapError};
use crate::bios::platform::{Platform, DEFAULT_EBDA_SEGMENT};
use crate::vm::cpu::FLAGS_FIXED;

const MIN_RAM_MB: u32 = 2;
/// 4 GiB - 1 MiB, the largest size that still fits in 32 bits.
const MAX_RAM_MB: u32 = 4095;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    MemoryMap(#[from] MemoryMapError),
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn default_ram_mb() -> u32 {
    32
}

/// Machine description, JSON.
///
/// ```json
/// { "ram_mb": 64, "ebda_segment": 40896,
///   "memory_map": [ { "base": 0, "length": 654336, "type": 1 } ] }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    #[serde(default = "default_ram_mb")]
    pub ram_mb: u32,
    #[serde(default)]
    pub ebda_segment: Option<u16>,
    #[serde(default)]
    pub memory_map: Option<Vec<MapEntryConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapEntryConfig {
    pub base: u64,
    pub length: u64,
    #[serde(rename = "type")]
    pub kind: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            ram_mb: default_ram_mb(),
            ebda_segment: None,
            memory_map: None,
        }
    }
}

impl PlatformConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&read_file(path)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validates the description and runs the platform probe.
    pub fn into_platform(self) -> Result<Platform, ConfigError> {
        if !(MIN_RAM_MB..=MAX_RAM_MB).contains(&self.ram_mb) {
            return Err(ConfigError::Invalid(format!(
                "ram_mb must be between {} and {}, got {}",
                MIN_RAM_MB, MAX_RAM_MB, self.ram_mb
            )));
        }
        let ram_size = self.ram_mb << 20;
        let ebda_segment = self.ebda_segment.unwrap_or(DEFAULT_EBDA_SEGMENT);
        if !(0x1000..0xA000).contains(&ebda_segment) {
            return Err(ConfigError::Invalid(format!(
                "ebda_segment {:04X}h is outside conventional memory",
                ebda_segment
            )));
        }

        let Some(entries) = self.memory_map else {
            return Ok(Platform::probe(ram_size, ebda_segment));
        };
        let entries = entries
            .iter()
            .map(|e| {
                let kind = E820Type::from_u32(e.kind).ok_or_else(|| {
                    ConfigError::Invalid(format!("unknown memory type {} at {:#x}", e.kind, e.base))
                })?;
                Ok(E820Entry::new(e.base, e.length, kind))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let map = MemoryMap::new(entries)?;
        if map.is_empty() {
            return Err(ConfigError::Invalid("memory_map must list at least one region".into()));
        }
        Ok(Platform::with_memory_map(ram_size, ebda_segment, map))
    }
}

/// Register preset for one scripted call. Missing fields are zero.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceCall {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub ds: u16,
    pub es: u16,
    pub ss: u16,
    pub flags: Option<u16>,
}

impl From<&ServiceCall> for RegisterFrame {
    fn from(call: &ServiceCall) -> Self {
        let mut frame = RegisterFrame::default();
        frame.eax.set_dword(call.eax);
        frame.ebx.set_dword(call.ebx);
        frame.ecx.set_dword(call.ecx);
        frame.edx.set_dword(call.edx);
        frame.esi.set_dword(call.esi);
        frame.edi.set_dword(call.edi);
        frame.ebp.set_dword(call.ebp);
        frame.ds = call.ds;
        frame.es = call.es;
        frame.ss = call.ss;
        frame.flags = call.flags.unwrap_or(FLAGS_FIXED) | FLAGS_FIXED;
        frame
    }
}

/// Bytes stored into guest memory before the calls run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryPoke {
    pub address: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CallScript {
    /// Opens A20 while the pokes are written, for data above 1 MiB.
    pub a20: bool,
    pub memory: Vec<MemoryPoke>,
    pub calls: Vec<ServiceCall>,
}

impl CallScript {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&read_file(path)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let platform = PlatformConfig::from_json("{}").unwrap().into_platform().unwrap();
        assert_eq!(platform.ram_size(), 32 << 20);
        assert_eq!(platform.ebda_segment(), DEFAULT_EBDA_SEGMENT);
        assert_eq!(platform.memory_map().len(), 4);
    }

    #[test]
    fn explicit_memory_map() {
        let json = r#"{
            "ram_mb": 64,
            "memory_map": [
                { "base": 1048576, "length": 66060288, "type": 1 },
                { "base": 0, "length": 654336, "type": 1 },
                { "base": 983040, "length": 65536, "type": 2 }
            ]
        }"#;
        let platform = PlatformConfig::from_json(json).unwrap().into_platform().unwrap();
        let map = platform.memory_map().entries();
        assert_eq!(map.len(), 3);
        assert_eq!(map[0].base, 0, "entries are sorted");
        assert_eq!(map[1].kind, E820Type::Reserved);
    }

    #[test]
    fn rejects_invalid_input() {
        let err = PlatformConfig::from_json(r#"{ "ram_mb": 1 }"#)
            .unwrap()
            .into_platform()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{}", err);

        let err = PlatformConfig::from_json(r#"{ "memory_map": [ { "base": 0, "length": 4096, "type": 9 } ] }"#)
            .unwrap()
            .into_platform()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{}", err);

        let err = PlatformConfig::from_json(
            r#"{ "memory_map": [ { "base": 0, "length": 8192, "type": 1 }, { "base": 4096, "length": 4096, "type": 2 } ] }"#,
        )
        .unwrap()
        .into_platform()
        .unwrap_err();
        assert!(matches!(err, ConfigError::MemoryMap(MemoryMapError::Overlap(0, 4096))), "{}", err);

        assert!(matches!(PlatformConfig::from_json(r#"{ "ram": 4 }"#), Err(ConfigError::Parse(_))));

        let err = PlatformConfig::from_json(r#"{ "memory_map": [] }"#)
            .unwrap()
            .into_platform()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{}", err);
    }

    #[test]
    fn ram_size_bounds() {
        let platform = |ram_mb| PlatformConfig { ram_mb, ..PlatformConfig::default() }.into_platform();

        assert_eq!(platform(2).unwrap().ram_size(), 2 << 20);
        assert_eq!(platform(4095).unwrap().ram_size(), 0xFFF0_0000);
        assert!(matches!(platform(4096), Err(ConfigError::Invalid(_))));
        assert!(matches!(platform(u32::MAX), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn call_script_frames() {
        let json = r#"{
            "memory": [ { "address": 4096, "bytes": [1, 2, 3] } ],
            "calls": [ { "eax": 59393 }, { "eax": 59424, "edx": 1397571920, "ecx": 20, "edi": 4096, "flags": 1 } ]
        }"#;
        let script = CallScript::from_json(json).unwrap();
        assert!(!script.a20);
        assert_eq!(script.memory[0].bytes, vec![1, 2, 3]);

        let first = RegisterFrame::from(&script.calls[0]);
        assert_eq!(first.eax.word(), 0xE801);
        assert!(!first.carry());
        let second = RegisterFrame::from(&script.calls[1]);
        assert_eq!(second.edx.dword(), 0x534D_4150);
        assert!(second.carry());
        assert_eq!(second.edi.word(), 0x1000);
    }
}
