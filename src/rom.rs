use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{EmuError, EmuResult};
use crate::memory::Memory;

/// Execution begins here; everything below is vectors and the header.
pub const ENTRY_POINT: u32 = 0x200;

const HEADER_OFFSET: usize = 0x100;

const HEADER_FIELDS: &[(&str, usize)] = &[
    ("system_type", 16),
    ("copyright_release_date", 16),
    ("game_title_domestic", 48),
    ("game_title_overseas", 48),
    ("serial_number", 14),
    ("checksum", 2),
    ("device_support", 16),
    ("rom_address_range", 8),
    ("ram_address_range", 8),
    ("extra_memory", 12),
    ("modem_support", 12),
    ("reserved1", 40),
    ("region", 3),
    ("reserved2", 13),
];

/// A cartridge image: a contiguous big-endian blob loaded at address 0,
/// with the labeled ASCII header at 0x100..0x200.
pub struct RomImage {
    data: Vec<u8>,
}

impl RomImage {
    pub fn load<P: AsRef<Path>>(path: P) -> EmuResult<RomImage> {
        Ok(RomImage { data: fs::read(path)? })
    }

    pub fn from_bytes(data: Vec<u8>) -> RomImage {
        RomImage { data }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_memory(self) -> Memory {
        Memory::with_content(self.data)
    }

    pub fn header(&self) -> EmuResult<CartHeader> {
        if self.data.len() < ENTRY_POINT as usize {
            return Err(EmuError::Decode(format!(
                "rom too small for a cartridge header: {} bytes",
                self.data.len()
            )));
        }
        let mut fields = Vec::new();
        let mut offset = HEADER_OFFSET;
        for (name, size) in HEADER_FIELDS {
            let raw = &self.data[offset..offset + size];
            fields.push((*name, String::from_utf8_lossy(raw).into_owned()));
            offset += size;
        }
        Ok(CartHeader { fields })
    }
}

pub struct CartHeader {
    fields: Vec<(&'static str, String)>,
}

impl fmt::Display for CartHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            writeln!(f, "{}: '{}'", name, value)?;
        }
        Ok(())
    }
}
