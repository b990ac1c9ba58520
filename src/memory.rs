use std::io::{Read, Write};

use crate::error::{EmuError, EmuResult};
use crate::fields::Size;

/// A raw byte bank with big-endian word/long accessors. Out-of-range
/// accesses are fatal; the bus router is responsible for handing each bank
/// only addresses inside its window.
pub struct Memory {
    mem: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Memory {
        Memory { mem: vec![0; size] }
    }

    pub fn with_content(content: Vec<u8>) -> Memory {
        Memory { mem: content }
    }

    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    fn check(&self, addr: u32) -> EmuResult<usize> {
        let addr = addr as usize;
        if addr >= self.mem.len() {
            return Err(EmuError::Bus(format!(
                "memory access out of bounds: {:x} >= {:x}",
                addr,
                self.mem.len()
            )));
        }
        Ok(addr)
    }

    pub fn read_u8(&self, addr: u32) -> EmuResult<u8> {
        let addr = self.check(addr)?;
        Ok(self.mem[addr])
    }

    pub fn read_u16(&self, addr: u32) -> EmuResult<u16> {
        Ok(((self.read_u8(addr)? as u16) << 8) | self.read_u8(addr + 1)? as u16)
    }

    pub fn read_u32(&self, addr: u32) -> EmuResult<u32> {
        Ok(((self.read_u16(addr)? as u32) << 16) | self.read_u16(addr + 2)? as u32)
    }

    pub fn write_u8(&mut self, addr: u32, v: u8) -> EmuResult<()> {
        let addr = self.check(addr)?;
        self.mem[addr] = v;
        Ok(())
    }

    pub fn write_u16(&mut self, addr: u32, v: u16) -> EmuResult<()> {
        self.write_u8(addr, (v >> 8) as u8)?;
        self.write_u8(addr + 1, v as u8)
    }

    pub fn write_u32(&mut self, addr: u32, v: u32) -> EmuResult<()> {
        self.write_u16(addr, (v >> 16) as u16)?;
        self.write_u16(addr + 2, v as u16)
    }

    pub fn read(&self, size: Size, addr: u32) -> EmuResult<u32> {
        match size {
            Size::Byte => Ok(self.read_u8(addr)? as u32),
            Size::Word => Ok(self.read_u16(addr)? as u32),
            Size::Long => self.read_u32(addr),
        }
    }

    pub fn write(&mut self, size: Size, addr: u32, v: u32) -> EmuResult<()> {
        match size {
            Size::Byte => self.write_u8(addr, v as u8),
            Size::Word => self.write_u16(addr, v as u16),
            Size::Long => self.write_u32(addr, v),
        }
    }

    pub fn save_state<W: Write>(&self, writer: &mut W) -> EmuResult<()> {
        writer.write_all(&self.mem)?;
        Ok(())
    }

    pub fn load_state<R: Read>(&mut self, reader: &mut R) -> EmuResult<()> {
        reader.read_exact(&mut self.mem)?;
        Ok(())
    }
}
