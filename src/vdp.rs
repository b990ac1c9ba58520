// The video display processor. Word writes to the control port either set a
// register (top three bits 100) or form half of a 32-bit transfer command;
// the port is a two-state machine (idle / holding the high word). A parsed
// long command arms a Transfer against VRAM, CRAM or VSRAM, optionally as a
// DMA fill or copy. Rendering lives in `render.rs`.

use std::fmt;
use std::io::{Read, Write};

use log::{debug, trace};

use crate::error::{EmuError, EmuResult};
use crate::fields::Size;

pub const VDP_DATA1: u32 = 0xc00000;
pub const VDP_DATA2: u32 = 0xc00002;
pub const VDP_CTRL1: u32 = 0xc00004;
pub const VDP_CTRL2: u32 = 0xc00006;

pub const NUM_REGS: usize = 24;
pub const VRAM_WORDS: usize = 0x8000;
pub const CRAM_WORDS: usize = 0x40;
pub const VSRAM_WORDS: usize = 0x28;

fn is_word_cmd(cmd: u32) -> bool {
    cmd & 0xe000 == 0x8000
}

fn is_long_cmd(cmd: u32) -> bool {
    cmd & 0xff0c == 0
}

fn bits(v: u32, offset: u32, num: u32) -> u32 {
    (v >> offset) & ((1 << num) - 1)
}

/// One of the VDP's memories, the external bus, or the data port itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Target {
    Vram,
    Cram,
    Vsram,
    Bus,
    Data,
}

impl Target {
    pub fn of_code(code: u32) -> EmuResult<Target> {
        match code {
            0 | 1 => Ok(Target::Vram),
            8 | 3 => Ok(Target::Cram),
            4 | 5 => Ok(Target::Vsram),
            _ => Err(EmuError::Vdp(format!("invalid transfer mode: {}", code))),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rw {
    Read,
    Write,
}

impl Rw {
    pub fn of_code(code: u32) -> EmuResult<Rw> {
        match code {
            0 | 4 | 8 => Ok(Rw::Read),
            1 | 3 | 5 => Ok(Rw::Write),
            _ => Err(EmuError::Vdp(format!("invalid transfer mode: {}", code))),
        }
    }
}

/// An armed transfer: where data-port traffic goes (or comes from) until the
/// next command replaces it.
#[derive(Debug, Copy, Clone)]
pub struct Transfer {
    pub dst: Target,
    pub src: Target,
    pub dst_addr: u32,
    pub length: u32,
    pub dma: bool,
    pub fill: bool,
}

/// A DMA whose source is the external bus. The VDP cannot reach the bus
/// itself, so the router executes these.
#[derive(Debug, Copy, Clone)]
pub struct BusDma {
    pub src_addr: u32,
    pub dst: Target,
    pub dst_addr: u32,
    pub length: u32,
}

/// The 24 byte-wide mode registers, decoded into rendering parameters.
pub struct Registers {
    reg: [u8; NUM_REGS],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Plane {
    Foreground,
    Background,
    Window,
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HScrollKind {
    WholeScreen,
    Per8PixelStrips,
    PerScanLine,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VScrollKind {
    WholeScreen,
    Per16PixelStrips,
}

impl Registers {
    fn new() -> Registers {
        Registers { reg: [0; NUM_REGS] }
    }

    pub fn write(&mut self, idx: usize, v: u8) -> EmuResult<()> {
        if idx >= NUM_REGS {
            return Err(EmuError::Vdp(format!("invalid register index: {}", idx)));
        }
        debug!("VDP: r{:02x} <- {:02x}", idx, v);
        self.reg[idx] = v;
        Ok(())
    }

    pub fn at(&self, idx: usize) -> u32 {
        self.reg[idx] as u32
    }

    pub fn vblank_enabled(&self) -> bool {
        bits(self.at(1), 5, 1) == 1
    }

    pub fn pal_mode(&self) -> bool {
        bits(self.at(1), 3, 1) == 1
    }

    pub fn sprite_table_addr(&self) -> u32 {
        bits(self.at(5), 0, 7) * 0x200
    }

    fn code_to_size(code: u32) -> EmuResult<u32> {
        match code {
            0 => Ok(32),
            1 => Ok(64),
            3 => Ok(128),
            _ => Err(EmuError::Vdp(format!("invalid plane size code: {}", code))),
        }
    }

    pub fn plane_width(&self) -> EmuResult<u32> {
        Registers::code_to_size(bits(self.at(0x10), 0, 2))
    }

    pub fn plane_height(&self) -> EmuResult<u32> {
        Registers::code_to_size(bits(self.at(0x10), 4, 2))
    }

    pub fn plane_addr(&self, plane: Plane) -> u32 {
        match plane {
            Plane::Foreground => bits(self.at(2), 3, 3) * 0x2000,
            Plane::Background => bits(self.at(4), 0, 3) * 0x2000,
            Plane::Window => bits(self.at(3), 1, 5) * 0x800,
        }
    }

    /// Data-port auto-increment, in bytes per access.
    pub fn access_stride(&self) -> u32 {
        self.at(0xf)
    }

    /// DMA source: low 15 bits from 0x15/0x16, the rest from 0x17, doubled
    /// into a byte address. Bit 7 of 0x17 selects how much of 0x17 counts.
    pub fn src_addr(&self) -> u32 {
        let mask = if bits(self.at(0x17), 7, 1) == 0 { 0x7f } else { 0x3f };
        (self.at(0x15) | (self.at(0x16) << 8) | ((self.at(0x17) & mask) << 16)) * 2
    }

    pub fn tx_length(&self) -> u32 {
        (self.at(0x13) | (self.at(0x14) << 8)) * 2
    }

    pub fn tx_is_fill(&self) -> bool {
        bits(self.at(0x17), 6, 2) == 2
    }

    pub fn hscroll_kind(&self) -> EmuResult<HScrollKind> {
        match bits(self.at(0xb), 0, 2) {
            0 => Ok(HScrollKind::WholeScreen),
            2 => Ok(HScrollKind::Per8PixelStrips),
            3 => Ok(HScrollKind::PerScanLine),
            code => Err(EmuError::Vdp(format!("invalid hscroll code: {}", code))),
        }
    }

    pub fn vscroll_kind(&self) -> EmuResult<VScrollKind> {
        match bits(self.at(0xb), 2, 1) {
            0 => Ok(VScrollKind::WholeScreen),
            _ => Ok(VScrollKind::Per16PixelStrips),
        }
    }

    pub fn hscroll_addr(&self) -> u32 {
        bits(self.at(0xd), 0, 6) * 0x400
    }

    pub fn window_y(&self) -> u32 {
        bits(self.at(0x12), 0, 5) * 8
    }

    pub fn window_bottom(&self) -> bool {
        bits(self.at(0x11), 7, 1) == 1
    }

    fn save_state<W: Write>(&self, writer: &mut W) -> EmuResult<()> {
        writer.write_all(&self.reg)?;
        Ok(())
    }

    fn load_state<R: Read>(&mut self, reader: &mut R) -> EmuResult<()> {
        reader.read_exact(&mut self.reg)?;
        Ok(())
    }
}

pub struct Vdp {
    pub(crate) reg: Registers,
    pub(crate) vram: Vec<u16>,
    pub(crate) cram: Vec<u16>,
    pub(crate) vsram: Vec<u16>,
    latch: Option<u16>,
    transfer: Option<Transfer>,
}

impl Vdp {
    pub fn new() -> Vdp {
        Vdp {
            reg: Registers::new(),
            vram: vec![0; VRAM_WORDS],
            cram: vec![0; CRAM_WORDS],
            vsram: vec![0; VSRAM_WORDS],
            latch: None,
            transfer: None,
        }
    }

    pub fn regs(&self) -> &Registers {
        &self.reg
    }

    pub fn vblank_enabled(&self) -> bool {
        self.reg.vblank_enabled()
    }

    pub fn read(&mut self, size: Size, addr: u32) -> EmuResult<u32> {
        match size {
            Size::Byte => Err(EmuError::Vdp(format!("can't read byte from vdp: {:06x}", addr))),
            Size::Word => Ok(self.read_word(addr)? as u32),
            Size::Long => Err(EmuError::Vdp(format!("invalid vdp long read address: {:06x}", addr))),
        }
    }

    fn read_word(&mut self, addr: u32) -> EmuResult<u16> {
        match addr {
            VDP_CTRL1 | VDP_CTRL2 => Ok(self.status_word()),
            VDP_DATA1 | VDP_DATA2 => self.read_data(),
            _ => Err(EmuError::Vdp(format!("invalid vdp word read address: {:06x}", addr))),
        }
    }

    /// The read-back status: fifo empty and vertical blank permanently
    /// asserted, which is what polling loops wait for.
    fn status_word(&self) -> u16 {
        let mut status: u16 = 0x3400;
        status |= 1 << 9; // fifo empty
        status |= 1 << 3; // vertical blank in progress
        if self.reg.pal_mode() {
            status |= 1 << 1;
        }
        status
    }

    pub fn write(&mut self, size: Size, addr: u32, v: u32) -> EmuResult<Option<BusDma>> {
        match size {
            Size::Byte => Err(EmuError::Vdp(format!("can't write byte to vdp: {:06x}", addr))),
            Size::Word => match addr {
                VDP_CTRL1 | VDP_CTRL2 => self.write_ctrl_word(v as u16),
                VDP_DATA1 | VDP_DATA2 => {
                    self.write_data(v as u16)?;
                    Ok(None)
                }
                _ => Err(EmuError::Vdp(format!("invalid vdp word write address: {:06x}", addr))),
            },
            Size::Long => match addr {
                VDP_CTRL1 => self.write_ctrl_long(v),
                VDP_DATA1 => {
                    self.write_data((v >> 16) as u16)?;
                    self.write_data(v as u16)?;
                    Ok(None)
                }
                _ => Err(EmuError::Vdp(format!("invalid vdp long write address: {:06x}", addr))),
            },
        }
    }

    fn write_ctrl_word(&mut self, v: u16) -> EmuResult<Option<BusDma>> {
        // a word command always resets a pending latch; a valid long
        // command's high word can never look like one
        if is_word_cmd(v as u32) {
            self.latch = None;
            self.execute_word_cmd(v as u32)?;
            Ok(None)
        } else if let Some(hi) = self.latch.take() {
            self.execute_long_cmd(((hi as u32) << 16) | v as u32)
        } else {
            self.latch = Some(v);
            Ok(None)
        }
    }

    fn write_ctrl_long(&mut self, v: u32) -> EmuResult<Option<BusDma>> {
        if is_long_cmd(v) {
            self.execute_long_cmd(v)
        } else {
            self.execute_word_cmd(v >> 16)?;
            self.execute_word_cmd(v & 0xffff)?;
            Ok(None)
        }
    }

    fn execute_word_cmd(&mut self, cmd: u32) -> EmuResult<()> {
        if !is_word_cmd(cmd) {
            return Err(EmuError::Vdp(format!("invalid word cmd: {:x}", cmd)));
        }
        let value = (cmd & 0xff) as u8;
        let reg_idx = bits(cmd >> 8, 0, 5) as usize;
        self.reg.write(reg_idx, value)
    }

    fn execute_long_cmd(&mut self, cmd: u32) -> EmuResult<Option<BusDma>> {
        if !is_long_cmd(cmd) {
            return Err(EmuError::Vdp(format!("invalid long cmd: {:x}", cmd)));
        }
        let addr_hi = bits(cmd, 0, 2);
        let mode_hi = bits(cmd, 4, 2);
        let vram_to_vram = bits(cmd, 6, 1) == 1;
        let dma = bits(cmd, 7, 1) == 1;
        let addr_low = bits(cmd, 16, 14);
        let mode_lo = bits(cmd, 30, 2);

        let dst_addr = (addr_hi << 14) | addr_low;
        let mode_code = (mode_hi << 2) | mode_lo;
        let mut dst = Target::of_code(mode_code)?;
        let rw = Rw::of_code(mode_code)?;
        let fill = dma && self.reg.tx_is_fill();
        let length = self.reg.tx_length();

        let mut src = if vram_to_vram {
            Target::Vram
        } else if dma && !fill {
            Target::Bus
        } else {
            Target::Data
        };
        if rw == Rw::Read {
            std::mem::swap(&mut src, &mut dst);
        }

        debug!(
            "VDP: cmd src:{} dst:{} dma:{} dst_addr:{:x} fill:{} length:{}",
            src, dst, dma, dst_addr, fill, length
        );

        let transfer = Transfer { dst, src, dst_addr, length, dma, fill };
        self.transfer = None;
        if dma && !fill {
            match src {
                Target::Bus => {
                    return Ok(Some(BusDma {
                        src_addr: self.reg.src_addr(),
                        dst,
                        dst_addr,
                        length,
                    }))
                }
                _ => self.dma_copy(&transfer)?,
            }
        } else {
            self.transfer = Some(transfer);
        }
        Ok(None)
    }

    fn dma_copy(&mut self, transfer: &Transfer) -> EmuResult<()> {
        let src_addr = self.reg.src_addr();
        debug!(
            "VDP: dma src:{} dst:{} src_addr:{:x} dst_addr:{:x} length:{}",
            transfer.src, transfer.dst, src_addr, transfer.dst_addr, transfer.length
        );
        let mut i = 0;
        while i < transfer.length {
            let word = self.read_target(transfer.src, src_addr + i)?;
            self.write_target(transfer.dst, transfer.dst_addr + i, word)?;
            i += 2;
        }
        Ok(())
    }

    pub fn write_data(&mut self, word: u16) -> EmuResult<()> {
        let transfer = match self.transfer {
            Some(t) => t,
            None => {
                return Err(EmuError::Vdp(format!(
                    "got data without active transfer: {:04x}",
                    word
                )))
            }
        };
        if transfer.dma && transfer.fill {
            debug!("VDP: dma-fill dst_addr:{:x} length:{}", transfer.dst_addr, transfer.length);
            let mut i = 0;
            while i < transfer.length {
                self.write_target(transfer.dst, transfer.dst_addr + i, word)?;
                i += 2;
            }
            self.transfer = None;
        } else if !transfer.dma {
            self.write_target(transfer.dst, transfer.dst_addr, word)?;
            if let Some(t) = self.transfer.as_mut() {
                t.dst_addr += self.reg.access_stride();
            }
        } else {
            return Err(EmuError::Vdp(String::from("unsupported vdp transfer mode")));
        }
        Ok(())
    }

    pub fn read_data(&mut self) -> EmuResult<u16> {
        let transfer = match self.transfer {
            Some(t) => t,
            None => return Err(EmuError::Vdp(String::from("got data read without active transfer"))),
        };
        if !transfer.dma && transfer.dst == Target::Data {
            let ret = self.read_target(transfer.src, transfer.dst_addr)?;
            if let Some(t) = self.transfer.as_mut() {
                t.dst_addr += self.reg.access_stride();
            }
            Ok(ret)
        } else {
            Err(EmuError::Vdp(String::from("unsupported vdp mode when reading data")))
        }
    }

    fn bank(&mut self, target: Target) -> EmuResult<&mut Vec<u16>> {
        match target {
            Target::Vram => Ok(&mut self.vram),
            Target::Cram => Ok(&mut self.cram),
            Target::Vsram => Ok(&mut self.vsram),
            Target::Bus => Err(EmuError::Vdp(String::from("bus is not a vdp memory"))),
            Target::Data => Err(EmuError::Vdp(String::from("data port is not a vdp memory"))),
        }
    }

    pub fn write_target(&mut self, target: Target, addr: u32, data: u16) -> EmuResult<()> {
        trace!("VDP: {}({:05x}).w <- {:x}", target, addr, data);
        if addr % 2 == 1 {
            return Err(EmuError::Vdp(format!("invalid odd write address: {:x}", addr)));
        }
        let word = (addr / 2) as usize;
        let bank = self.bank(target)?;
        if word >= bank.len() {
            return Err(EmuError::Vdp(format!("{} address out of range: {:x}", target, addr)));
        }
        bank[word] = data;
        Ok(())
    }

    pub fn read_target(&mut self, target: Target, addr: u32) -> EmuResult<u16> {
        if addr % 2 == 1 {
            return Err(EmuError::Vdp(format!("invalid odd read address: {:x}", addr)));
        }
        let word = (addr / 2) as usize;
        let bank = self.bank(target)?;
        if word >= bank.len() {
            return Err(EmuError::Vdp(format!("{} address out of range: {:x}", target, addr)));
        }
        Ok(bank[word])
    }

    pub fn save_state<W: Write>(&self, writer: &mut W) -> EmuResult<()> {
        for bank in &[&self.vram, &self.cram, &self.vsram] {
            for word in bank.iter() {
                writer.write_all(&word.to_be_bytes())?;
            }
        }
        self.reg.save_state(writer)?;
        match self.latch {
            Some(hi) => {
                writer.write_all(&[1])?;
                writer.write_all(&hi.to_be_bytes())?;
            }
            None => writer.write_all(&[0, 0, 0])?,
        }
        match self.transfer {
            Some(t) => {
                writer.write_all(&[1, target_code(t.dst), target_code(t.src)])?;
                writer.write_all(&t.dst_addr.to_be_bytes())?;
                writer.write_all(&t.length.to_be_bytes())?;
                writer.write_all(&[t.dma as u8, t.fill as u8])?;
            }
            None => writer.write_all(&[0; 13])?,
        }
        Ok(())
    }

    pub fn load_state<R: Read>(&mut self, reader: &mut R) -> EmuResult<()> {
        for bank in &mut [&mut self.vram, &mut self.cram, &mut self.vsram] {
            for word in bank.iter_mut() {
                let mut buf = [0u8; 2];
                reader.read_exact(&mut buf)?;
                *word = u16::from_be_bytes(buf);
            }
        }
        self.reg.load_state(reader)?;
        let mut latch = [0u8; 3];
        reader.read_exact(&mut latch)?;
        self.latch = if latch[0] == 1 {
            Some(u16::from_be_bytes([latch[1], latch[2]]))
        } else {
            None
        };
        let mut t = [0u8; 13];
        reader.read_exact(&mut t)?;
        self.transfer = if t[0] == 1 {
            Some(Transfer {
                dst: target_of_code(t[1])?,
                src: target_of_code(t[2])?,
                dst_addr: u32::from_be_bytes([t[3], t[4], t[5], t[6]]),
                length: u32::from_be_bytes([t[7], t[8], t[9], t[10]]),
                dma: t[11] == 1,
                fill: t[12] == 1,
            })
        } else {
            None
        };
        Ok(())
    }
}

fn target_code(t: Target) -> u8 {
    match t {
        Target::Vram => 0,
        Target::Cram => 1,
        Target::Vsram => 2,
        Target::Bus => 3,
        Target::Data => 4,
    }
}

fn target_of_code(code: u8) -> EmuResult<Target> {
    match code {
        0 => Ok(Target::Vram),
        1 => Ok(Target::Cram),
        2 => Ok(Target::Vsram),
        3 => Ok(Target::Bus),
        4 => Ok(Target::Data),
        _ => Err(EmuError::Vdp(format!("corrupt state: target code {}", code))),
    }
}
