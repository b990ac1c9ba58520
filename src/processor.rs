// The CPU: register file, status register, operand resolution and the
// instruction executor. The whole machine is one owned value; the executor
// is strictly single-threaded and never reentered.

use std::cmp;
use std::collections::HashSet;
use std::fmt;

use log::{debug, trace};

use crate::bus::{Bus, ROM_END};
use crate::disasm::Disasm;
use crate::error::{EmuError, EmuResult};
use crate::fields::{Addr, AddrMode, Condition, OpResult, RegisterId, Size};
use crate::instruction::{Instruction, Kind};
use crate::rom::ENTRY_POINT;

/// A condition flag is deliberately three-valued: operations whose flag
/// effect no program ever depended on may leave a flag `Invalid`, and a read
/// of an invalid flag is fatal instead of silently wrong.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flag {
    Set,
    Clear,
    Invalid,
}

impl Flag {
    /// A pending update carrying this truth value.
    pub fn of(v: bool) -> Option<Flag> {
        Some(if v { Flag::Set } else { Flag::Clear })
    }

    fn to_bool(self, name: char) -> EmuResult<bool> {
        match self {
            Flag::Set => Ok(true),
            Flag::Clear => Ok(false),
            Flag::Invalid => {
                Err(EmuError::Exec(format!("status register flag {} is invalid", name)))
            }
        }
    }

    fn as_char(self, letter: char) -> char {
        match self {
            Flag::Set => letter.to_ascii_uppercase(),
            Flag::Clear => letter,
            Flag::Invalid => '?',
        }
    }
}

/// A set of pending flag updates; `None` leaves the flag untouched.
#[derive(Debug, Copy, Clone, Default)]
pub struct CcrFlags {
    pub x: Option<Flag>,
    pub n: Option<Flag>,
    pub z: Option<Flag>,
    pub v: Option<Flag>,
    pub c: Option<Flag>,
}

impl CcrFlags {
    pub fn new() -> CcrFlags {
        CcrFlags::default()
    }
}

/// Five condition flags plus the 3-bit interrupt-priority mask. The packed
/// 16-bit form puts the mask in bits 8-10 and the flags in bits 0-4.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatusRegister {
    x: Flag,
    n: Flag,
    z: Flag,
    v: Flag,
    c: Flag,
    int_priority_mask: u8,
}

impl StatusRegister {
    pub fn new() -> StatusRegister {
        StatusRegister {
            x: Flag::Clear,
            n: Flag::Clear,
            z: Flag::Clear,
            v: Flag::Clear,
            c: Flag::Clear,
            int_priority_mask: 0,
        }
    }

    pub fn ext(&self) -> EmuResult<bool> {
        self.x.to_bool('x')
    }

    pub fn neg(&self) -> EmuResult<bool> {
        self.n.to_bool('n')
    }

    pub fn zero(&self) -> EmuResult<bool> {
        self.z.to_bool('z')
    }

    pub fn ov(&self) -> EmuResult<bool> {
        self.v.to_bool('v')
    }

    pub fn carry(&self) -> EmuResult<bool> {
        self.c.to_bool('c')
    }

    pub fn set_ext(&mut self, v: bool) {
        self.x = if v { Flag::Set } else { Flag::Clear };
    }

    pub fn invalidate_cc(&mut self) {
        self.x = Flag::Invalid;
        self.n = Flag::Invalid;
        self.z = Flag::Invalid;
        self.v = Flag::Invalid;
        self.c = Flag::Invalid;
    }

    pub fn int_priority_mask(&self) -> u8 {
        self.int_priority_mask
    }

    pub fn apply(&mut self, ccr: CcrFlags) {
        if let Some(f) = ccr.x {
            self.x = f;
        }
        if let Some(f) = ccr.n {
            self.n = f;
        }
        if let Some(f) = ccr.z {
            self.z = f;
        }
        if let Some(f) = ccr.v {
            self.v = f;
        }
        if let Some(f) = ccr.c {
            self.c = f;
        }
    }

    /// Packs into the observable 16-bit form. An invalid flag packs as
    /// clear, so save-states stay total.
    pub fn to_word(&self) -> u16 {
        let mut out = (self.int_priority_mask as u16) << 8;
        if self.c == Flag::Set {
            out |= 1;
        }
        if self.v == Flag::Set {
            out |= 2;
        }
        if self.z == Flag::Set {
            out |= 4;
        }
        if self.n == Flag::Set {
            out |= 8;
        }
        if self.x == Flag::Set {
            out |= 16;
        }
        out
    }

    pub fn set_from_word(&mut self, value: u16) {
        self.c = if value & 1 != 0 { Flag::Set } else { Flag::Clear };
        self.v = if value & 2 != 0 { Flag::Set } else { Flag::Clear };
        self.z = if value & 4 != 0 { Flag::Set } else { Flag::Clear };
        self.n = if value & 8 != 0 { Flag::Set } else { Flag::Clear };
        self.x = if value & 16 != 0 { Flag::Set } else { Flag::Clear };
        self.int_priority_mask = ((value >> 8) & 7) as u8;
    }

    pub fn check_condition(&self, cond: Condition) -> EmuResult<bool> {
        Ok(match cond {
            Condition::T => true,
            Condition::F => false,
            Condition::HI => !self.carry()? && !self.zero()?,
            Condition::LS => self.carry()? || self.zero()?,
            Condition::CC => !self.carry()?,
            Condition::CS => self.carry()?,
            Condition::NE => !self.zero()?,
            Condition::EQ => self.zero()?,
            Condition::VC => !self.ov()?,
            Condition::VS => self.ov()?,
            Condition::PL => !self.neg()?,
            Condition::MI => self.neg()?,
            Condition::GE => self.neg()? == self.ov()?,
            Condition::LT => self.neg()? != self.ov()?,
            Condition::GT => self.neg()? == self.ov()? && !self.zero()?,
            Condition::LE => self.zero()? || self.neg()? != self.ov()?,
        })
    }
}

impl Default for StatusRegister {
    fn default() -> StatusRegister {
        StatusRegister::new()
    }
}

impl fmt::Display for StatusRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{} {}",
            self.x.as_char('x'),
            self.n.as_char('n'),
            self.z.as_char('z'),
            self.v.as_char('v'),
            self.c.as_char('c'),
            self.int_priority_mask
        )
    }
}

/// Eight data and eight address registers. Partial writes to a data
/// register leave its upper bytes alone; any write to an address register
/// sign-extends to the full 32 bits.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    pub d: [i32; 8],
    pub a: [i32; 8],
}

impl RegisterFile {
    pub fn new() -> RegisterFile {
        RegisterFile::default()
    }

    pub fn data(&self, size: Size, n: usize) -> i32 {
        size.trim(self.d[n])
    }

    pub fn addr(&self, size: Size, n: usize) -> i32 {
        size.trim(self.a[n])
    }

    pub fn set_data(&mut self, size: Size, n: usize, v: i32) {
        self.d[n] = match size {
            Size::Byte => ((self.d[n] as u32 & !0xff) | (v as u32 & 0xff)) as i32,
            Size::Word => ((self.d[n] as u32 & !0xffff) | (v as u32 & 0xffff)) as i32,
            Size::Long => v,
        };
    }

    pub fn set_addr(&mut self, size: Size, n: usize, v: i32) {
        self.a[n] = size.trim(v);
    }
}

/// What an executed instruction asks of the frame loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// RTE ran: the interrupt is complete and the display tick is due.
    Rte,
}

pub struct Cpu {
    pub regs: RegisterFile,
    pub sr: StatusRegister,
    pub pc: u32,
    pub bus: Bus,
    disasm: Disasm,
    cache: Vec<Option<Instruction>>,
    seen_jumps: HashSet<u32>,
}

impl Cpu {
    pub fn new(bus: Bus) -> EmuResult<Cpu> {
        Ok(Cpu {
            regs: RegisterFile::new(),
            sr: StatusRegister::new(),
            pc: ENTRY_POINT,
            bus,
            disasm: Disasm::new()?,
            cache: Vec::new(),
            seen_jumps: HashSet::new(),
        })
    }

    pub fn disasm(&self) -> &Disasm {
        &self.disasm
    }

    /// Fetches, decodes (through the cache) and executes one instruction.
    pub fn step(&mut self) -> EmuResult<Effect> {
        if self.pc % 2 == 1 {
            return Err(EmuError::Bus(format!("pc cannot be odd: {:x}", self.pc)));
        }
        let inst = if self.pc < ROM_END {
            let idx = (self.pc / 2) as usize;
            if idx >= self.cache.len() {
                let new_len = cmp::max(self.cache.len() * 2, idx + 1);
                self.cache.resize(new_len, None);
            }
            match self.cache[idx].clone() {
                Some(inst) => inst,
                None => {
                    let inst = self.disasm.disasm_one(&mut self.bus, self.pc)?;
                    self.cache[idx] = Some(inst.clone());
                    inst
                }
            }
        } else {
            // code outside ROM may be rewritten under us, never cache it
            self.disasm.disasm_one(&mut self.bus, self.pc)?
        };
        trace!("{:06x}: {}", self.pc, inst);
        self.pc += inst.bytes;
        self.execute(&inst)
    }

    pub fn read_register(&mut self, size: Size, id: RegisterId) -> EmuResult<i32> {
        let ret = match id {
            RegisterId::Data(n) => self.regs.data(size, n),
            RegisterId::Addr(n) => self.regs.addr(size, n),
            RegisterId::Sr => self.sr.to_word() as i32,
        };
        trace!("{}.{} -> #{:x}", id, size, ret);
        Ok(ret)
    }

    pub fn write_register(&mut self, size: Size, id: RegisterId, v: i32) -> EmuResult<()> {
        trace!("{}.{} <- #{:x}", id, size, v);
        match id {
            RegisterId::Data(n) => self.regs.set_data(size, n, v),
            RegisterId::Addr(n) => self.regs.set_addr(size, n, v),
            RegisterId::Sr => self.sr.set_from_word(v as u16),
        }
        Ok(())
    }

    /// Resolves an addressing mode into an operand location; post-increment
    /// and pre-decrement adjust their register here.
    pub fn read_address(&mut self, size: Size, am: AddrMode) -> EmuResult<Addr> {
        Ok(match am {
            AddrMode::ImmByte(v) => Addr::Imm(OpResult::Byte(v as u8)),
            AddrMode::ImmWord(v) => Addr::Imm(OpResult::Word(v as u16)),
            AddrMode::ImmLong(v) => Addr::Imm(OpResult::Long(v as u32)),
            AddrMode::Reg(reg) => Addr::Reg(reg),
            AddrMode::AbsShort(a) | AddrMode::AbsLong(a) => Addr::Ram(a),
            AddrMode::Indirect(reg) => Addr::Ram(self.read_register(Size::Long, reg)? as u32),
            AddrMode::PostInc(reg) => {
                let addr = self.read_register(Size::Long, reg)? as u32;
                self.write_register(
                    Size::Long,
                    reg,
                    addr.wrapping_add(size.num_bytes()) as i32,
                )?;
                Addr::Ram(addr)
            }
            AddrMode::PreDec(reg) => {
                let addr =
                    (self.read_register(Size::Long, reg)? as u32).wrapping_sub(size.num_bytes());
                self.write_register(Size::Long, reg, addr as i32)?;
                Addr::Ram(addr)
            }
            AddrMode::Disp { reg, idx_size, disp } => {
                Addr::Ram(self.read_register(idx_size, reg)?.wrapping_add(disp) as u32)
            }
            AddrMode::IndexDisp { base, index, idx_size, disp } => {
                let addr = self
                    .read_register(Size::Long, base)?
                    .wrapping_add(self.read_register(idx_size, index)?)
                    .wrapping_add(disp as i32);
                Addr::Ram(addr as u32)
            }
        })
    }

    pub fn read_value(&mut self, size: Size, addr: &Addr, inc: i32) -> EmuResult<i32> {
        match *addr {
            Addr::Imm(imm) => Ok(imm.sign_extend()),
            Addr::Ram(a) => self.bus.read_signed(size, a.wrapping_add(inc as u32)),
            Addr::Reg(reg) => self.read_register(size, reg),
        }
    }

    pub fn write_value(&mut self, size: Size, addr: &Addr, v: i32, inc: i32) -> EmuResult<()> {
        match *addr {
            Addr::Imm(imm) => Err(EmuError::Exec(format!("write to immediate {}", imm))),
            Addr::Ram(a) => self.bus.write_signed(size, a.wrapping_add(inc as u32), v),
            Addr::Reg(reg) => self.write_register(size, reg, v),
        }
    }

    pub fn read_value_am(&mut self, size: Size, am: AddrMode) -> EmuResult<i32> {
        let addr = self.read_address(size, am)?;
        self.read_value(size, &addr, 0)
    }

    pub fn write_value_am(&mut self, size: Size, am: AddrMode, v: i32) -> EmuResult<()> {
        let addr = self.read_address(size, am)?;
        self.write_value(size, &addr, v, 0)
    }

    pub fn push(&mut self, size: Size, v: i32) -> EmuResult<()> {
        let sp = (self.regs.addr(Size::Long, 7) as u32).wrapping_sub(size.num_bytes());
        self.regs.set_addr(Size::Long, 7, sp as i32);
        self.bus.write_signed(size, sp, v)
    }

    pub fn pop(&mut self, size: Size) -> EmuResult<i32> {
        let sp = self.regs.addr(Size::Long, 7) as u32;
        let ret = self.bus.read_signed(size, sp)?;
        self.regs.set_addr(Size::Long, 7, sp.wrapping_add(size.num_bytes()) as i32);
        Ok(ret)
    }

    fn log_jump(&mut self, addr: u32) {
        if self.seen_jumps.insert(addr) {
            debug!("new jump addr: 0x{:05x}", addr);
        }
    }

    fn binary_op(
        &mut self,
        kind: Kind,
        dst: OpResult,
        src: OpResult,
    ) -> EmuResult<(OpResult, CcrFlags)> {
        Ok(match kind {
            Kind::ADD | Kind::ADDI | Kind::ADDQ | Kind::ADDA => dst.add(src, false),
            Kind::SUB | Kind::SUBI | Kind::SUBQ | Kind::SUBA => dst.sub(src, false),
            Kind::AND | Kind::ANDI | Kind::ANDISR => dst.and(src),
            Kind::OR | Kind::ORI | Kind::ORISR => dst.or(src),
            Kind::EOR | Kind::EORI => dst.xor(src),
            Kind::BSET => dst.bset(src.inner()),
            Kind::BCLR => dst.bclr(src.inner()),
            Kind::BCHG => dst.bchg(src.inner()),
            Kind::ASL => dst.asl(src.inner()),
            Kind::ASR => dst.asr(src.inner()),
            Kind::LSL => dst.lsl(src.inner()),
            Kind::LSR => dst.lsr(src.inner()),
            Kind::ROL => dst.rol(src.inner()),
            Kind::ROR => dst.ror(src.inner()),
            Kind::ABCD => dst.abcd(src, self.sr.ext()?),
            _ => return Err(EmuError::Exec(format!("not a binary op: {}", kind))),
        })
    }

    pub fn execute(&mut self, inst: &Instruction) -> EmuResult<Effect> {
        match inst.kind {
            Kind::NOP => {}
            Kind::TST => {
                let size = inst.size()?;
                let v = self.read_value_am(size, inst.src()?)?;
                self.sr.apply(size.from(v).tst());
            }
            Kind::CLR => {
                let size = inst.size()?;
                let dst = self.read_address(size, inst.dst()?)?;
                let (zero, ccr) = size.zero().clear();
                self.sr.apply(ccr);
                self.write_value(size, &dst, zero.sign_extend(), 0)?;
            }
            Kind::BCC => {
                let cond = inst.cond()?;
                let target = self.read_address(Size::Long, inst.src()?)?.ram_addr()?;
                if self.sr.check_condition(cond)? {
                    self.pc = target;
                }
            }
            Kind::DBCC => {
                let size = inst.size()?;
                let cond = inst.cond()?;
                let target = self.read_address(Size::Long, inst.src()?)?.ram_addr()?;
                if !self.sr.check_condition(cond)? {
                    let v = self.read_value_am(size, inst.dst()?)? - 1;
                    self.write_value_am(size, inst.dst()?, v)?;
                    if v != -1 {
                        self.pc = target;
                    }
                }
            }
            Kind::LEA => {
                let size = inst.size()?;
                let addr = self.read_address(size, inst.src()?)?.ram_addr()?;
                self.write_value_am(size, inst.dst()?, addr as i32)?;
            }
            Kind::MOVEM => {
                let size = inst.size()?;
                let list = inst.register_list()?;
                let mut offset: i32 = 0;
                for i in 0..16 {
                    if !list.contains(i) {
                        continue;
                    }
                    let r = list.reg(i);
                    if let Some(src) = inst.src {
                        let inc = if src.is_inc_or_dec() {
                            0
                        } else {
                            offset * size.num_bytes() as i32
                        };
                        let addr = self.read_address(size, src)?;
                        let v = self.read_value(size, &addr, inc)?;
                        self.write_register(Size::Long, r, v)?;
                    } else {
                        let dst = inst.dst()?;
                        let inc = if dst.is_inc_or_dec() {
                            0
                        } else {
                            offset * size.num_bytes() as i32
                        };
                        let v = self.read_register(size, r)?;
                        let addr = self.read_address(size, dst)?;
                        self.write_value(size, &addr, v, inc)?;
                    }
                    offset += 1;
                }
            }
            Kind::ABCD
            | Kind::ADD
            | Kind::ADDA
            | Kind::ADDI
            | Kind::ADDQ
            | Kind::AND
            | Kind::ANDI
            | Kind::ANDISR
            | Kind::ASL
            | Kind::ASR
            | Kind::BSET
            | Kind::BCLR
            | Kind::BCHG
            | Kind::EOR
            | Kind::EORI
            | Kind::LSL
            | Kind::LSR
            | Kind::OR
            | Kind::ORI
            | Kind::ORISR
            | Kind::ROL
            | Kind::ROR
            | Kind::SUB
            | Kind::SUBA
            | Kind::SUBI
            | Kind::SUBQ => {
                let src_size = inst.size()?;
                let dst_am = inst.dst()?;
                let dst_size = if dst_am.is_addr_reg() { Size::Long } else { src_size };
                let dst_addr = self.read_address(dst_size, dst_am)?;
                let src_addr = self.read_address(src_size, inst.src()?)?;
                let dst_val = self.read_value(dst_size, &dst_addr, 0)?;
                let src_val = self.read_value(src_size, &src_addr, 0)?;
                let (result, ccr) =
                    self.binary_op(inst.kind, dst_size.from(dst_val), dst_size.from(src_val))?;
                let no_flags =
                    inst.kind == Kind::ADDA || inst.kind == Kind::SUBA || dst_am.is_addr_reg();
                if !no_flags {
                    self.sr.apply(ccr);
                }
                self.write_value(dst_size, &dst_addr, result.sign_extend(), 0)?;
            }
            Kind::EXG => {
                let size = inst.size()?;
                let dst_addr = self.read_address(size, inst.dst()?)?;
                let src_addr = self.read_address(size, inst.src()?)?;
                let dst_val = self.read_value(size, &dst_addr, 0)?;
                let src_val = self.read_value(size, &src_addr, 0)?;
                self.write_value(size, &dst_addr, src_val, 0)?;
                self.write_value(size, &src_addr, dst_val, 0)?;
            }
            Kind::MULS | Kind::MULU => {
                let size = Size::Word;
                let dst_addr = self.read_address(size, inst.dst()?)?;
                let src_addr = self.read_address(size, inst.src()?)?;
                let dst = size.from(self.read_value(size, &dst_addr, 0)?);
                let src = size.from(self.read_value(size, &src_addr, 0)?);
                let (result, ccr) = if inst.kind == Kind::MULS {
                    dst.muls(src)
                } else {
                    dst.mulu(src)
                };
                self.sr.apply(ccr);
                self.write_value(Size::Long, &dst_addr, result.sign_extend(), 0)?;
            }
            Kind::DIVS | Kind::DIVU => {
                let dst_addr = self.read_address(Size::Long, inst.dst()?)?;
                let src_addr = self.read_address(Size::Word, inst.src()?)?;
                let dst = OpResult::Long(self.read_value(Size::Long, &dst_addr, 0)? as u32);
                let src = Size::Word.from(self.read_value(Size::Word, &src_addr, 0)?);
                let (result, ccr) = if inst.kind == Kind::DIVS {
                    dst.divs(src)?
                } else {
                    dst.divu(src)?
                };
                self.sr.apply(ccr);
                self.write_value(Size::Long, &dst_addr, result.sign_extend(), 0)?;
            }
            Kind::MOVETOSR | Kind::MOVEFROMSR | Kind::MOVEQ | Kind::MOVE | Kind::MOVEUSP => {
                let size = inst.size()?;
                let v = self.read_value_am(size, inst.src()?)?;
                self.write_value_am(size, inst.dst()?, v)?;
                match inst.kind {
                    Kind::MOVE | Kind::MOVEQ => self.sr.apply(size.from(v).tst()),
                    _ => {}
                }
            }
            Kind::JMP => {
                self.pc = self.read_address(Size::Long, inst.src()?)?.ram_addr()?;
                self.log_jump(self.pc);
            }
            Kind::BSR | Kind::JSR => {
                self.push(Size::Long, self.pc as i32)?;
                self.pc = self.read_address(Size::Long, inst.src()?)?.ram_addr()?;
                if inst.kind == Kind::JSR {
                    self.log_jump(self.pc);
                }
            }
            Kind::RTS => {
                self.pc = self.pop(Size::Long)? as u32;
            }
            Kind::RTE => {
                let sr = self.pop(Size::Word)?;
                self.sr.set_from_word(sr as u16);
                self.pc = self.pop(Size::Long)? as u32;
                return Ok(Effect::Rte);
            }
            Kind::EXT | Kind::SWAP | Kind::NEG | Kind::NOT => {
                let size = inst.size()?;
                let dst_addr = self.read_address(size, inst.dst()?)?;
                let dst = size.from(self.read_value(size, &dst_addr, 0)?);
                let (result, ccr) = match inst.kind {
                    Kind::EXT => dst.ext(size),
                    Kind::SWAP => dst.swap(),
                    Kind::NEG => dst.neg(),
                    _ => dst.not(),
                };
                self.sr.apply(ccr);
                self.write_value(size, &dst_addr, result.sign_extend(), 0)?;
            }
            Kind::BTST | Kind::CMP | Kind::CMPA | Kind::CMPI => {
                let size = inst.size()?;
                let src_addr = self.read_address(size, inst.src()?)?;
                let dst_addr = self.read_address(size, inst.dst()?)?;
                let dst = size.from(self.read_value(size, &dst_addr, 0)?);
                let src = self.read_value(size, &src_addr, 0)?;
                let ccr = if inst.kind == Kind::BTST {
                    dst.btst(src as u32)
                } else {
                    dst.cmp(size.from(src))
                };
                self.sr.apply(ccr);
            }
            _ => {
                return Err(EmuError::Unimplemented(inst.kind.as_str().to_string(), inst.pc))
            }
        }
        Ok(Effect::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_status_round_trips() {
        for value in &[0x0000u16, 0x001f, 0x0704, 0x0209, 0x0615] {
            let mut sr = StatusRegister::new();
            sr.set_from_word(*value);
            assert_eq!(sr.to_word(), *value);
        }
        // bits outside the mask and flag fields vanish
        let mut sr = StatusRegister::new();
        sr.set_from_word(0xffff);
        assert_eq!(sr.to_word(), 0x071f);
    }

    #[test]
    fn reading_an_invalid_flag_is_fatal() {
        let mut sr = StatusRegister::new();
        assert!(sr.zero().is_ok());
        sr.invalidate_cc();
        assert!(sr.zero().is_err());
        assert!(sr.check_condition(Condition::EQ).is_err());
        // conditions that need no flags still work
        assert!(sr.check_condition(Condition::T).unwrap());
        assert!(!sr.check_condition(Condition::F).unwrap());
        // packing treats invalid as clear
        assert_eq!(sr.to_word(), 0);
    }

    #[test]
    fn condition_predicates() {
        let mut sr = StatusRegister::new();
        // N=1 V=0: less than
        sr.set_from_word(0x0008);
        assert!(sr.check_condition(Condition::LT).unwrap());
        assert!(!sr.check_condition(Condition::GE).unwrap());
        // N=1 V=1 Z=0: greater than
        sr.set_from_word(0x000a);
        assert!(sr.check_condition(Condition::GT).unwrap());
        assert!(!sr.check_condition(Condition::LE).unwrap());
        // C=0 Z=0: higher
        sr.set_from_word(0x0000);
        assert!(sr.check_condition(Condition::HI).unwrap());
        assert!(!sr.check_condition(Condition::LS).unwrap());
    }

    #[test]
    fn data_register_partial_writes_preserve_upper_bytes() {
        let mut regs = RegisterFile::new();
        regs.set_data(Size::Long, 0, 0x11223344);
        regs.set_data(Size::Byte, 0, 0x55);
        assert_eq!(regs.d[0], 0x11223355);
        regs.set_data(Size::Word, 0, 0x6677);
        assert_eq!(regs.d[0], 0x11226677);
        assert_eq!(regs.data(Size::Byte, 0), 0x77);
        // byte reads sign-extend
        regs.set_data(Size::Byte, 0, 0x80u8 as i32);
        assert_eq!(regs.data(Size::Byte, 0), -128);
    }

    #[test]
    fn address_register_writes_sign_extend() {
        let mut regs = RegisterFile::new();
        regs.set_addr(Size::Word, 0, 0x8000);
        assert_eq!(regs.a[0] as u32, 0xffff8000);
        regs.set_addr(Size::Long, 0, 0x12345678);
        assert_eq!(regs.a[0], 0x12345678);
    }
}
