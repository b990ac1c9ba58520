// Instruction-stream decoding: a cursor walks the program counter through
// the bus, the table decoder classifies each opcode, and the effective-
// address decoder consumes extension words. The same machinery serves the
// executor (one instruction at a time) and the standalone disassembler
// (a reachability walk from known entry points).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::warn;
use termion::color;

use crate::bus::{Bus, VBLANK_VECTOR};
use crate::error::{EmuError, EmuResult};
use crate::fields::{AddrMode, RegisterId, RegisterList, Size};
use crate::instruction::{Instruction, Kind};
use crate::opcodes::{InstFields, OpcodeDecoder};
use crate::rom::ENTRY_POINT;

/// A program-stream reader. `opcode_pc` is the address of the word after
/// the opcode, which is what PC-relative modes and branch displacements are
/// computed from.
struct Cursor<'a> {
    bus: &'a mut Bus,
    pc: u32,
    opcode_pc: u32,
}

impl<'a> Cursor<'a> {
    fn new(bus: &'a mut Bus, pc: u32) -> Cursor<'a> {
        Cursor { bus, pc, opcode_pc: pc }
    }

    fn read_word_pc(&mut self) -> EmuResult<i16> {
        let ret = self.bus.read_signed(Size::Word, self.pc)?;
        self.pc += 2;
        Ok(ret as i16)
    }

    fn read_long_pc(&mut self) -> EmuResult<i32> {
        let ret = self.bus.read_signed(Size::Long, self.pc)?;
        self.pc += 4;
        Ok(ret)
    }

    /// An immediate operand: a byte immediate occupies the low half of one
    /// extension word.
    fn read_pc(&mut self, size: Size) -> EmuResult<i32> {
        match size {
            Size::Byte => Ok(self.read_word_pc()? as i8 as i32),
            Size::Word => Ok(self.read_word_pc()? as i32),
            Size::Long => self.read_long_pc(),
        }
    }

    fn read_next_opcode(&mut self) -> EmuResult<u16> {
        let ret = self.read_word_pc()? as u16;
        self.opcode_pc = self.pc;
        Ok(ret)
    }

    fn index_ext_word(&mut self) -> EmuResult<(RegisterId, Size, i8)> {
        let w = self.read_word_pc()? as u16;
        let disp = (w & 0xff) as i8;
        let idx_size = Size::decode2((w >> 11) & 1)?;
        let reg_id = (w >> 12) & 7;
        let xreg = if (w >> 15) & 1 == 0 {
            RegisterId::data(reg_id)?
        } else {
            RegisterId::addr(reg_id)?
        };
        Ok((xreg, idx_size, disp))
    }

    /// Resolves a 6-bit mode+register field, consuming 0, 2 or 4 more bytes
    /// of extension.
    fn decode_addr_mode(&mut self, size: Size, code: u16) -> EmuResult<AddrMode> {
        let mode = (code >> 3) & 0x7;
        let reg = code & 0x7;
        Ok(match mode {
            0 => AddrMode::Reg(RegisterId::data(reg)?),
            1 => AddrMode::Reg(RegisterId::addr(reg)?),
            2 => AddrMode::Indirect(RegisterId::addr(reg)?),
            3 => AddrMode::PostInc(RegisterId::addr(reg)?),
            4 => AddrMode::PreDec(RegisterId::addr(reg)?),
            5 => AddrMode::Disp {
                reg: RegisterId::addr(reg)?,
                idx_size: Size::Long,
                disp: self.read_word_pc()? as i32,
            },
            6 => {
                let (xreg, idx_size, disp) = self.index_ext_word()?;
                AddrMode::IndexDisp { base: RegisterId::addr(reg)?, index: xreg, idx_size, disp }
            }
            7 => match reg {
                0 => AddrMode::AbsShort(self.read_word_pc()? as i32 as u32),
                1 => AddrMode::AbsLong(self.read_long_pc()? as u32),
                2 => {
                    let base = self.opcode_pc;
                    AddrMode::AbsLong(base.wrapping_add(self.read_word_pc()? as i32 as u32))
                }
                3 => {
                    let base = self.opcode_pc;
                    let (xreg, idx_size, disp) = self.index_ext_word()?;
                    AddrMode::Disp {
                        reg: xreg,
                        idx_size,
                        disp: base.wrapping_add(disp as i32 as u32) as i32,
                    }
                }
                4 => AddrMode::imm(size, self.read_pc(size)?),
                _ => {
                    return Err(EmuError::Decode(format!(
                        "unsupported addressing mode, mode:{} reg:{}",
                        mode, reg
                    )))
                }
            },
            _ => {
                return Err(EmuError::Decode(format!(
                    "unsupported addressing mode, mode:{} reg:{}",
                    mode, reg
                )))
            }
        })
    }
}

pub struct Disasm {
    decoder: OpcodeDecoder,
}

impl Disasm {
    pub fn new() -> EmuResult<Disasm> {
        Ok(Disasm { decoder: OpcodeDecoder::builtin()? })
    }

    pub fn with_table(content: &str) -> EmuResult<Disasm> {
        Ok(Disasm { decoder: OpcodeDecoder::from_table(content)? })
    }

    pub fn decoder(&self) -> &OpcodeDecoder {
        &self.decoder
    }

    /// Decodes the single instruction at `addr`, including every extension
    /// word it consumes.
    pub fn disasm_one(&self, bus: &mut Bus, addr: u32) -> EmuResult<Instruction> {
        let mut cur = Cursor::new(bus, addr);
        let mut inst = self.parse_one(&mut cur).map_err(|e| {
            EmuError::Decode(format!("at {:06x}: {}", addr, e))
        })?;
        inst.pc = addr;
        inst.bytes = cur.pc - addr;
        Ok(inst)
    }

    fn parse_one(&self, cur: &mut Cursor) -> EmuResult<Instruction> {
        let opcode = cur.read_next_opcode()?;
        let fields = self.decoder.decode(opcode)?;
        self.assemble(cur, &fields)
    }

    /// Turns raw opcode fields into operands, reading whatever extension
    /// words the instruction's shape calls for.
    fn assemble(&self, cur: &mut Cursor, fields: &InstFields) -> EmuResult<Instruction> {
        let kind = fields.kind;
        let inst = Instruction::new(kind);
        Ok(match kind {
            Kind::ANDI | Kind::ORI | Kind::EORI | Kind::ADDI | Kind::SUBI | Kind::CMPI => {
                let size = fields.size()?;
                let src = AddrMode::imm(size, cur.read_pc(size)?);
                let dst = cur.decode_addr_mode(size, fields.ea1()?)?;
                Instruction { size: Some(size), src: Some(src), dst: Some(dst), ..inst }
            }
            Kind::TST => {
                let size = fields.size()?;
                let src = cur.decode_addr_mode(size, fields.ea1()?)?;
                Instruction { size: Some(size), src: Some(src), ..inst }
            }
            Kind::BCHG | Kind::BCLR | Kind::BSET | Kind::BTST => {
                let bit_addr = match fields.reg1 {
                    Some(reg) => AddrMode::Reg(reg),
                    None => AddrMode::ImmWord(cur.read_word_pc()?),
                };
                // the size argument is moot: only data modes are legal here
                let dst = cur.decode_addr_mode(Size::Word, fields.ea1()?)?;
                let size = match dst {
                    AddrMode::Reg(_) => Size::Long,
                    AddrMode::ImmByte(_) | AddrMode::ImmWord(_) | AddrMode::ImmLong(_) => {
                        return Err(EmuError::Decode(format!(
                            "immediate destination not allowed for {}",
                            kind
                        )))
                    }
                    _ => Size::Byte,
                };
                Instruction { size: Some(size), src: Some(bit_addr), dst: Some(dst), ..inst }
            }
            Kind::NEG | Kind::NOT | Kind::CLR => {
                let size = fields.size()?;
                let dst = cur.decode_addr_mode(size, fields.ea1()?)?;
                Instruction { size: Some(size), dst: Some(dst), ..inst }
            }
            Kind::BCC => {
                let cond = fields.cond()?;
                let mut disp = fields.disp()? as i32;
                if disp == 0 {
                    disp = cur.read_word_pc()? as i32;
                }
                let target = cur.opcode_pc.wrapping_add(disp as u32);
                Instruction { cond: Some(cond), src: Some(AddrMode::AbsLong(target)), ..inst }
            }
            Kind::BSR => {
                let mut disp = fields.disp()? as i32;
                if disp == 0 {
                    disp = cur.read_word_pc()? as i32;
                }
                let target = cur.opcode_pc.wrapping_add(disp as u32);
                Instruction { src: Some(AddrMode::AbsLong(target)), ..inst }
            }
            Kind::LEA => {
                let src = cur.decode_addr_mode(Size::Long, fields.ea1()?)?;
                Instruction {
                    size: Some(Size::Long),
                    src: Some(src),
                    dst: Some(AddrMode::Reg(fields.reg1()?)),
                    ..inst
                }
            }
            Kind::MOVEQ => Instruction {
                size: Some(Size::Long),
                src: Some(AddrMode::ImmByte(fields.data()?)),
                dst: Some(AddrMode::Reg(fields.reg1()?)),
                ..inst
            },
            Kind::MOVEM => {
                let size = fields.size()?;
                let mem_to_reg = fields.dir()? == 1;
                let mask = cur.read_word_pc()? as u16;
                let am = cur.decode_addr_mode(size, fields.ea1()?)?;
                let reverse = match am {
                    AddrMode::PreDec(_) => true,
                    _ => false,
                };
                let list = RegisterList { reverse, mask };
                let (src, dst) = if mem_to_reg { (Some(am), None) } else { (None, Some(am)) };
                Instruction { size: Some(size), src, dst, register_list: Some(list), ..inst }
            }
            Kind::DBCC => {
                let cond = fields.cond()?;
                let dst = AddrMode::Reg(fields.reg1()?);
                let base = cur.opcode_pc;
                let target = base.wrapping_add(cur.read_word_pc()? as i32 as u32);
                Instruction {
                    size: Some(Size::Word),
                    cond: Some(cond),
                    src: Some(AddrMode::AbsLong(target)),
                    dst: Some(dst),
                    ..inst
                }
            }
            Kind::AND
            | Kind::OR
            | Kind::EOR
            | Kind::SUB
            | Kind::SUBA
            | Kind::SUBQ
            | Kind::ADD
            | Kind::ADDQ
            | Kind::ADDA => {
                let size = fields.size()?;
                let mut src = cur.decode_addr_mode(size, fields.ea1()?)?;
                let dir = if kind.is_quick() { 1 } else { fields.dir.unwrap_or(0) };
                let mut dst = match fields.data {
                    Some(data) => AddrMode::ImmWord(data as i16),
                    None => AddrMode::Reg(fields.reg1()?),
                };
                if dir == 1 {
                    std::mem::swap(&mut src, &mut dst);
                }
                Instruction { size: Some(size), src: Some(src), dst: Some(dst), ..inst }
            }
            Kind::MOVE => {
                let size = fields.size()?;
                let src = cur.decode_addr_mode(size, fields.ea1()?)?;
                let dst = cur.decode_addr_mode(size, fields.ea2()?)?;
                Instruction { size: Some(size), src: Some(src), dst: Some(dst), ..inst }
            }
            Kind::ANDISR | Kind::ORISR => {
                let src = AddrMode::ImmWord(cur.read_word_pc()?);
                Instruction {
                    size: Some(Size::Word),
                    src: Some(src),
                    dst: Some(AddrMode::Reg(RegisterId::Sr)),
                    ..inst
                }
            }
            Kind::MOVETOSR => {
                let src = cur.decode_addr_mode(Size::Word, fields.ea1()?)?;
                Instruction {
                    size: Some(Size::Word),
                    src: Some(src),
                    dst: Some(AddrMode::Reg(RegisterId::Sr)),
                    ..inst
                }
            }
            Kind::MOVEFROMSR => {
                let dst = cur.decode_addr_mode(Size::Word, fields.ea1()?)?;
                Instruction {
                    size: Some(Size::Word),
                    src: Some(AddrMode::Reg(RegisterId::Sr)),
                    dst: Some(dst),
                    ..inst
                }
            }
            Kind::MOVEUSP => {
                let mut src = AddrMode::Reg(fields.reg1()?);
                let mut dst = AddrMode::Reg(RegisterId::usp());
                if fields.dir()? == 1 {
                    std::mem::swap(&mut src, &mut dst);
                }
                Instruction { size: Some(Size::Long), src: Some(src), dst: Some(dst), ..inst }
            }
            Kind::ROR | Kind::ROL | Kind::ASR | Kind::ASL | Kind::LSR | Kind::LSL => {
                let size = fields.size.unwrap_or(Size::Word);
                let bits_src = match (fields.data, fields.reg2) {
                    (Some(data), _) => AddrMode::ImmByte(data),
                    (None, Some(reg)) => AddrMode::Reg(reg),
                    (None, None) => AddrMode::ImmByte(1),
                };
                let target = match fields.ea1 {
                    Some(ea) => cur.decode_addr_mode(size, ea)?,
                    None => AddrMode::Reg(fields.reg1()?),
                };
                Instruction { size: Some(size), src: Some(bits_src), dst: Some(target), ..inst }
            }
            Kind::SWAP => Instruction {
                size: Some(Size::Long),
                dst: Some(AddrMode::Reg(fields.reg1()?)),
                ..inst
            },
            Kind::EXT => Instruction {
                size: Some(fields.size()?),
                dst: Some(AddrMode::Reg(fields.reg1()?)),
                ..inst
            },
            Kind::CMP | Kind::CMPA => {
                let size = fields.size()?;
                let src = cur.decode_addr_mode(size, fields.ea1()?)?;
                Instruction {
                    size: Some(size),
                    src: Some(src),
                    dst: Some(AddrMode::Reg(fields.reg1()?)),
                    ..inst
                }
            }
            Kind::JSR | Kind::JMP => {
                let src = cur.decode_addr_mode(Size::Long, fields.ea1()?)?;
                Instruction { src: Some(src), ..inst }
            }
            Kind::DIVU | Kind::DIVS | Kind::MULU | Kind::MULS => {
                let src = cur.decode_addr_mode(Size::Word, fields.ea1()?)?;
                Instruction {
                    size: Some(Size::Word),
                    src: Some(src),
                    dst: Some(AddrMode::Reg(fields.reg1()?)),
                    ..inst
                }
            }
            Kind::EXG => Instruction {
                size: Some(Size::Long),
                src: Some(AddrMode::Reg(fields.reg1()?)),
                dst: Some(AddrMode::Reg(fields.reg2()?)),
                ..inst
            },
            Kind::ABCD => {
                let to_am = |reg: RegisterId| match reg {
                    RegisterId::Addr(_) => AddrMode::PreDec(reg),
                    _ => AddrMode::Reg(reg),
                };
                Instruction {
                    size: Some(Size::Byte),
                    src: Some(to_am(fields.reg1()?)),
                    dst: Some(to_am(fields.reg2()?)),
                    ..inst
                }
            }
            Kind::RTS | Kind::RTE | Kind::NOP => inst,
            _ => {
                return Err(EmuError::Unimplemented(
                    kind.as_str().to_string(),
                    cur.opcode_pc.wrapping_sub(2),
                ))
            }
        })
    }

    /// Follows the control-flow graph from the given roots, decoding every
    /// straight-line run until an unconditional transfer, and queueing every
    /// statically known branch target.
    pub fn disasm_all(&self, bus: &mut Bus, roots: &[u32]) -> EmuResult<Program> {
        let mut insts: BTreeMap<u32, Instruction> = BTreeMap::new();
        let mut labels: BTreeSet<u32> = BTreeSet::new();
        let mut queue: VecDeque<u32> = roots.iter().cloned().collect();

        while let Some(mut pc) = queue.pop_front() {
            loop {
                if insts.contains_key(&pc) {
                    break;
                }
                let inst = match self.disasm_one(bus, pc) {
                    Ok(inst) => inst,
                    Err(e) => {
                        warn!("stopping walk at {:06x}: {}", pc, e);
                        break;
                    }
                };
                if let Some(src) = inst.src {
                    if let Some(addr) = src.abs_addr() {
                        labels.insert(addr);
                    }
                }
                if let Some(addr) = inst.jump_addr() {
                    queue.push_back(addr);
                }
                let next = pc + inst.bytes;
                let stop = inst.is_unconditional_jump();
                insts.insert(pc, inst);
                if stop {
                    break;
                }
                pc = next;
            }
        }

        let labels = labels.iter().map(|addr| (*addr, format!("L{:x}", addr))).collect();
        Ok(Program { insts, labels })
    }
}

pub struct Program {
    pub insts: BTreeMap<u32, Instruction>,
    pub labels: BTreeMap<u32, String>,
}

impl Program {
    /// Prints the whole image: labelled instructions where the walk found
    /// code, hex dumps for the gaps.
    pub fn print_listing(&self, rom: &[u8]) {
        let mut pc: u32 = 0;
        while (pc as usize) < rom.len() {
            if let Some(label) = self.labels.get(&pc) {
                println!(
                    "\n{}{}:{}",
                    color::Fg(color::Green),
                    label,
                    color::Fg(color::Reset)
                );
            }
            let next_inst = self.insts.range(pc..).next();
            match next_inst {
                Some((&ipc, inst)) if ipc == pc => {
                    println!("{:06x}: {}", pc, inst);
                    pc += inst.bytes;
                }
                _ => {
                    let inst_bound = next_inst.map(|(a, _)| *a).unwrap_or(rom.len() as u32);
                    let label_bound = self
                        .labels
                        .range(pc + 1..)
                        .next()
                        .map(|(a, _)| *a)
                        .unwrap_or(rom.len() as u32);
                    let next = inst_bound.min(label_bound).min(rom.len() as u32);
                    print_hex(pc, &rom[pc as usize..next as usize]);
                    pc = next;
                }
            }
        }
    }
}

const HEX_LINE: usize = 16;

fn print_hex(start: u32, content: &[u8]) {
    for (line, chunk) in content.chunks(HEX_LINE).enumerate() {
        let mut left = String::new();
        let mut right = String::new();
        for i in 0..HEX_LINE {
            match chunk.get(i) {
                Some(&b) => {
                    left.push_str(&format!("{:02x} ", b));
                    right.push(if (32..127).contains(&b) { b as char } else { '.' });
                }
                None => left.push_str("   "),
            }
        }
        println!(
            "{:06x}: {}{}{} {}",
            start as usize + line * HEX_LINE,
            color::Fg(color::LightBlack),
            left,
            color::Fg(color::Reset),
            right
        );
    }
}

/// The walk's default entry points: the reset entry plus the vertical-blank
/// handler if the vector is populated.
pub fn default_roots(bus: &mut Bus) -> Vec<u32> {
    let mut roots = vec![ENTRY_POINT];
    if let Ok(handler) = bus.read_u32(VBLANK_VECTOR) {
        if handler != 0 && handler % 2 == 0 {
            roots.push(handler);
        }
    }
    roots
}
