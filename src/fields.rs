// Definitions of the operand-level vocabulary: operand sizes, sized values,
// condition codes, register ids, addressing modes and the arithmetic
// primitives. Rather than have magic numbers everywhere, we opt for rich
// types wherever it is not too ridiculous; the decoder is the naturally
// messy code responsible for constructing them.

use std::fmt;

use crate::error::{EmuError, EmuResult};
use crate::processor::{CcrFlags, Flag};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Size {
    Byte = 1,
    Word = 2,
    Long = 4,
}

impl Size {
    pub fn num_bytes(self) -> u32 {
        self as u32
    }

    pub fn num_bits(self) -> u32 {
        self.num_bytes() * 8
    }

    pub fn mask(self) -> u32 {
        match self {
            Size::Byte => 0xff,
            Size::Word => 0xffff,
            Size::Long => 0xffff_ffff,
        }
    }

    pub fn msb_mask(self) -> u32 {
        1 << (self.num_bits() - 1)
    }

    /// Reinterprets the low bytes of `value` at this size, sign-extended.
    pub fn trim(self, value: i32) -> i32 {
        match self {
            Size::Byte => value as i8 as i32,
            Size::Word => value as i16 as i32,
            Size::Long => value,
        }
    }

    pub fn from(self, value: i32) -> OpResult {
        match self {
            Size::Byte => OpResult::Byte(value as u8),
            Size::Word => OpResult::Word(value as u16),
            Size::Long => OpResult::Long(value as u32),
        }
    }

    pub fn zero(self) -> OpResult {
        self.from(0)
    }

    pub fn previous(self) -> Size {
        match self {
            Size::Byte | Size::Word => Size::Byte,
            Size::Long => Size::Word,
        }
    }

    /// The common 2-bit encoding: 00/01/10 = byte/word/long.
    pub fn decode3(code: u16) -> EmuResult<Size> {
        match code {
            0 => Ok(Size::Byte),
            1 => Ok(Size::Word),
            2 => Ok(Size::Long),
            _ => Err(EmuError::Decode(format!("unknown size code3: {}", code))),
        }
    }

    /// The MOVE family uses its own 2-bit encoding: 01/11/10 = byte/word/long.
    pub fn decode_move(code: u16) -> EmuResult<Size> {
        match code {
            1 => Ok(Size::Byte),
            3 => Ok(Size::Word),
            2 => Ok(Size::Long),
            _ => Err(EmuError::Decode(format!("unknown size code_move: {}", code))),
        }
    }

    /// The 1-bit encoding: 0/1 = word/long.
    pub fn decode2(code: u16) -> EmuResult<Size> {
        match code {
            0 => Ok(Size::Word),
            1 => Ok(Size::Long),
            _ => Err(EmuError::Decode(format!("unknown size code2: {}", code))),
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Size::Byte => "b",
            Size::Word => "w",
            Size::Long => "l",
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// A value tagged with its operand size. All conversions between sizes are
/// explicit; `sign_extend` is the only way back to a plain integer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpResult {
    Byte(u8),
    Word(u16),
    Long(u32),
}

impl OpResult {
    pub fn inner(self) -> u32 {
        match self {
            OpResult::Byte(b) => b as u32,
            OpResult::Word(w) => w as u32,
            OpResult::Long(l) => l,
        }
    }

    pub fn sign_extend(self) -> i32 {
        match self {
            OpResult::Byte(b) => b as i8 as i32,
            OpResult::Word(w) => w as i16 as i32,
            OpResult::Long(l) => l as i32,
        }
    }

    pub fn size(self) -> Size {
        match self {
            OpResult::Byte(_) => Size::Byte,
            OpResult::Word(_) => Size::Word,
            OpResult::Long(_) => Size::Long,
        }
    }

    pub fn is_negative(self) -> bool {
        self.sign_extend() < 0
    }

    pub fn is_zero(self) -> bool {
        self.inner() == 0
    }

    // Condition-code policy, per opcode family:
    //   add/sub/cmp/neg     all five flags, Extend = Carry
    //   logical/move group  N Z from result, V C cleared, X untouched
    //   mul/div             N Z from result, V C cleared
    //   asl/lsl             X C = last bit out, V = sign changed (ASL only)
    //   asr/lsr             X C = last bit out, V cleared
    //   rol/ror             C = last bit out, V cleared, X untouched
    //   abcd                X C = decimal carry, Z cleared iff nonzero,
    //                       V undefined
    //   bit ops             Z = !bit, nothing else
    // Address-register arithmetic bypasses these entirely (no flags).

    pub fn add(self, other: OpResult, extend: bool) -> (OpResult, CcrFlags) {
        let mut ccr = CcrFlags::new();
        let dst = self.sign_extend();
        let src = other.sign_extend();
        let res = dst.wrapping_add(src).wrapping_add(extend as i32);
        let result = self.size().from(res);
        let neg = result.is_negative();
        ccr.n = Flag::of(neg);
        ccr.z = Flag::of(result.is_zero());
        ccr.v = Flag::of((src < 0 && dst < 0 && !neg) || (src >= 0 && dst >= 0 && neg));
        ccr.c = Flag::of((src < 0 && dst < 0) || (!neg && dst < 0) || (src < 0 && !neg));
        ccr.x = ccr.c;
        (result, ccr)
    }

    pub fn sub(self, other: OpResult, extend: bool) -> (OpResult, CcrFlags) {
        let mut ccr = CcrFlags::new();
        let dst = self.sign_extend();
        let src = other.sign_extend();
        let res = dst.wrapping_sub(src).wrapping_sub(extend as i32);
        let result = self.size().from(res);
        let neg = result.is_negative();
        ccr.n = Flag::of(neg);
        ccr.z = Flag::of(result.is_zero());
        ccr.v = Flag::of((src >= 0 && dst < 0 && !neg) || (src < 0 && dst >= 0 && neg));
        ccr.c = Flag::of((src < 0 && dst >= 0) || (neg && dst >= 0) || (src < 0 && neg));
        ccr.x = ccr.c;
        (result, ccr)
    }

    pub fn cmp(self, other: OpResult) -> CcrFlags {
        self.sub(other, false).1
    }

    pub fn neg(self) -> (OpResult, CcrFlags) {
        let mut ccr = CcrFlags::new();
        let result = self.size().from(self.sign_extend().wrapping_neg());
        ccr.n = Flag::of(result.is_negative());
        ccr.z = Flag::of(result.is_zero());
        // negating the most negative value wraps back onto itself
        ccr.v = Flag::of(!result.is_zero() && result.inner() == self.inner());
        ccr.c = Flag::of(!result.is_zero());
        ccr.x = ccr.c;
        (result, ccr)
    }

    pub fn and(self, other: OpResult) -> (OpResult, CcrFlags) {
        self.bitwise_op(other, |a, b| a & b)
    }

    pub fn or(self, other: OpResult) -> (OpResult, CcrFlags) {
        self.bitwise_op(other, |a, b| a | b)
    }

    pub fn xor(self, other: OpResult) -> (OpResult, CcrFlags) {
        self.bitwise_op(other, |a, b| a ^ b)
    }

    pub fn not(self) -> (OpResult, CcrFlags) {
        self.bitwise_op(self, |a, _| !a)
    }

    pub fn clear(self) -> (OpResult, CcrFlags) {
        self.bitwise_op(self, |a, b| a ^ b)
    }

    pub fn tst(self) -> CcrFlags {
        self.bitwise_op(self, |a, _| a).1
    }

    fn bitwise_op<F>(self, other: OpResult, fun: F) -> (OpResult, CcrFlags)
    where
        F: Fn(u32, u32) -> u32,
    {
        let mut ccr = CcrFlags::new();
        let result = self.size().from(fun(self.inner(), other.inner()) as i32);
        ccr.n = Flag::of(result.is_negative());
        ccr.z = Flag::of(result.is_zero());
        ccr.v = Flag::of(false);
        ccr.c = Flag::of(false);
        (result, ccr)
    }

    /// Exchanges the two halves of a 32-bit value.
    pub fn swap(self) -> (OpResult, CcrFlags) {
        let v = self.inner();
        OpResult::Long((v >> 16) | (v << 16)).tst_result()
    }

    /// Sign-extends the previous size into this one.
    pub fn ext(self, size: Size) -> (OpResult, CcrFlags) {
        let trimmed = size.previous().trim(self.sign_extend());
        size.from(trimmed).tst_result()
    }

    fn tst_result(self) -> (OpResult, CcrFlags) {
        let ccr = self.tst();
        (self, ccr)
    }

    pub fn mulu(self, other: OpResult) -> (OpResult, CcrFlags) {
        let a = self.inner() & 0xffff;
        let b = other.inner() & 0xffff;
        OpResult::Long(a.wrapping_mul(b)).tst_result()
    }

    pub fn muls(self, other: OpResult) -> (OpResult, CcrFlags) {
        let a = Size::Word.trim(self.sign_extend());
        let b = Size::Word.trim(other.sign_extend());
        OpResult::Long(a.wrapping_mul(b) as u32).tst_result()
    }

    /// 32/16 division leaving the quotient in the low word and the remainder
    /// in the high word. Division by zero is fatal to this core.
    pub fn divu(self, other: OpResult) -> EmuResult<(OpResult, CcrFlags)> {
        let a = self.inner();
        let b = other.sign_extend() as u32;
        if b == 0 {
            return Err(EmuError::Exec(String::from("division by zero")));
        }
        let q = a / b;
        let r = a % b;
        Ok(OpResult::Long((q & 0xffff) | (r << 16)).tst_result())
    }

    pub fn divs(self, other: OpResult) -> EmuResult<(OpResult, CcrFlags)> {
        let a = self.sign_extend();
        let b = other.sign_extend();
        if b == 0 {
            return Err(EmuError::Exec(String::from("division by zero")));
        }
        let q = a.wrapping_div(b);
        let r = a.wrapping_rem(b);
        Ok(OpResult::Long(((q as u32) & 0xffff) | ((r as u32) << 16)).tst_result())
    }

    pub fn asl(self, count: u32) -> (OpResult, CcrFlags) {
        self.shift_left(count, true)
    }

    pub fn lsl(self, count: u32) -> (OpResult, CcrFlags) {
        self.shift_left(count, false)
    }

    fn shift_left(self, count: u32, arithmetic: bool) -> (OpResult, CcrFlags) {
        let count = count % 64;
        let size = self.size();
        let msb = size.msb_mask();
        let mut val = self.inner() & size.mask();
        let mut carry = false;
        let mut sign_changed = false;
        for _ in 0..count {
            let old_sign = val & msb != 0;
            carry = old_sign;
            val = (val << 1) & size.mask();
            if (val & msb != 0) != old_sign {
                sign_changed = true;
            }
        }
        let result = size.from(val as i32);
        let mut ccr = CcrFlags::new();
        ccr.n = Flag::of(result.is_negative());
        ccr.z = Flag::of(result.is_zero());
        ccr.v = Flag::of(arithmetic && sign_changed);
        ccr.c = Flag::of(count > 0 && carry);
        if count > 0 {
            ccr.x = ccr.c;
        }
        (result, ccr)
    }

    pub fn asr(self, count: u32) -> (OpResult, CcrFlags) {
        self.shift_right(count, true)
    }

    pub fn lsr(self, count: u32) -> (OpResult, CcrFlags) {
        self.shift_right(count, false)
    }

    fn shift_right(self, count: u32, arithmetic: bool) -> (OpResult, CcrFlags) {
        let count = count % 64;
        let size = self.size();
        let msb = size.msb_mask();
        let mut val = self.inner() & size.mask();
        let mut carry = false;
        for _ in 0..count {
            carry = val & 1 != 0;
            let sign = val & msb != 0;
            val >>= 1;
            if arithmetic && sign {
                val |= msb;
            }
        }
        let result = size.from(val as i32);
        let mut ccr = CcrFlags::new();
        ccr.n = Flag::of(result.is_negative());
        ccr.z = Flag::of(result.is_zero());
        ccr.v = Flag::of(false);
        ccr.c = Flag::of(count > 0 && carry);
        if count > 0 {
            ccr.x = ccr.c;
        }
        (result, ccr)
    }

    pub fn rol(self, count: u32) -> (OpResult, CcrFlags) {
        let size = self.size();
        let bits = size.num_bits();
        let n = count % bits;
        let val = self.inner() & size.mask();
        let rotated = if n == 0 {
            val
        } else {
            ((val << n) | (val >> (bits - n))) & size.mask()
        };
        let result = size.from(rotated as i32);
        let mut ccr = CcrFlags::new();
        ccr.n = Flag::of(result.is_negative());
        ccr.z = Flag::of(result.is_zero());
        ccr.v = Flag::of(false);
        ccr.c = Flag::of(count > 0 && rotated & 1 != 0);
        (result, ccr)
    }

    pub fn ror(self, count: u32) -> (OpResult, CcrFlags) {
        let size = self.size();
        let bits = size.num_bits();
        let n = count % bits;
        let val = self.inner() & size.mask();
        let rotated = if n == 0 {
            val
        } else {
            ((val >> n) | (val << (bits - n))) & size.mask()
        };
        let result = size.from(rotated as i32);
        let mut ccr = CcrFlags::new();
        ccr.n = Flag::of(result.is_negative());
        ccr.z = Flag::of(result.is_zero());
        ccr.v = Flag::of(false);
        ccr.c = Flag::of(count > 0 && rotated & size.msb_mask() != 0);
        (result, ccr)
    }

    /// Packed binary-coded-decimal add with the Extend flag as carry in.
    /// Zero is only ever cleared, never set, so multi-byte chains keep the
    /// flag meaningful across digits.
    pub fn abcd(self, other: OpResult, extend: bool) -> (OpResult, CcrFlags) {
        let a = self.inner() as u8;
        let b = other.inner() as u8;
        let mut lo = (a & 0xf) + (b & 0xf) + extend as u8;
        let mut hi = (a >> 4) + (b >> 4);
        if lo >= 10 {
            lo -= 10;
            hi += 1;
        }
        let mut carry = false;
        if hi >= 10 {
            carry = true;
            hi -= 10;
        }
        let result = OpResult::Byte(lo | (hi << 4));
        let mut ccr = CcrFlags::new();
        ccr.x = Flag::of(carry);
        ccr.c = Flag::of(carry);
        ccr.n = Flag::of(result.is_negative());
        if !result.is_zero() {
            ccr.z = Flag::of(false);
        }
        ccr.v = Some(Flag::Invalid);
        (result, ccr)
    }

    pub fn btst(self, bit: u32) -> CcrFlags {
        let bit = bit % self.size().num_bits();
        let mut ccr = CcrFlags::new();
        ccr.z = Flag::of((self.inner() >> bit) & 1 == 0);
        ccr
    }

    pub fn bset(self, bit: u32) -> (OpResult, CcrFlags) {
        let ccr = self.btst(bit);
        let bit = bit % self.size().num_bits();
        (self.size().from((self.inner() | (1 << bit)) as i32), ccr)
    }

    pub fn bclr(self, bit: u32) -> (OpResult, CcrFlags) {
        let ccr = self.btst(bit);
        let bit = bit % self.size().num_bits();
        (self.size().from((self.inner() & !(1 << bit)) as i32), ccr)
    }

    pub fn bchg(self, bit: u32) -> (OpResult, CcrFlags) {
        let ccr = self.btst(bit);
        let bit = bit % self.size().num_bits();
        (self.size().from((self.inner() ^ (1 << bit)) as i32), ccr)
    }
}

impl fmt::Display for OpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            OpResult::Byte(b) => write!(f, "${:02x}", b),
            OpResult::Word(w) => write!(f, "${:04x}", w),
            OpResult::Long(l) => write!(f, "${:08x}", l),
        }
    }
}

/// One of the sixteen branch/set condition codes, encoded 0-15.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Condition {
    T = 0,
    F = 1,
    HI = 2,
    LS = 3,
    CC = 4,
    CS = 5,
    NE = 6,
    EQ = 7,
    VC = 8,
    VS = 9,
    PL = 10,
    MI = 11,
    GE = 12,
    LT = 13,
    GT = 14,
    LE = 15,
}

impl Condition {
    pub fn of_code(code: u16) -> EmuResult<Condition> {
        Ok(match code {
            0 => Condition::T,
            1 => Condition::F,
            2 => Condition::HI,
            3 => Condition::LS,
            4 => Condition::CC,
            5 => Condition::CS,
            6 => Condition::NE,
            7 => Condition::EQ,
            8 => Condition::VC,
            9 => Condition::VS,
            10 => Condition::PL,
            11 => Condition::MI,
            12 => Condition::GE,
            13 => Condition::LT,
            14 => Condition::GT,
            15 => Condition::LE,
            _ => return Err(EmuError::Decode(format!("invalid condition code: {}", code))),
        })
    }

    pub fn as_asm(self) -> &'static str {
        match self {
            Condition::T => "t",
            Condition::F => "f",
            Condition::HI => "hi",
            Condition::LS => "ls",
            Condition::CC => "cc",
            Condition::CS => "cs",
            Condition::NE => "ne",
            Condition::EQ => "eq",
            Condition::VC => "vc",
            Condition::VS => "vs",
            Condition::PL => "pl",
            Condition::MI => "mi",
            Condition::GE => "ge",
            Condition::LT => "lt",
            Condition::GT => "gt",
            Condition::LE => "le",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_asm())
    }
}

/// A register name. Address register 7 doubles as the user stack pointer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegisterId {
    Data(usize),
    Addr(usize),
    Sr,
}

impl RegisterId {
    pub fn data(id: u16) -> EmuResult<RegisterId> {
        RegisterId::check(id)?;
        Ok(RegisterId::Data(id as usize))
    }

    pub fn addr(id: u16) -> EmuResult<RegisterId> {
        RegisterId::check(id)?;
        Ok(RegisterId::Addr(id as usize))
    }

    pub fn usp() -> RegisterId {
        RegisterId::Addr(7)
    }

    fn check(id: u16) -> EmuResult<()> {
        if id < 8 {
            Ok(())
        } else {
            Err(EmuError::Decode(format!("invalid register number: {}", id)))
        }
    }

    pub fn is_addr(self) -> bool {
        match self {
            RegisterId::Addr(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RegisterId::Data(n) => write!(f, "d{}", n),
            RegisterId::Addr(7) => write!(f, "sp"),
            RegisterId::Addr(n) => write!(f, "a{}", n),
            RegisterId::Sr => write!(f, "sr"),
        }
    }
}

/// A decoded effective address. Each variant carries only the fields its
/// resolution needs; extension words have already been consumed by the time
/// one of these exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddrMode {
    ImmByte(i8),
    ImmWord(i16),
    ImmLong(i32),
    /// Absolute short address, already sign-extended to 32 bits.
    AbsShort(u32),
    AbsLong(u32),
    Reg(RegisterId),
    Indirect(RegisterId),
    PostInc(RegisterId),
    PreDec(RegisterId),
    /// `disp(reg)` with the register read at `idx_size`. PC-relative indexed
    /// modes fold the opcode PC into `disp` and put the index register here.
    Disp {
        reg: RegisterId,
        idx_size: Size,
        disp: i32,
    },
    /// `disp(base, index.size)` with an 8-bit displacement.
    IndexDisp {
        base: RegisterId,
        index: RegisterId,
        idx_size: Size,
        disp: i8,
    },
}

impl AddrMode {
    pub fn imm(size: Size, value: i32) -> AddrMode {
        match size {
            Size::Byte => AddrMode::ImmByte(value as i8),
            Size::Word => AddrMode::ImmWord(value as i16),
            Size::Long => AddrMode::ImmLong(value),
        }
    }

    /// The constant target of an absolute mode, if this is one.
    pub fn abs_addr(self) -> Option<u32> {
        match self {
            AddrMode::AbsShort(a) | AddrMode::AbsLong(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_addr_reg(self) -> bool {
        match self {
            AddrMode::Reg(reg) => reg.is_addr(),
            _ => false,
        }
    }

    pub fn is_inc_or_dec(self) -> bool {
        match self {
            AddrMode::PostInc(_) | AddrMode::PreDec(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AddrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AddrMode::ImmByte(v) => write!(f, "#${:02x}", v as u8),
            AddrMode::ImmWord(v) => write!(f, "#${:04x}", v as u16),
            AddrMode::ImmLong(v) => write!(f, "#${:08x}", v as u32),
            AddrMode::AbsShort(a) => write!(f, "(${:04x}).w", a as u16),
            AddrMode::AbsLong(a) => write!(f, "(${:06x})", a),
            AddrMode::Reg(reg) => write!(f, "{}", reg),
            AddrMode::Indirect(reg) => write!(f, "({})", reg),
            AddrMode::PostInc(reg) => write!(f, "({})+", reg),
            AddrMode::PreDec(reg) => write!(f, "-({})", reg),
            AddrMode::Disp { reg, idx_size, disp } => {
                write!(f, "({}.{}){}", reg, idx_size, SignedHex(disp))
            }
            AddrMode::IndexDisp { base, index, idx_size, disp } => {
                write!(f, "({},{}.{}){}", base, index, idx_size, SignedHex(disp as i32))
            }
        }
    }
}

/// Hex with an explicit sign; `{:x}` alone would print two's complement.
struct SignedHex(i32);

impl fmt::Display for SignedHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-${:x}", -(self.0 as i64))
        } else {
            write!(f, "+${:x}", self.0)
        }
    }
}

/// A fully resolved operand location.
#[derive(Debug, Copy, Clone)]
pub enum Addr {
    Reg(RegisterId),
    Ram(u32),
    Imm(OpResult),
}

impl Addr {
    pub fn ram_addr(self) -> EmuResult<u32> {
        match self {
            Addr::Ram(addr) => Ok(addr),
            Addr::Reg(reg) => Err(EmuError::Exec(format!("not a ram address: {}", reg))),
            Addr::Imm(imm) => Err(EmuError::Exec(format!("not a ram address: {}", imm))),
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Addr::Reg(reg) => write!(f, "{}", reg),
            Addr::Ram(addr) => write!(f, "(${:06x})", addr),
            Addr::Imm(imm) => write!(f, "#{}", imm),
        }
    }
}

/// The register-list bitmask of MOVEM. In pre-decrement mode the hardware
/// reverses the bit assignment, so bit 0 names A7 instead of D0.
#[derive(Debug, Copy, Clone)]
pub struct RegisterList {
    pub reverse: bool,
    pub mask: u16,
}

impl RegisterList {
    pub fn contains(&self, idx: usize) -> bool {
        (self.mask >> idx) & 1 == 1
    }

    pub fn reg(&self, idx: usize) -> RegisterId {
        if self.reverse {
            if idx < 8 {
                RegisterId::Addr(7 - idx)
            } else {
                RegisterId::Data(15 - idx)
            }
        } else if idx < 8 {
            RegisterId::Data(idx)
        } else {
            RegisterId::Addr(idx - 8)
        }
    }
}

impl fmt::Display for RegisterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for idx in 0..16 {
            if !self.contains(idx) {
                continue;
            }
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}", self.reg(idx))?;
            first = false;
        }
        Ok(())
    }
}
