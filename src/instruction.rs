use std::fmt;

use crate::error::{EmuError, EmuResult};
use crate::fields::{AddrMode, Condition, RegisterList, Size};

/// Instruction mnemonics, one per distinct semantic in the decode table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Kind {
    ORICCR,
    ORISR,
    ORI,
    ANDICCR,
    ANDISR,
    ANDI,
    SUBI,
    ADDI,
    EORICCR,
    EORISR,
    EORI,
    CMPI,
    BTST,
    BCHG,
    BCLR,
    BSET,
    MOVEP,
    MOVE,
    MOVEFROMSR,
    MOVETOCCR,
    MOVETOSR,
    NEGX,
    CLR,
    NEG,
    NOT,
    EXT,
    NBCD,
    SWAP,
    PEA,
    ILLEGAL,
    TAS,
    TST,
    TRAP,
    LINK,
    UNLK,
    MOVEUSP,
    RESET,
    NOP,
    STOP,
    RTE,
    RTS,
    TRAPV,
    RTR,
    JSR,
    JMP,
    MOVEM,
    LEA,
    CHK,
    ADDQ,
    DBCC,
    SCC,
    SUBQ,
    BSR,
    BCC,
    MOVEQ,
    DIVU,
    DIVS,
    SBCD,
    OR,
    SUBA,
    SUBX,
    SUB,
    CMPM,
    EOR,
    CMPA,
    CMP,
    MULU,
    MULS,
    ABCD,
    EXG,
    AND,
    ADDA,
    ADDX,
    ADD,
    ASR,
    ASL,
    LSR,
    LSL,
    ROXR,
    ROXL,
    ROR,
    ROL,
}

const NAMES: &[(Kind, &str)] = &[
    (Kind::ORICCR, "ORI to CCR"),
    (Kind::ORISR, "ORI to SR"),
    (Kind::ORI, "ORI"),
    (Kind::ANDICCR, "ANDI to CCR"),
    (Kind::ANDISR, "ANDI to SR"),
    (Kind::ANDI, "ANDI"),
    (Kind::SUBI, "SUBI"),
    (Kind::ADDI, "ADDI"),
    (Kind::EORICCR, "EORI to CCR"),
    (Kind::EORISR, "EORI to SR"),
    (Kind::EORI, "EORI"),
    (Kind::CMPI, "CMPI"),
    (Kind::BTST, "BTST"),
    (Kind::BCHG, "BCHG"),
    (Kind::BCLR, "BCLR"),
    (Kind::BSET, "BSET"),
    (Kind::MOVEP, "MOVEP"),
    (Kind::MOVE, "MOVE"),
    (Kind::MOVEFROMSR, "MOVE from SR"),
    (Kind::MOVETOCCR, "MOVE to CCR"),
    (Kind::MOVETOSR, "MOVE to SR"),
    (Kind::NEGX, "NEGX"),
    (Kind::CLR, "CLR"),
    (Kind::NEG, "NEG"),
    (Kind::NOT, "NOT"),
    (Kind::EXT, "EXT"),
    (Kind::NBCD, "NBCD"),
    (Kind::SWAP, "SWAP"),
    (Kind::PEA, "PEA"),
    (Kind::ILLEGAL, "ILLEGAL"),
    (Kind::TAS, "TAS"),
    (Kind::TST, "TST"),
    (Kind::TRAP, "TRAP"),
    (Kind::LINK, "LINK"),
    (Kind::UNLK, "UNLK"),
    (Kind::MOVEUSP, "MOVE USP"),
    (Kind::RESET, "RESET"),
    (Kind::NOP, "NOP"),
    (Kind::STOP, "STOP"),
    (Kind::RTE, "RTE"),
    (Kind::RTS, "RTS"),
    (Kind::TRAPV, "TRAPV"),
    (Kind::RTR, "RTR"),
    (Kind::JSR, "JSR"),
    (Kind::JMP, "JMP"),
    (Kind::MOVEM, "MOVEM"),
    (Kind::LEA, "LEA"),
    (Kind::CHK, "CHK"),
    (Kind::ADDQ, "ADDQ"),
    (Kind::DBCC, "DBcc"),
    (Kind::SCC, "Scc"),
    (Kind::SUBQ, "SUBQ"),
    (Kind::BSR, "BSR"),
    (Kind::BCC, "Bcc"),
    (Kind::MOVEQ, "MOVEQ"),
    (Kind::DIVU, "DIVU"),
    (Kind::DIVS, "DIVS"),
    (Kind::SBCD, "SBCD"),
    (Kind::OR, "OR"),
    (Kind::SUBA, "SUBA"),
    (Kind::SUBX, "SUBX"),
    (Kind::SUB, "SUB"),
    (Kind::CMPM, "CMPM"),
    (Kind::EOR, "EOR"),
    (Kind::CMPA, "CMPA"),
    (Kind::CMP, "CMP"),
    (Kind::MULU, "MULU"),
    (Kind::MULS, "MULS"),
    (Kind::ABCD, "ABCD"),
    (Kind::EXG, "EXG"),
    (Kind::AND, "AND"),
    (Kind::ADDA, "ADDA"),
    (Kind::ADDX, "ADDX"),
    (Kind::ADD, "ADD"),
    (Kind::ASR, "ASR"),
    (Kind::ASL, "ASL"),
    (Kind::LSR, "LSR"),
    (Kind::LSL, "LSL"),
    (Kind::ROXR, "ROXR"),
    (Kind::ROXL, "ROXL"),
    (Kind::ROR, "ROR"),
    (Kind::ROL, "ROL"),
];

impl Kind {
    pub fn of_str(name: &str) -> EmuResult<Kind> {
        for (kind, spelled) in NAMES {
            if *spelled == name {
                return Ok(*kind);
            }
        }
        Err(EmuError::Table(format!("unknown instruction name: '{}'", name)))
    }

    pub fn as_str(self) -> &'static str {
        for (kind, spelled) in NAMES {
            if *kind == self {
                return *spelled;
            }
        }
        unreachable!()
    }

    pub fn is_quick(self) -> bool {
        match self {
            Kind::ADDQ | Kind::SUBQ | Kind::MOVEQ => true,
            _ => false,
        }
    }

    /// The address-register arithmetic variants, which never touch flags.
    pub fn is_addr_op(self) -> bool {
        match self {
            Kind::ADDA | Kind::SUBA | Kind::CMPA => true,
            _ => false,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully decoded instruction: the opcode kind plus every operand the
/// program stream supplied, and how many bytes it all consumed.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub kind: Kind,
    pub pc: u32,
    pub bytes: u32,
    pub size: Option<Size>,
    pub cond: Option<Condition>,
    pub src: Option<AddrMode>,
    pub dst: Option<AddrMode>,
    pub register_list: Option<RegisterList>,
}

impl Instruction {
    pub fn new(kind: Kind) -> Instruction {
        Instruction {
            kind,
            pc: 0,
            bytes: 0,
            size: None,
            cond: None,
            src: None,
            dst: None,
            register_list: None,
        }
    }

    fn missing(&self, what: &str) -> EmuError {
        EmuError::Exec(format!("{} has no {} operand", self.kind, what))
    }

    pub fn size(&self) -> EmuResult<Size> {
        self.size.ok_or_else(|| self.missing("size"))
    }

    pub fn cond(&self) -> EmuResult<Condition> {
        self.cond.ok_or_else(|| self.missing("condition"))
    }

    pub fn src(&self) -> EmuResult<AddrMode> {
        self.src.ok_or_else(|| self.missing("source"))
    }

    pub fn dst(&self) -> EmuResult<AddrMode> {
        self.dst.ok_or_else(|| self.missing("destination"))
    }

    pub fn register_list(&self) -> EmuResult<RegisterList> {
        self.register_list.ok_or_else(|| self.missing("register list"))
    }

    pub fn is_unconditional_jump(&self) -> bool {
        match self.kind {
            Kind::BCC => self.cond == Some(Condition::T),
            Kind::RTS | Kind::RTE | Kind::JMP => true,
            _ => false,
        }
    }

    pub fn is_conditional_jump(&self) -> bool {
        match self.kind {
            Kind::BCC | Kind::DBCC => !self.is_unconditional_jump(),
            _ => false,
        }
    }

    pub fn is_fn_call(&self) -> bool {
        match self.kind {
            Kind::BSR | Kind::JSR => true,
            _ => false,
        }
    }

    /// Statically known branch target, used by the reachability walk.
    pub fn jump_addr(&self) -> Option<u32> {
        match self.kind {
            Kind::BCC | Kind::DBCC | Kind::BSR | Kind::JSR | Kind::JMP => {
                self.src.and_then(|am| am.abs_addr())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(size) = self.size {
            write!(f, ".{}", size)?;
        }
        if let Some(cond) = self.cond {
            write!(f, " {}", cond)?;
        }
        if let Some(src) = self.src {
            write!(f, " {}", src)?;
        }
        if let Some(dst) = self.dst {
            write!(f, ",{}", dst)?;
        }
        if let Some(list) = self.register_list {
            write!(f, " [{}]", list)?;
        }
        Ok(())
    }
}
