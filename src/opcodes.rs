// The instruction table is data, not code: `data/instructions.txt` names
// every opcode kind together with the ordered bit fields that make up its
// 16-bit encoding. Decoding walks the table in declared order and takes the
// first line whose literal bits match, so the file's ordering is the
// tie-break between overlapping encodings. The same table drives the
// executor and the disassembler.

use std::fmt;

use crate::error::{EmuError, EmuResult};
use crate::fields::{Condition, RegisterId, Size};
use crate::instruction::Kind;

/// The shipped decode table.
pub const BUILTIN_TABLE: &str = include_str!("../data/instructions.txt");

/// One field token from a table line. Literal bits participate in the match
/// mask; everything else is read back out by shift-and-mask after a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionField {
    /// A run of literal 0/1 bits.
    Bits(String),
    /// `S:1` — word/long.
    Size1,
    /// `S:2` — byte/word/long.
    Size2,
    /// `SM:2` — the MOVE size encoding.
    SizeMove,
    /// `M:1` / `M:2` / `M:3` — a raw mode field.
    Mode(u32),
    /// `An:3` / `An2:3` — an address register.
    AddrReg1,
    AddrReg2,
    /// `Dn:3` / `Dn2:3` — a data register.
    DataReg1,
    DataReg2,
    /// `Xn:3` — an index register number.
    IndexReg,
    /// `D:1` — a direction bit.
    Dir,
    /// `EA1:6` — mode:3 + register:3.
    Ea1,
    /// `EA2:6` — the MOVE destination, with the halves swapped.
    Ea2,
    /// `Vector:4` — a trap vector.
    Vector,
    /// `Data:3` — 3-bit immediate, 0 meaning 8.
    Data3,
    /// `Data:8` — 8-bit immediate.
    Data8,
    /// `Cond:4` — a condition code.
    Cond,
    /// `Disp:8` — an 8-bit displacement.
    Disp,
}

impl InstructionField {
    pub fn parse_field(token: &str) -> EmuResult<InstructionField> {
        let first = token.as_bytes()[0];
        if first == b'0' || first == b'1' {
            if token.bytes().any(|b| b != b'0' && b != b'1') {
                return Err(EmuError::Table(format!("malformed bit pattern: '{}'", token)));
            }
            return Ok(InstructionField::Bits(token.to_string()));
        }
        Ok(match token {
            "S:1" => InstructionField::Size1,
            "S:2" => InstructionField::Size2,
            "SM:2" => InstructionField::SizeMove,
            "M:1" => InstructionField::Mode(1),
            "M:2" => InstructionField::Mode(2),
            "M:3" => InstructionField::Mode(3),
            "An:3" => InstructionField::AddrReg1,
            "An2:3" => InstructionField::AddrReg2,
            "Dn:3" => InstructionField::DataReg1,
            "Dn2:3" => InstructionField::DataReg2,
            "Xn:3" => InstructionField::IndexReg,
            "D:1" => InstructionField::Dir,
            "EA1:6" => InstructionField::Ea1,
            "EA2:6" => InstructionField::Ea2,
            "Vector:4" => InstructionField::Vector,
            "Data:3" => InstructionField::Data3,
            "Data:8" => InstructionField::Data8,
            "Cond:4" => InstructionField::Cond,
            "Disp:8" => InstructionField::Disp,
            _ => return Err(EmuError::Table(format!("unrecognized field token: '{}'", token))),
        })
    }

    pub fn num_bits(&self) -> u32 {
        match self {
            InstructionField::Bits(pattern) => pattern.len() as u32,
            InstructionField::Size1 | InstructionField::Dir => 1,
            InstructionField::Size2 | InstructionField::SizeMove => 2,
            InstructionField::Mode(n) => *n,
            InstructionField::AddrReg1
            | InstructionField::AddrReg2
            | InstructionField::DataReg1
            | InstructionField::DataReg2
            | InstructionField::IndexReg
            | InstructionField::Data3 => 3,
            InstructionField::Vector | InstructionField::Cond => 4,
            InstructionField::Ea1 | InstructionField::Ea2 => 6,
            InstructionField::Data8 | InstructionField::Disp => 8,
        }
    }
}

impl fmt::Display for InstructionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionField::Bits(pattern) => write!(f, "{}", pattern),
            InstructionField::Size1 => write!(f, "S:1"),
            InstructionField::Size2 => write!(f, "S:2"),
            InstructionField::SizeMove => write!(f, "SM:2"),
            InstructionField::Mode(n) => write!(f, "M:{}", n),
            InstructionField::AddrReg1 => write!(f, "An:3"),
            InstructionField::AddrReg2 => write!(f, "An2:3"),
            InstructionField::DataReg1 => write!(f, "Dn:3"),
            InstructionField::DataReg2 => write!(f, "Dn2:3"),
            InstructionField::IndexReg => write!(f, "Xn:3"),
            InstructionField::Dir => write!(f, "D:1"),
            InstructionField::Ea1 => write!(f, "EA1:6"),
            InstructionField::Ea2 => write!(f, "EA2:6"),
            InstructionField::Vector => write!(f, "Vector:4"),
            InstructionField::Data3 => write!(f, "Data:3"),
            InstructionField::Data8 => write!(f, "Data:8"),
            InstructionField::Cond => write!(f, "Cond:4"),
            InstructionField::Disp => write!(f, "Disp:8"),
        }
    }
}

/// The raw fields of a matched opcode, before the disassembler turns them
/// into addressing modes and operands.
#[derive(Debug, Clone)]
pub struct InstFields {
    pub kind: Kind,
    pub size: Option<Size>,
    pub cond: Option<Condition>,
    pub ea1: Option<u16>,
    pub ea2: Option<u16>,
    pub dir: Option<u16>,
    pub disp: Option<i8>,
    pub data: Option<i8>,
    pub mode: Option<u16>,
    pub reg1: Option<RegisterId>,
    pub reg2: Option<RegisterId>,
    pub xn: Option<u16>,
}

impl InstFields {
    fn new(kind: Kind) -> InstFields {
        InstFields {
            kind,
            size: None,
            cond: None,
            ea1: None,
            ea2: None,
            dir: None,
            disp: None,
            data: None,
            mode: None,
            reg1: None,
            reg2: None,
            xn: None,
        }
    }

    fn missing(&self, what: &str) -> EmuError {
        EmuError::Decode(format!("{} has no {} field", self.kind, what))
    }

    pub fn size(&self) -> EmuResult<Size> {
        self.size.ok_or_else(|| self.missing("size"))
    }

    pub fn cond(&self) -> EmuResult<Condition> {
        self.cond.ok_or_else(|| self.missing("condition"))
    }

    pub fn ea1(&self) -> EmuResult<u16> {
        self.ea1.ok_or_else(|| self.missing("ea1"))
    }

    pub fn ea2(&self) -> EmuResult<u16> {
        self.ea2.ok_or_else(|| self.missing("ea2"))
    }

    pub fn dir(&self) -> EmuResult<u16> {
        self.dir.ok_or_else(|| self.missing("dir"))
    }

    pub fn disp(&self) -> EmuResult<i8> {
        self.disp.ok_or_else(|| self.missing("disp"))
    }

    pub fn data(&self) -> EmuResult<i8> {
        self.data.ok_or_else(|| self.missing("data"))
    }

    pub fn reg1(&self) -> EmuResult<RegisterId> {
        self.reg1.ok_or_else(|| self.missing("reg1"))
    }

    pub fn reg2(&self) -> EmuResult<RegisterId> {
        self.reg2.ok_or_else(|| self.missing("reg2"))
    }
}

/// One line of the table: a kind, its fields, and the precomputed match
/// mask/value pair.
#[derive(Debug, Clone)]
pub struct InstructionSpec {
    pub kind: Kind,
    pub fields: Vec<InstructionField>,
    pub opcode_mask: u16,
    pub masked_opcode: u16,
}

fn make_opcode_mask(fields: &[InstructionField]) -> u16 {
    let mut mask: u16 = 0;
    for field in fields {
        let size = field.num_bits();
        mask = mask.wrapping_shl(size);
        if let InstructionField::Bits(_) = field {
            mask |= ((1u32 << size) - 1) as u16;
        }
    }
    mask
}

fn make_masked_opcode(fields: &[InstructionField]) -> u16 {
    let mut value: u16 = 0;
    for field in fields {
        match field {
            InstructionField::Bits(pattern) => {
                for b in pattern.bytes() {
                    value = (value << 1) | (b - b'0') as u16;
                }
            }
            _ => value = value.wrapping_shl(field.num_bits()),
        }
    }
    value
}

impl InstructionSpec {
    pub fn new(kind: Kind, fields: Vec<InstructionField>) -> InstructionSpec {
        let opcode_mask = make_opcode_mask(&fields);
        let masked_opcode = make_masked_opcode(&fields);
        InstructionSpec { kind, fields, opcode_mask, masked_opcode }
    }

    pub fn num_bits(&self) -> u32 {
        self.fields.iter().map(|f| f.num_bits()).sum()
    }

    pub fn matches(&self, opcode: u16) -> bool {
        opcode & self.opcode_mask == self.masked_opcode
    }

    /// Rereads every non-literal field of a matched opcode by shift-and-mask.
    pub fn parse_fields(&self, opcode: u16) -> EmuResult<InstFields> {
        let mut out = InstFields::new(self.kind);
        let mut bit = 16;
        for field in &self.fields {
            bit -= field.num_bits();
            let value = (opcode >> bit) & (((1u32 << field.num_bits()) - 1) as u16);
            match field {
                InstructionField::Bits(_) => {}
                InstructionField::Size1 => out.size = Some(Size::decode2(value)?),
                InstructionField::Size2 => out.size = Some(Size::decode3(value)?),
                InstructionField::SizeMove => out.size = Some(Size::decode_move(value)?),
                InstructionField::Mode(_) => out.mode = Some(value),
                InstructionField::AddrReg1 => out.reg1 = Some(RegisterId::addr(value)?),
                InstructionField::AddrReg2 => out.reg2 = Some(RegisterId::addr(value)?),
                InstructionField::DataReg1 => out.reg1 = Some(RegisterId::data(value)?),
                InstructionField::DataReg2 => out.reg2 = Some(RegisterId::data(value)?),
                InstructionField::IndexReg => out.xn = Some(value),
                InstructionField::Dir => out.dir = Some(value),
                InstructionField::Ea1 => out.ea1 = Some(value),
                InstructionField::Ea2 => out.ea2 = Some((value >> 3) | ((value & 0x7) << 3)),
                InstructionField::Vector => out.data = Some(value as i8),
                InstructionField::Data8 => out.data = Some(value as u8 as i8),
                InstructionField::Data3 => {
                    out.data = Some(if value == 0 { 8 } else { value as i8 })
                }
                InstructionField::Cond => out.cond = Some(Condition::of_code(value)?),
                InstructionField::Disp => out.disp = Some(value as u8 as i8),
            }
        }
        Ok(out)
    }
}

impl fmt::Display for InstructionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.kind)?;
        for field in &self.fields {
            write!(f, " {}", field)?;
        }
        Ok(())
    }
}

/// Parses the textual table: one `NAME, FIELD FIELD ...` spec per line.
pub fn parse_table(content: &str) -> EmuResult<Vec<InstructionSpec>> {
    let mut specs = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, ',');
        let name = parts.next().map(str::trim);
        let field_list = parts.next().map(str::trim);
        let (name, field_list) = match (name, field_list) {
            (Some(n), Some(fl)) => (n, fl),
            _ => {
                return Err(EmuError::Table(format!(
                    "line {}: expected 'NAME, FIELD_LIST'",
                    lineno + 1
                )))
            }
        };
        let kind = Kind::of_str(name)?;
        let mut fields = Vec::new();
        for token in field_list.split_whitespace() {
            fields.push(InstructionField::parse_field(token)?);
        }
        let spec = InstructionSpec::new(kind, fields);
        if spec.num_bits() != 16 {
            return Err(EmuError::Table(format!(
                "line {}: fields sum to {} bits, want 16: {}",
                lineno + 1,
                spec.num_bits(),
                spec
            )));
        }
        specs.push(spec);
    }
    Ok(specs)
}

/// First-match-wins decoder over the parsed table.
pub struct OpcodeDecoder {
    specs: Vec<InstructionSpec>,
}

impl OpcodeDecoder {
    pub fn from_table(content: &str) -> EmuResult<OpcodeDecoder> {
        Ok(OpcodeDecoder { specs: parse_table(content)? })
    }

    pub fn builtin() -> EmuResult<OpcodeDecoder> {
        OpcodeDecoder::from_table(BUILTIN_TABLE)
    }

    pub fn specs(&self) -> &[InstructionSpec] {
        &self.specs
    }

    pub fn decode(&self, opcode: u16) -> EmuResult<InstFields> {
        for spec in &self.specs {
            if spec.matches(opcode) {
                return spec.parse_fields(opcode);
            }
        }
        Err(EmuError::Decode(format!("invalid opcode: {:04x}", opcode)))
    }

    /// Table self-check: exercises the whole 16-bit space and reports how
    /// many opcodes matched some line. A line no opcode reaches first is an
    /// error in the table.
    pub fn verify(&self) -> EmuResult<TableReport> {
        let mut matched = 0usize;
        let mut hits = vec![0usize; self.specs.len()];
        for opcode in 0..=0xffffu16 {
            if let Some(idx) = self.specs.iter().position(|s| s.matches(opcode)) {
                matched += 1;
                hits[idx] += 1;
            }
        }
        for (idx, count) in hits.iter().enumerate() {
            if *count == 0 {
                return Err(EmuError::Table(format!(
                    "no opcode reaches line {}: {}",
                    idx + 1,
                    self.specs[idx]
                )));
            }
        }
        Ok(TableReport { num_specs: self.specs.len(), matched, unmatched: 0x10000 - matched })
    }
}

pub struct TableReport {
    pub num_specs: usize,
    pub matched: usize,
    pub unmatched: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_parses_and_verifies() {
        let decoder = OpcodeDecoder::builtin().unwrap();
        let report = decoder.verify().unwrap();
        assert!(report.num_specs > 100);
        assert!(report.matched > 0);
    }

    #[test]
    fn masks_are_built_in_declaration_order() {
        let spec = InstructionSpec::new(
            Kind::TST,
            vec![
                InstructionField::Bits("01001010".to_string()),
                InstructionField::Size2,
                InstructionField::Ea1,
            ],
        );
        assert_eq!(spec.opcode_mask, 0xff00);
        assert_eq!(spec.masked_opcode, 0x4a00);
        assert!(spec.matches(0x4a41));
        assert!(!spec.matches(0x4b41));
    }

    #[test]
    fn move_destination_halves_are_swapped() {
        let decoder = OpcodeDecoder::builtin().unwrap();
        // MOVE.W D3,(A5) = 0011 101 010 000 011
        let fields = decoder.decode(0x3a83).unwrap();
        assert_eq!(fields.kind, Kind::MOVE);
        assert_eq!(fields.size.unwrap(), Size::Word);
        assert_eq!(fields.ea1.unwrap(), 0b000_011);
        assert_eq!(fields.ea2.unwrap(), 0b010_101);
    }

    #[test]
    fn data3_maps_zero_to_eight() {
        let decoder = OpcodeDecoder::builtin().unwrap();
        // ADDQ.W #8,D1 encodes the immediate 8 as 000
        let fields = decoder.decode(0x5041).unwrap();
        assert_eq!(fields.kind, Kind::ADDQ);
        assert_eq!(fields.data.unwrap(), 8);
    }
}
