//! The instruction catalog maps each mnemonic to either a machine instruction
//! (format and opcode) or one of the seven assembler directives.
//!
//! Machine instructions come from an opcode definition made of one
//! `<hex-code> <mnemonic> <format>` triple per line, e.g. `18 ADD 3/4`.
//! The standard SIC/XE table is compiled into the binary from `opcode.txt`.
use super::*;

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

/// The standard SIC/XE opcode definition
pub const STANDARD_OPCODES: &str = include_str!("../opcode.txt");

lazy_static! {
    static ref RE_DEFINITION: Regex = Regex::new(r"^\s*([0-9A-Fa-f]{1,2})\s+([A-Z][A-Z0-9]*)\s+(1|2|3/4)\s*$").unwrap();
}

const DIRECTIVES: [(&str, InstructionKind); 7] = [
    ("START", InstructionKind::Start),
    ("END", InstructionKind::End),
    ("BYTE", InstructionKind::Byte),
    ("WORD", InstructionKind::Word),
    ("RESB", InstructionKind::Resb),
    ("RESW", InstructionKind::Resw),
    ("BASE", InstructionKind::Base),
];

/// SIC/XE instruction formats. Formats 3 and 4 share an opcode; format 4 is
/// selected per statement with a leading '+'.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Format {
    One,
    Two,
    ThreeFour,
}
impl Format {
    /// size in bytes of the non-extended form
    pub fn size(&self) -> u32 {
        match self {
            Format::One => 1,
            Format::Two => 2,
            Format::ThreeFour => 3,
        }
    }
    pub fn from_str(s: &str) -> Option<Format> {
        match s {
            "1" => Some(Format::One),
            "2" => Some(Format::Two),
            "3/4" => Some(Format::ThreeFour),
            _ => None,
        }
    }
}
impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Format::One => "1",
            Format::Two => "2",
            Format::ThreeFour => "3/4",
        };
        write!(f, "{:width$}", s, width = f.width().unwrap_or(0))
    }
}

/// What kind of operand an instruction expects.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperandShape {
    /// no operand at all (format 1, RSUB)
    None,
    /// a memory reference, optionally prefixed with '#' or '@' and suffixed with ",X"
    Memory,
    /// exactly one register (CLEAR, TIXR)
    Register,
    /// two registers separated by ','
    RegisterPair,
    /// a register and a shift count 1..=16 (SHIFTL, SHIFTR)
    RegisterCount,
    /// a single number 0..=15 (SVC)
    Number,
}
impl OperandShape {
    fn for_opcode(mnemonic: &str, format: Format) -> OperandShape {
        match (format, mnemonic) {
            (Format::One, _) => OperandShape::None,
            (Format::Two, "CLEAR" | "TIXR") => OperandShape::Register,
            (Format::Two, "SHIFTL" | "SHIFTR") => OperandShape::RegisterCount,
            (Format::Two, "SVC") => OperandShape::Number,
            (Format::Two, _) => OperandShape::RegisterPair,
            (Format::ThreeFour, "RSUB") => OperandShape::None,
            (Format::ThreeFour, _) => OperandShape::Memory,
        }
    }
}

/// Every kind of statement the passes know how to handle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InstructionKind {
    Start,
    End,
    Byte,
    Word,
    Resb,
    Resw,
    Base,
    Opcode { format: Format, opcode: u8, shape: OperandShape },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    /// the mnemonic, always upper case
    pub mnemonic: String,
    pub kind: InstructionKind,
}
impl Descriptor {
    pub fn is_directive(&self) -> bool { !matches!(self.kind, InstructionKind::Opcode { .. }) }
    pub fn format(&self) -> Option<Format> {
        match self.kind {
            InstructionKind::Opcode { format, .. } => Some(format),
            _ => None,
        }
    }
    // only format 3/4 instructions may carry the '+' prefix
    pub fn allows_extended(&self) -> bool { self.format() == Some(Format::ThreeFour) }
}
impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            InstructionKind::Opcode { format, opcode, .. } => {
                write!(f, "{:8} {:02X}  format {}", self.mnemonic, opcode, format)
            }
            _ => write!(f, "{:8} --  directive", self.mnemonic),
        }
    }
}

/// Read-only lookup table shared by both passes.
#[derive(Debug)]
pub struct Catalog {
    map: HashMap<String, Descriptor>,
}
impl Catalog {
    /// Catalog containing the standard SIC/XE instruction set
    pub fn standard() -> Catalog {
        Catalog::from_definition(STANDARD_OPCODES).expect("built-in opcode table should be valid")
    }
    pub fn from_file(path: &Path) -> Result<Catalog, Error> {
        Catalog::from_definition(&read_text(path)?)
    }
    /// Build a catalog from an opcode definition. Blank lines are ignored; any other
    /// line that isn't a valid `<hex-code> <mnemonic> <format>` triple is an error.
    pub fn from_definition(text: &str) -> Result<Catalog, Error> {
        let mut map = HashMap::new();
        for (name, kind) in DIRECTIVES {
            map.insert(name.to_string(), Descriptor { mnemonic: name.to_string(), kind });
        }
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let bad_line = |msg: &str| Error::new(ErrorKind::General, Some(i + 1), msg).with_text(line.trim());
            let c = RE_DEFINITION
                .captures(line)
                .ok_or_else(|| bad_line("malformed opcode definition"))?;
            let opcode = u8::from_str_radix(&c[1], 16).map_err(|_| bad_line("invalid opcode value"))?;
            let mnemonic = c[2].to_string();
            let format = Format::from_str(&c[3]).ok_or_else(|| bad_line("invalid instruction format"))?;
            if format == Format::ThreeFour && opcode & 0x03 != 0 {
                return Err(bad_line("format 3/4 opcode must be a multiple of 4"));
            }
            if map.contains_key(&mnemonic) {
                return Err(bad_line("duplicate mnemonic"));
            }
            let shape = OperandShape::for_opcode(&mnemonic, format);
            let kind = InstructionKind::Opcode { format, opcode, shape };
            map.insert(mnemonic.clone(), Descriptor { mnemonic, kind });
        }
        Ok(Catalog { map })
    }
    /// Exact, case-sensitive lookup. Callers strip any '+' prefix first.
    pub fn get(&self, mnemonic: &str) -> Option<&Descriptor> { self.map.get(mnemonic) }
    /// all machine instructions sorted by mnemonic
    pub fn opcodes(&self) -> Vec<&Descriptor> {
        let mut v: Vec<&Descriptor> = self.map.values().filter(|d| !d.is_directive()).collect();
        v.sort_by(|a, b| a.mnemonic.cmp(&b.mnemonic));
        v
    }
    pub fn write_table(&self, f: &mut dyn io::Write) -> Result<(), io::Error> {
        for desc in self.opcodes() {
            writeln!(f, "{}", desc)?;
        }
        Ok(())
    }
}

/// The fixed SIC/XE register numbering used by format 2 instructions
#[allow(non_snake_case)]
pub mod Register {
    pub const A: u8 = 0;
    pub const X: u8 = 1;
    pub const L: u8 = 2;
    pub const B: u8 = 3;
    pub const S: u8 = 4;
    pub const T: u8 = 5;
    pub const F: u8 = 6;
    pub const PC: u8 = 8;
    pub const SW: u8 = 9;
    // the given string must be uppercase
    pub fn number(name: &str) -> Option<u8> {
        match name {
            "A" => Some(A),
            "X" => Some(X),
            "L" => Some(L),
            "B" => Some(B),
            "S" => Some(S),
            "T" => Some(T),
            "F" => Some(F),
            "PC" => Some(PC),
            "SW" => Some(SW),
            _ => None,
        }
    }
}
