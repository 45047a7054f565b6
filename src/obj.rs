//! Pass 2 translates each statement into an ObjectCode: the exact bytes the statement
//! contributes to the program image.
//!
//! Format 3 and 4 layouts (bit 0 is the most significant):
//! ```text
//!  format 3:  opcode(6) n i x b p e  disp(12)
//!  format 4:  opcode(6) n i x b p e  address(20)
//! ```
use super::parse::AddressingMode;
use super::*;

pub const PC_DISP_MIN: i64 = -2048;
pub const PC_DISP_MAX: i64 = 2047;
pub const BASE_DISP_MAX: i64 = 4095;
pub const DISP_MASK: u32 = 0xfff;
pub const ADDR_MASK: u32 = 0xfffff;
pub const WORD_MASK: u32 = 0xffffff;

/// The object code produced by a single statement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectCode {
    pub bytes: Vec<u8>,
}
impl ObjectCode {
    pub fn new(bytes: Vec<u8>) -> Self { ObjectCode { bytes } }
}
impl fmt::Display for ObjectCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = String::with_capacity(self.bytes.len() * 2);
        self.bytes.iter().for_each(|b| s.push_str(&format!("{:02X}", b)));
        write!(f, "{:width$}", s, width = f.width().unwrap_or(0))
    }
}

/// How a format 3/4 target address ends up in the instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Relocation {
    /// the value is used as-is (a literal displacement or address)
    Absolute,
    /// disp = TA - PC
    PcRelative,
    /// disp = TA - BASE
    BaseRelative,
    /// format 4: 20-bit address
    Extended,
}

/// Pick the addressing strategy for a symbolic target address and return it along
/// with the value for the displacement/address field.
///
/// Order of preference: format 4 if requested, then pc-relative, then base-relative.
/// Base-relative is only considered once a BASE value is known.
pub fn select_relocation(
    target: u32, location: u32, base: Option<u32>, extended: bool,
) -> Result<(Relocation, u32), String> {
    if extended {
        if target > ADDR_MASK {
            return Err(format!("address {:X} doesn't fit in 20 bits", target));
        }
        return Ok((Relocation::Extended, target));
    }
    let disp = target as i64 - (location as i64 + 3);
    if (PC_DISP_MIN..=PC_DISP_MAX).contains(&disp) {
        return Ok((Relocation::PcRelative, disp as u32 & DISP_MASK));
    }
    if let Some(base) = base {
        let disp = target as i64 - base as i64;
        if (0..=BASE_DISP_MAX).contains(&disp) {
            return Ok((Relocation::BaseRelative, disp as u32));
        }
    }
    Err(format!(
        "address {:05X} is out of range for format 3{}; use format 4 (+)",
        target,
        if base.is_some() { "" } else { " and no BASE is set" }
    ))
}

/// Check a literal value used directly as a displacement (format 3) or address (format 4).
pub fn literal_field(value: i64, extended: bool) -> Result<(Relocation, u32), String> {
    let max = i64::from(if extended { ADDR_MASK } else { DISP_MASK });
    if (0..=max).contains(&value) {
        Ok((if extended { Relocation::Extended } else { Relocation::Absolute }, value as u32))
    } else {
        Err(format!(
            "value {} doesn't fit in the {}-bit field of format {}",
            value,
            if extended { 20 } else { 12 },
            if extended { 4 } else { 3 }
        ))
    }
}

pub fn encode_format1(opcode: u8) -> ObjectCode { ObjectCode::new(vec![opcode]) }

pub fn encode_format2(opcode: u8, r1: u8, r2: u8) -> ObjectCode {
    ObjectCode::new(vec![opcode, (r1 & 0x0f) << 4 | (r2 & 0x0f)])
}

/// Assemble a format 3 or 4 instruction. `field` holds the 12-bit displacement
/// or, for Relocation::Extended, the 20-bit address.
pub fn encode_format34(opcode: u8, mode: AddressingMode, indexed: bool, relocation: Relocation, field: u32) -> ObjectCode {
    let (n, i) = mode.ni();
    let (b, p, e) = match relocation {
        Relocation::Absolute => (false, false, false),
        Relocation::PcRelative => (false, true, false),
        Relocation::BaseRelative => (true, false, false),
        Relocation::Extended => (false, false, true),
    };
    let first = (opcode & 0xfc) | (n as u8) << 1 | i as u8;
    let flags = (indexed as u8) << 3 | (b as u8) << 2 | (p as u8) << 1 | e as u8;
    if e {
        let addr = field & ADDR_MASK;
        ObjectCode::new(vec![first, flags << 4 | (addr >> 16) as u8, (addr >> 8) as u8, addr as u8])
    } else {
        let disp = field & DISP_MASK;
        ObjectCode::new(vec![first, flags << 4 | (disp >> 8) as u8, disp as u8])
    }
}

/// WORD constants are 24 bits; larger values are masked.
pub fn encode_word(value: i64) -> ObjectCode {
    let v = (value as u32) & WORD_MASK;
    ObjectCode::new(vec![(v >> 16) as u8, (v >> 8) as u8, v as u8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt3(opcode: u8, mode: AddressingMode, x: bool, r: (Relocation, u32)) -> String {
        encode_format34(opcode, mode, x, r.0, r.1).to_string()
    }

    #[test]
    fn format1_and_2() {
        assert_eq!(encode_format1(0xc4).to_string(), "C4");
        // COMPR A,S
        assert_eq!(encode_format2(0xa0, 0, 4).to_string(), "A004");
        // CLEAR X
        assert_eq!(encode_format2(0xb4, 1, 0).to_string(), "B410");
    }
    #[test]
    fn pc_relative_boundaries() {
        // location 0 so PC is 3
        assert_eq!(select_relocation(3 + 2047, 0, None, false), Ok((Relocation::PcRelative, 0x7ff)));
        assert!(select_relocation(3 + 2048, 0, None, false).is_err());
        assert_eq!(select_relocation(5000, 5000 + 2048 - 3, None, false), Ok((Relocation::PcRelative, 0x800)));
        assert!(select_relocation(5000, 5000 + 2049 - 3, None, false).is_err());
    }
    #[test]
    fn base_relative_boundaries() {
        // pc-relative can't reach, base can
        assert_eq!(select_relocation(0x1000 + 4095, 0, Some(0x1000), false), Ok((Relocation::BaseRelative, 0xfff)));
        assert!(select_relocation(0x1000 + 4096, 0, Some(0x1000), false).is_err());
        // target below base is not reachable base-relative
        assert!(select_relocation(0x0fff, 0x4000, Some(0x1000), false).is_err());
    }
    #[test]
    fn selection_order() {
        // both pc- and base-relative fit: pc wins
        assert_eq!(select_relocation(0x30, 0, Some(0x30), false), Ok((Relocation::PcRelative, 0x2d)));
        // extended always wins when requested
        assert_eq!(select_relocation(0x30, 0, Some(0x30), true), Ok((Relocation::Extended, 0x30)));
        assert!(select_relocation(0x100000, 0, None, true).is_err());
    }
    #[test]
    fn format3_encodings() {
        // LDA ALPHA with ALPHA three bytes ahead of PC: 032000 style
        assert_eq!(fmt3(0x00, AddressingMode::Simple, false, (Relocation::PcRelative, 0)), "032000");
        // STL RETADR, pc-relative disp 0x02D
        assert_eq!(fmt3(0x14, AddressingMode::Simple, false, (Relocation::PcRelative, 0x2d)), "17202D");
        // J @RETADR
        assert_eq!(fmt3(0x3c, AddressingMode::Indirect, false, (Relocation::PcRelative, 0x3)), "3E2003");
        // STCH BUFFER,X with base-relative disp 0
        assert_eq!(fmt3(0x54, AddressingMode::Simple, true, (Relocation::BaseRelative, 0)), "57C000");
        // COMP #0
        assert_eq!(fmt3(0x28, AddressingMode::Immediate, false, (Relocation::Absolute, 0)), "290000");
        // negative pc-relative displacement: J CLOOP, disp -20
        let (r, d) = select_relocation(0x06, 0x17, None, false).unwrap();
        assert_eq!(fmt3(0x3c, AddressingMode::Simple, false, (r, d)), "3F2FEC");
        // RSUB
        assert_eq!(fmt3(0x4c, AddressingMode::Simple, false, (Relocation::Absolute, 0)), "4F0000");
    }
    #[test]
    fn format4_encodings() {
        // +JSUB RDREC at 0x1036
        assert_eq!(fmt3(0x48, AddressingMode::Simple, false, (Relocation::Extended, 0x1036)), "4B101036");
        // +LDT #4096
        assert_eq!(fmt3(0x74, AddressingMode::Immediate, false, (Relocation::Extended, 4096)), "75101000");
    }
    #[test]
    fn literals() {
        assert_eq!(literal_field(4095, false), Ok((Relocation::Absolute, 4095)));
        assert!(literal_field(4096, false).is_err());
        assert!(literal_field(-1, false).is_err());
        assert_eq!(literal_field(4096, true), Ok((Relocation::Extended, 4096)));
    }
    #[test]
    fn words() {
        assert_eq!(encode_word(5).to_string(), "000005");
        assert_eq!(encode_word(4096).to_string(), "001000");
        assert_eq!(encode_word(-1).to_string(), "FFFFFF");
        assert_eq!(encode_word(0x1234567).to_string(), "234567");
    }
}
