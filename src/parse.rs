//! Statement and operand parsing.
//!
//! Grammar for a source line:
//! ```text
//!  line      = blank | comment | statement
//!  comment   = "." any*
//!  statement = [label] ["+"] mnemonic [operand]
//!  operand   = memory | registers | constant | number
//!  memory    = ["#" | "@"] target ["," "X"]
//!  constant  = "C'" chars "'" | "X'" hexdigits "'"
//! ```
//! The catalog decides whether the first field is a label or a mnemonic.
use super::instructions::{Catalog, Descriptor, Format};
use super::program::Statement;
use super::*;

use lazy_static::lazy_static;
use regex::Regex;

pub const LABEL_LEN_MAX: usize = 8;
pub const OPERAND_LEN_MAX: usize = 128;

lazy_static! {
    // first whitespace delimited field and (optionally) whatever follows it
    static ref RE_FIELD: Regex = Regex::new(r"^\s*(\S+)(?:\s+(.*?))?\s*$").unwrap();
    static ref RE_BYTE: Regex = Regex::new(r"^([CX])'(.*)'$").unwrap();
    static ref RE_INDEXED: Regex = Regex::new(r"^(.*?)\s*,\s*X$").unwrap();
    static ref RE_DECIMAL: Regex = Regex::new(r"^[+-]?[0-9]+$").unwrap();
    static ref RE_HEX: Regex = Regex::new(r"^[0-9A-Fa-f]+$").unwrap();
}

/// The addressing prefix of a format 3/4 operand.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddressingMode {
    Simple,
    Immediate,
    Indirect,
}
impl AddressingMode {
    /// the listing marker for this mode
    pub fn marker(&self) -> char {
        match self {
            AddressingMode::Simple => ' ',
            AddressingMode::Immediate => '#',
            AddressingMode::Indirect => '@',
        }
    }
    /// the (n, i) bits for this mode
    pub fn ni(&self) -> (bool, bool) {
        match self {
            AddressingMode::Simple => (true, true),
            AddressingMode::Immediate => (false, true),
            AddressingMode::Indirect => (true, false),
        }
    }
}

/// A parsed format 3/4 operand. The target is either a symbol or a decimal literal;
/// that distinction is made by pass 2 once the symbol table is complete.
#[derive(Debug, PartialEq, Eq)]
pub struct AddressOperand<'s> {
    pub mode: AddressingMode,
    pub target: &'s str,
    pub indexed: bool,
}

/// Split a leading '#' or '@' off an operand.
pub fn split_addressing_prefix(operand: &str) -> (AddressingMode, &str) {
    if let Some(rest) = operand.strip_prefix('#') {
        (AddressingMode::Immediate, rest)
    } else if let Some(rest) = operand.strip_prefix('@') {
        (AddressingMode::Indirect, rest)
    } else {
        (AddressingMode::Simple, operand)
    }
}

/// true if the operand carries the ",X" indexing suffix
pub fn is_indexed_operand(operand: &str) -> bool { RE_INDEXED.is_match(operand) }

pub fn parse_address_operand(operand: &str) -> Result<AddressOperand<'_>, String> {
    let (mode, rest) = split_addressing_prefix(operand.trim());
    let (target, indexed) = match RE_INDEXED.captures(rest) {
        Some(c) => (c.get(1).map_or("", |m| m.as_str()), true),
        None => (rest, false),
    };
    let target = target.trim();
    if target.is_empty() {
        return Err(format!("missing address in operand \"{}\"", operand));
    }
    if indexed && mode != AddressingMode::Simple {
        return Err("indexing can't be combined with immediate or indirect addressing".to_string());
    }
    Ok(AddressOperand { mode, target, indexed })
}

/// Decode a BYTE constant (`C'...'` or `X'...'`) into the bytes it represents.
pub fn parse_byte_constant(operand: &str) -> Result<Vec<u8>, String> {
    let c = RE_BYTE
        .captures(operand)
        .ok_or_else(|| format!("invalid BYTE constant {}; expected C'...' or X'...'", operand))?;
    let body = c.get(2).map_or("", |m| m.as_str());
    if body.is_empty() {
        return Err("empty BYTE constant".to_string());
    }
    if body.contains('\'') {
        return Err(format!("quote inside BYTE constant {}", operand));
    }
    if &c[1] == "C" {
        if !body.is_ascii() {
            return Err(format!("non-ASCII character in {}", operand));
        }
        return Ok(body.bytes().collect());
    }
    if !RE_HEX.is_match(body) {
        return Err(format!("invalid hexadecimal digit in {}", operand));
    }
    if body.len() % 2 != 0 {
        return Err(format!("odd number of hexadecimal digits in {}", operand));
    }
    (0..body.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&body[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

/// Signed decimal literal (e.g. WORD operands)
pub fn parse_decimal(s: &str) -> Option<i64> {
    if RE_DECIMAL.is_match(s.trim()) {
        s.trim().parse::<i64>().ok()
    } else {
        None
    }
}

/// Non-negative decimal count (e.g. RESB/RESW operands)
pub fn parse_count(s: &str) -> Option<u32> { parse_decimal(s).and_then(|n| u32::try_from(n).ok()) }

/// Hexadecimal address without prefix (e.g. START operands)
pub fn parse_hex_address(s: &str) -> Option<u32> {
    let s = s.trim();
    if RE_HEX.is_match(s) {
        u32::from_str_radix(s, 16).ok()
    } else {
        None
    }
}

/// Labels start with a letter and are at most LABEL_LEN_MAX characters long
pub fn is_valid_label(label: &str) -> bool {
    label.starts_with(|c: char| c.is_ascii_alphabetic()) && label.chars().count() <= LABEL_LEN_MAX
}

/// Split a register list on ','.
pub fn split_registers(operand: &str) -> Vec<&str> { operand.split(',').map(|s| s.trim()).collect() }

fn split_field(s: &str) -> (&str, Option<&str>) {
    match RE_FIELD.captures(s) {
        Some(c) => (
            c.get(1).map_or("", |m| m.as_str()),
            c.get(2).map(|m| m.as_str()).filter(|r| !r.is_empty()),
        ),
        None => ("", None),
    }
}

/// Turns source lines into Statements.
pub struct Parser<'a> {
    catalog: &'a Catalog,
}
impl<'a> Parser<'a> {
    pub fn new(catalog: &'a Catalog) -> Self { Parser { catalog } }

    fn lookup(&self, field: &str) -> Option<&'a Descriptor> {
        self.catalog.get(field.strip_prefix('+').unwrap_or(field))
    }

    /// Parse a single line (without its line terminator). Blank and comment lines come
    /// back flagged and otherwise empty. Problems found along the way are returned next
    /// to the statement so the caller can report them and carry on.
    pub fn parse_line(&self, src: &str, line_number: usize) -> (Statement, Vec<Error>) {
        let mut stmt = Statement::default();
        let mut errors = Vec::new();
        let source = src.trim_end();
        let src = source.trim_start();
        if src.is_empty() {
            stmt.is_empty = true;
            return (stmt, errors);
        }
        if src.starts_with('.') {
            stmt.is_comment = true;
            return (stmt, errors);
        }
        stmt.line_number = line_number;
        stmt.source = source.to_string();
        let (first, rest) = split_field(src);
        let (field, operand) = if self.lookup(first).is_some() {
            (Some(first), rest)
        } else {
            // not an instruction so it must be a label
            stmt.label = Some(first.to_string());
            match rest.map(split_field) {
                Some((second, rest)) => (Some(second), rest),
                None => (None, None),
            }
        };
        if let Some(field) = field {
            stmt.is_extended = field.starts_with('+');
            stmt.mnemonic = Some(field.strip_prefix('+').unwrap_or(field).to_string());
            stmt.instruction = self.lookup(field).cloned();
        }
        stmt.operand = operand.map(str::to_string);

        if let Some(label) = stmt.label.as_ref() {
            if !label.starts_with(|c: char| c.is_ascii_alphabetic()) {
                errors.push(stmt_err!(
                    stmt,
                    ErrorKind::InvalidLabel,
                    "symbol \"{}\" must start with a letter",
                    label
                ));
            }
            if label.chars().count() > LABEL_LEN_MAX {
                errors.push(stmt_err!(
                    stmt,
                    ErrorKind::InvalidLabel,
                    "symbol \"{}\" is longer than {} characters",
                    label,
                    LABEL_LEN_MAX
                ));
            }
        }
        match (stmt.instruction.as_ref(), stmt.mnemonic.as_ref()) {
            (Some(desc), _) => {
                if stmt.is_extended && !desc.allows_extended() {
                    errors.push(stmt_err!(
                        stmt,
                        ErrorKind::UnknownMnemonic,
                        "format 4 is not available for {}",
                        desc.mnemonic
                    ));
                }
                if desc.format() == Some(Format::ThreeFour) {
                    stmt.is_indexed = stmt.operand.as_deref().map_or(false, is_indexed_operand);
                }
            }
            (None, Some(m)) => errors.push(stmt_err!(stmt, ErrorKind::UnknownMnemonic, "unknown instruction \"{}\"", m)),
            (None, None) => errors.push(stmt_err!(stmt, ErrorKind::UnknownMnemonic, "no instruction")),
        }
        if stmt.operand.as_ref().map_or(false, |o| o.chars().count() > OPERAND_LEN_MAX) {
            errors.push(stmt_err!(
                stmt,
                ErrorKind::InvalidOperandSyntax,
                "operand is longer than {} characters",
                OPERAND_LEN_MAX
            ));
        }
        stmt.has_error = !errors.is_empty();
        (stmt, errors)
    }
}
