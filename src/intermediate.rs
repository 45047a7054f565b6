//! Pass 1 hands its statements to pass 2 through an intermediate (`.int`) file.
//! Every statement takes five lines:
//! ```text
//!  <line-number> <location> <encoded-length> <X|->
//!  <label>
//!  [+]<mnemonic>
//!  <operand>
//!  <source line>
//! ```
//! Empty label/operand lines mean the field is absent. The source line is carried so
//! that pass 2 diagnostics quote the statement as written.
use super::instructions::Catalog;
use super::*;

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

/// lines per statement
const RECORD_LINES: usize = 5;

lazy_static! {
    static ref RE_POSITION: Regex = Regex::new(r"^(\d+) ([0-9A-F]{5,}) (\d+) ([X-])$").unwrap();
}

pub fn write_intermediate(f: &mut dyn io::Write, statements: &[Statement]) -> Result<(), Error> {
    for s in statements {
        writeln!(
            f,
            "{} {:05X} {} {}",
            s.line_number,
            s.location,
            s.encoded_length,
            if s.is_indexed { 'X' } else { '-' }
        )?;
        writeln!(f, "{}", s.get_label())?;
        writeln!(f, "{}{}", if s.is_extended { "+" } else { "" }, s.get_mnemonic())?;
        writeln!(f, "{}", s.get_operand())?;
        writeln!(f, "{}", s.source)?;
    }
    Ok(())
}

pub fn read_intermediate<'s, I>(lines: I, catalog: &Catalog) -> Result<Vec<Statement>, Error>
where
    I: IntoIterator<Item = &'s str>,
{
    let lines: Vec<&str> = lines.into_iter().collect();
    if lines.len() % RECORD_LINES != 0 {
        return Err(general_err!("truncated intermediate file"));
    }
    let mut statements = Vec::with_capacity(lines.len() / RECORD_LINES);
    for (i, chunk) in lines.chunks(RECORD_LINES).enumerate() {
        let bad = |msg: &str| Error::new(ErrorKind::General, Some(i * RECORD_LINES + 1), msg);
        let c = RE_POSITION
            .captures(chunk[0])
            .ok_or_else(|| bad("malformed intermediate record"))?;
        let field = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        let (is_extended, mnemonic) = match chunk[2].strip_prefix('+') {
            Some(m) => (true, m),
            None => (false, chunk[2]),
        };
        let instruction = catalog
            .get(mnemonic)
            .cloned()
            .ok_or_else(|| bad(&format!("unknown instruction \"{}\" in intermediate file", mnemonic)))?;
        statements.push(Statement {
            line_number: c[1].parse().map_err(|_| bad("bad line number"))?,
            location: u32::from_str_radix(&c[2], 16).map_err(|_| bad("bad location"))?,
            encoded_length: c[3].parse().map_err(|_| bad("bad length"))?,
            is_indexed: &c[4] == "X",
            label: field(chunk[1]),
            mnemonic: Some(mnemonic.to_string()),
            instruction: Some(instruction),
            operand: field(chunk[3]),
            is_extended,
            source: chunk[4].to_string(),
            ..Default::default()
        });
    }
    Ok(statements)
}

pub fn write_to_path(path: &Path, statements: &[Statement]) -> Result<(), Error> {
    let mut file = create_file(path)?;
    write_intermediate(&mut file, statements)
}

pub fn read_from_path(path: &Path, catalog: &Catalog) -> Result<Vec<Statement>, Error> {
    let text = read_text(path)?;
    read_intermediate(text.lines(), catalog)
}
