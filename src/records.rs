//! The object program is a sequence of fixed-format text records:
//!
//! | Record | Layout |
//! | --- | --- |
//! | Header | `H` name(6) start(6) length(6) |
//! | Text | `T` start(6) byte-count(2) object-code(up to 60) |
//! | Modification | `M` start(6) half-byte-count(2) |
//! | End | `E` first-executable(6) |
//!
//! All numbers are upper case hexadecimal, zero padded.

use super::*;

use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Deref;
use std::path::Path;

/// Maximum number of object code bytes in one Text record
pub const TEXT_BYTES_MAX: usize = 30;

lazy_static! {
    static ref RE_HEADER: Regex = Regex::new(r"^H(.{6})([0-9A-F]{6})([0-9A-F]{6})$").unwrap();
    static ref RE_TEXT: Regex = Regex::new(r"^T([0-9A-F]{6})([0-9A-F]{2})((?:[0-9A-F]{2})*)$").unwrap();
    static ref RE_MODIFICATION: Regex = Regex::new(r"^M([0-9A-F]{6})([0-9A-F]{2})$").unwrap();
    static ref RE_END: Regex = Regex::new(r"^E([0-9A-F]{6})$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRecord {
    Header { name: String, start: u32, length: u32 },
    Text { start: u32, data: Vec<u8> },
    Modification { start: u32, half_bytes: u8 },
    End { first: u32 },
}
impl fmt::Display for ObjectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRecord::Header { name, start, length } => write!(f, "H{:<6.6}{:06X}{:06X}", name, start, length),
            ObjectRecord::Text { start, data } => {
                write!(f, "T{:06X}{:02X}", start, data.len())?;
                data.iter().try_for_each(|b| write!(f, "{:02X}", b))
            }
            ObjectRecord::Modification { start, half_bytes } => write!(f, "M{:06X}{:02X}", start, half_bytes),
            ObjectRecord::End { first } => write!(f, "E{:06X}", first),
        }
    }
}
impl ObjectRecord {
    pub fn from_str<S: AsRef<str>>(s: S) -> Result<Self, Error> {
        let s = s.as_ref().trim_end();
        let hex = |m: &str| u32::from_str_radix(m, 16).map_err(|e| general_err!(e));
        if let Some(c) = RE_HEADER.captures(s) {
            return Ok(ObjectRecord::Header {
                name: c[1].trim_end().to_string(),
                start: hex(&c[2])?,
                length: hex(&c[3])?,
            });
        }
        if let Some(c) = RE_TEXT.captures(s) {
            let count = hex(&c[2])? as usize;
            let code = &c[3];
            if count > TEXT_BYTES_MAX || code.len() != count * 2 {
                return Err(general_err!(format!("text record byte count mismatch: {}", s)));
            }
            let data = (0..code.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&code[i..i + 2], 16).map_err(|e| general_err!(e)))
                .collect::<Result<Vec<u8>, Error>>()?;
            return Ok(ObjectRecord::Text { start: hex(&c[1])?, data });
        }
        if let Some(c) = RE_MODIFICATION.captures(s) {
            return Ok(ObjectRecord::Modification {
                start: hex(&c[1])?,
                half_bytes: hex(&c[2])? as u8,
            });
        }
        if let Some(c) = RE_END.captures(s) {
            return Ok(ObjectRecord::End { first: hex(&c[1])? });
        }
        Err(general_err!(format!("unrecognized object record: {}", s)))
    }
}

/// Accumulates object code into Text records. A record is flushed when the next piece
/// of code would push it past TEXT_BYTES_MAX or when the code doesn't continue at the
/// address where the record currently ends (e.g. after RESB/RESW).
#[derive(Debug, Default)]
pub struct TextRecordBuilder {
    start: u32,
    data: Vec<u8>,
}
impl TextRecordBuilder {
    pub fn new() -> Self { TextRecordBuilder::default() }
    fn end(&self) -> u32 { self.start + self.data.len() as u32 }
    pub fn append(&mut self, location: u32, code: &[u8], program: &mut ObjectProgram) -> Result<(), Error> {
        if !self.data.is_empty() && (self.end() != location || self.data.len() + code.len() > TEXT_BYTES_MAX) {
            self.flush(program)?;
        }
        if self.data.is_empty() {
            self.start = location;
        }
        // code longer than a whole record (e.g. a long BYTE constant) spans several records
        for (i, &b) in code.iter().enumerate() {
            if self.data.len() == TEXT_BYTES_MAX {
                self.flush(program)?;
                self.start = location + i as u32;
            }
            self.data.push(b);
        }
        Ok(())
    }
    /// Write the pending record (if any)
    pub fn flush(&mut self, program: &mut ObjectProgram) -> Result<(), Error> {
        if self.data.is_empty() {
            return Ok(());
        }
        let data = std::mem::take(&mut self.data);
        program.add_record(ObjectRecord::Text { start: self.start, data })
    }
}

/// A complete object program: one Header, any number of Text/Modification records and one End.
#[derive(Debug, Default)]
pub struct ObjectProgram {
    records: Vec<ObjectRecord>,
    end: bool,
}
impl ObjectProgram {
    pub fn new() -> Self { ObjectProgram::default() }
    pub fn from_str_iter<I, T>(iter: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut op = ObjectProgram::new();
        for s in iter {
            let s: String = s.into();
            if s.trim().is_empty() {
                continue;
            }
            op.add_record(ObjectRecord::from_str(&s)?)?;
        }
        if op.end {
            Ok(op)
        } else {
            Err(general_err!("End record not found in object program"))
        }
    }
    pub fn add_record(&mut self, r: ObjectRecord) -> Result<(), Error> {
        if self.end {
            return Err(general_err!("records after End record in object program"));
        }
        let is_header = matches!(r, ObjectRecord::Header { .. });
        if self.records.is_empty() != is_header {
            return Err(general_err!("object program must begin with exactly one Header record"));
        }
        if let ObjectRecord::Text { data, .. } = &r {
            if data.is_empty() || data.len() > TEXT_BYTES_MAX {
                return Err(general_err!(format!("invalid text record length {}", data.len())));
            }
        }
        if let ObjectRecord::End { .. } = r {
            self.end = true
        }
        self.records.push(r);
        Ok(())
    }
    pub fn is_complete(&self) -> bool { self.end }
    /// (name, start, length) from the Header record
    pub fn header(&self) -> Option<(&str, u32, u32)> {
        match self.records.first() {
            Some(ObjectRecord::Header { name, start, length }) => Some((name.as_str(), *start, *length)),
            _ => None,
        }
    }
    pub fn text_records(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.records.iter().filter_map(|r| match r {
            ObjectRecord::Text { start, data } => Some((*start, data.as_slice())),
            _ => None,
        })
    }
    pub fn read_from_file(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| file_err!(path, e))?;
        let lines = BufReader::new(file).lines().collect::<Result<Vec<String>, io::Error>>()?;
        ObjectProgram::from_str_iter(lines)
    }
    pub fn write_to_file(&self, f: &mut dyn io::Write) -> Result<(), Error> {
        if !self.end {
            return Err(general_err!("cannot write object program without End record"));
        }
        for r in self.iter() {
            writeln!(f, "{}", r)?;
        }
        Ok(())
    }
}
impl Deref for ObjectProgram {
    type Target = Vec<ObjectRecord>;
    fn deref(&self) -> &Self::Target { &self.records }
}
