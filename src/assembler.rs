//! Assembling a SIC/XE program takes two passes over the source:
//!
//!  1. Assign a location to every statement, build the symbol table and work out
//!     how many bytes each statement occupies.
//!  2. With every symbol known, encode each statement and collect the object code
//!     into Text records.
//!
//! A problem with one statement doesn't stop a pass. It is recorded in the session's
//! diagnostics and the statement is flagged. If pass 1 reports anything then pass 2
//! is skipped.
//!
//! When assembling from a file, pass 1 writes its statements to an intermediate file
//! which pass 2 reads back (see intermediate.rs).
use super::instructions::{Catalog, Format, InstructionKind, OperandShape, Register};
use super::intermediate;
use super::obj::*;
use super::parse::*;
use super::records::{ObjectProgram, ObjectRecord, TextRecordBuilder};
use super::*;

use std::fs;
use std::path::Path;

/// Size of the SIC/XE address space
pub const MEMORY_SIZE: u32 = 0x100000;
/// Listing line numbers go up in steps of this much
pub const LINE_STEP: usize = 5;

/// The container for our assembler methods.
pub struct Assembler {
    catalog: Catalog,
    modification_records: bool, // emit M records for format 4 instructions with symbolic addresses
}
impl Assembler {
    pub fn new(catalog: Catalog) -> Assembler {
        Assembler {
            catalog,
            modification_records: false,
        }
    }
    pub fn with_modification_records(mut self, enable: bool) -> Assembler {
        self.modification_records = enable;
        self
    }
    pub fn catalog(&self) -> &Catalog { &self.catalog }

    /// Assemble source text without touching the file system.
    #[allow(dead_code)]
    pub fn assemble_source(&self, src: &str) -> Program {
        let mut session = AssemblerSession::new(&self.catalog);
        let statements = self.pass1(&mut session, src.lines());
        if session.failed() {
            return session.into_program(statements, ObjectProgram::new());
        }
        let (statements, object) = self.pass2(&mut session, statements);
        session.into_program(statements, object)
    }

    /// Assemble the source file at `path`. The listing (.lst) and object (.obj) files are
    /// written next to the source, or into `out_dir` if given, and only if the assembly
    /// succeeds. Per-statement problems come back in the Program; only file errors are
    /// returned as Err, in which case no output files are left behind.
    pub fn assemble_from_file(&self, path: &Path, out_dir: Option<&Path>, keep_intermediate: bool) -> Result<Program, Error> {
        let src = read_text(path)?;
        let paths = OutputPaths::for_source(path, out_dir)?;
        let mut session = AssemblerSession::new(&self.catalog);
        let statements = self.pass1(&mut session, src.lines());
        if session.failed() {
            paths.remove_all();
            return Ok(session.into_program(statements, ObjectProgram::new()));
        }
        match self.finish_from_file(session, statements, &paths) {
            Ok(program) => {
                if !program.succeeded() {
                    paths.remove_all();
                } else if !keep_intermediate {
                    _ = fs::remove_file(&paths.intermediate);
                }
                Ok(program)
            }
            Err(e) => {
                paths.remove_all();
                Err(e)
            }
        }
    }
    fn finish_from_file(
        &self, mut session: AssemblerSession, statements: Vec<Statement>, paths: &OutputPaths,
    ) -> Result<Program, Error> {
        intermediate::write_to_path(&paths.intermediate, &statements)?;
        verbose_println!("wrote intermediate file: {}", paths.intermediate.display());
        let statements = intermediate::read_from_path(&paths.intermediate, &self.catalog)?;
        let (statements, object) = self.pass2(&mut session, statements);
        let program = session.into_program(statements, object);
        if program.succeeded() {
            program.write_output_files(paths)?;
        }
        Ok(program)
    }

    /// Pass 1: assign locations, define symbols and size every statement.
    /// Blank and comment lines are dropped.
    pub fn pass1<'s, I>(&self, session: &mut AssemblerSession, lines: I) -> Vec<Statement>
    where
        I: IntoIterator<Item = &'s str>,
    {
        session.reset();
        session.state = SessionState::Pass1;
        verbose_println!("pass 1...");
        let parser = Parser::new(session.catalog);
        let mut statements: Vec<Statement> = Vec::new();
        let mut line_number = 0;
        let mut end_seen = false;
        for src in lines {
            let (mut stmt, errors) = parser.parse_line(src, line_number + LINE_STEP);
            if stmt.is_empty || stmt.is_comment {
                continue;
            }
            line_number += LINE_STEP;
            stmt.location = session.locctr;
            if end_seen {
                session.flag(&mut stmt, ErrorKind::TrailingAfterEnd, "statement after END");
                statements.push(stmt);
                continue;
            }
            errors.into_iter().for_each(|e| session.report(e));
            let kind = stmt.instruction.as_ref().map(|d| d.kind);
            if kind == Some(InstructionKind::Start) {
                if statements.is_empty() {
                    self.start(session, &mut stmt);
                } else {
                    session.flag(&mut stmt, ErrorKind::MisplacedStart, "START must be the first statement");
                }
            }
            if let Some(label) = stmt.label.clone().filter(|l| is_valid_label(l)) {
                if let Err(e) = session.symbols.insert(&label, stmt.location) {
                    session.flag(&mut stmt, e.kind, &e.msg);
                }
            }
            stmt.encoded_length = self.statement_length(session, &mut stmt);
            match session.locctr.checked_add(stmt.encoded_length).filter(|&l| l <= MEMORY_SIZE) {
                Some(next) => session.locctr = next,
                None => {
                    session.flag(
                        &mut stmt,
                        ErrorKind::InvalidAddressValue,
                        "program doesn't fit in the SIC/XE address space",
                    );
                    session.locctr = MEMORY_SIZE;
                }
            }
            if kind == Some(InstructionKind::End) {
                end_seen = true;
            }
            statements.push(stmt);
        }
        if !end_seen {
            session.report(Error::new(ErrorKind::MissingEnd, None, "no END statement found"));
        }
        session.program_length = session.locctr - session.start_address;
        verbose_println!(
            "pass 1 complete: {} statements, {} symbols, length {:06X}",
            statements.len(),
            session.symbols.len(),
            session.program_length
        );
        statements
    }
    fn start(&self, session: &mut AssemblerSession, stmt: &mut Statement) {
        session.program_name = stmt.get_label().to_string();
        let operand = stmt.operand.clone();
        match operand.as_deref().map(|o| (o, parse_hex_address(o))) {
            Some((_, Some(addr))) if addr < MEMORY_SIZE => {
                session.locctr = addr;
                session.start_address = addr;
                stmt.location = addr;
            }
            Some((o, _)) => {
                let msg = format!("invalid start address \"{}\"; expected hex 0 to FFFFF", o);
                session.flag(stmt, ErrorKind::InvalidAddressValue, &msg);
            }
            None => session.flag(stmt, ErrorKind::InvalidAddressValue, "START requires a start address"),
        }
    }
    /// Best-effort size of a statement. Problems are reported and sized as 0.
    fn statement_length(&self, session: &mut AssemblerSession, stmt: &mut Statement) -> u32 {
        let kind = match stmt.instruction.as_ref() {
            Some(desc) => desc.kind,
            None => return 0,
        };
        match kind {
            InstructionKind::Start | InstructionKind::End | InstructionKind::Base => 0,
            InstructionKind::Word => 3,
            InstructionKind::Opcode { format, .. } => {
                if stmt.is_extended && format == Format::ThreeFour {
                    4
                } else {
                    format.size()
                }
            }
            InstructionKind::Byte => match stmt.operand.as_deref().map(parse_byte_constant) {
                Some(Ok(bytes)) => bytes.len() as u32,
                Some(Err(msg)) => {
                    session.flag(stmt, ErrorKind::InvalidOperandSyntax, &msg);
                    0
                }
                None => {
                    session.flag(stmt, ErrorKind::InvalidOperandSyntax, "BYTE requires a constant");
                    0
                }
            },
            InstructionKind::Resb | InstructionKind::Resw => {
                let unit = if kind == InstructionKind::Resb { 1 } else { 3 };
                match stmt.operand.as_deref().and_then(parse_count) {
                    // an oversized count overflows the address space check instead
                    Some(n) => n.saturating_mul(unit),
                    None => {
                        let msg = format!("{} requires a non-negative decimal count", stmt.get_mnemonic());
                        session.flag(stmt, ErrorKind::InvalidOperandSyntax, &msg);
                        0
                    }
                }
            }
        }
    }

    /// Pass 2: encode every statement and build the object program.
    pub fn pass2(&self, session: &mut AssemblerSession, mut statements: Vec<Statement>) -> (Vec<Statement>, ObjectProgram) {
        session.state = SessionState::Pass2;
        session.base_value = None;
        session.first_executable = session.start_address;
        verbose_println!("pass 2...");
        let mut object = ObjectProgram::new();
        let mut text = TextRecordBuilder::new();
        let mut modifications = Vec::new();
        let header = ObjectRecord::Header {
            name: session.program_name.clone(),
            start: session.start_address,
            length: session.program_length,
        };
        if let Err(e) = object.add_record(header) {
            session.report(e);
        }
        for stmt in statements.iter_mut() {
            session.locctr = stmt.location;
            let kind = match stmt.instruction.as_ref() {
                Some(desc) => desc.kind,
                None => continue,
            };
            match self.encode(session, stmt, kind) {
                Ok(Some(code)) => {
                    if self.needs_modification(session, stmt) {
                        modifications.push(ObjectRecord::Modification {
                            start: stmt.location + 1,
                            half_bytes: 5,
                        });
                    }
                    if let Err(e) = text.append(stmt.location, &code.bytes, &mut object) {
                        session.report(e);
                    }
                    stmt.obj = Some(code);
                }
                Ok(None) => {}
                Err(e) => {
                    stmt.has_error = true;
                    session.report(e);
                }
            }
            session.locctr = stmt.location + stmt.encoded_length;
            if kind == InstructionKind::End {
                self.end(session, stmt);
                break;
            }
        }
        if let Err(e) = close_object(&mut object, &mut text, modifications, session.first_executable) {
            session.report(e);
        }
        session.state = SessionState::Done;
        verbose_println!("pass 2 complete: {} records", object.len());
        (statements, object)
    }
    /// Object code for one statement, or None for statements that produce no code
    fn encode(&self, session: &mut AssemblerSession, stmt: &Statement, kind: InstructionKind) -> Result<Option<ObjectCode>, Error> {
        match kind {
            InstructionKind::Start | InstructionKind::End | InstructionKind::Resb | InstructionKind::Resw => Ok(None),
            InstructionKind::Base => {
                session.base_value = Some(self.base_address(session, stmt)?);
                Ok(None)
            }
            InstructionKind::Byte => parse_byte_constant(required_operand(stmt)?)
                .map(|bytes| Some(ObjectCode::new(bytes)))
                .map_err(|msg| stmt_err!(stmt, ErrorKind::InvalidOperandSyntax, "{}", msg)),
            InstructionKind::Word => {
                let operand = required_operand(stmt)?;
                parse_decimal(operand).map(|v| Some(encode_word(v))).ok_or_else(|| {
                    stmt_err!(
                        stmt,
                        ErrorKind::InvalidOperandSyntax,
                        "WORD requires a decimal value, not \"{}\"",
                        operand
                    )
                })
            }
            InstructionKind::Opcode { format, opcode, shape } => {
                check_operand_presence(stmt, shape)?;
                let code = match format {
                    Format::One => encode_format1(opcode),
                    Format::Two => encode_registers(stmt, opcode, shape)?,
                    Format::ThreeFour => self.encode_memory(session, stmt, opcode, shape)?,
                };
                Ok(Some(code))
            }
        }
    }
    fn encode_memory(
        &self, session: &AssemblerSession, stmt: &Statement, opcode: u8, shape: OperandShape,
    ) -> Result<ObjectCode, Error> {
        if shape == OperandShape::None {
            let relocation = if stmt.is_extended { Relocation::Extended } else { Relocation::Absolute };
            return Ok(encode_format34(opcode, AddressingMode::Simple, false, relocation, 0));
        }
        let operand = parse_address_operand(required_operand(stmt)?)
            .map_err(|msg| stmt_err!(stmt, ErrorKind::InvalidOperandSyntax, "{}", msg))?;
        let (relocation, field) = if let Some(target) = session.symbols.get(operand.target) {
            select_relocation(target, stmt.location, session.base_value, stmt.is_extended)
        } else if let Some(value) = parse_decimal(operand.target) {
            literal_field(value, stmt.is_extended)
        } else if is_valid_label(operand.target) {
            return Err(stmt_err!(
                stmt,
                ErrorKind::UndefinedSymbol,
                "undefined symbol \"{}\"",
                operand.target
            ));
        } else {
            return Err(stmt_err!(
                stmt,
                ErrorKind::InvalidOperandSyntax,
                "invalid address \"{}\"; expected a symbol or a decimal value",
                operand.target
            ));
        }
        .map_err(|msg| stmt_err!(stmt, ErrorKind::DisplacementOutOfRange, "{}", msg))?;
        Ok(encode_format34(opcode, operand.mode, operand.indexed, relocation, field))
    }
    // format 4 addresses taken from a symbol move with the program
    fn needs_modification(&self, session: &AssemblerSession, stmt: &Statement) -> bool {
        self.modification_records
            && stmt.is_extended
            && stmt
                .operand
                .as_deref()
                .and_then(|o| parse_address_operand(o).ok())
                .map_or(false, |op| session.symbols.get(op.target).is_some())
    }
    fn base_address(&self, session: &AssemblerSession, stmt: &Statement) -> Result<u32, Error> {
        let operand = required_operand(stmt)?;
        if let Some(addr) = session.symbols.get(operand) {
            return Ok(addr);
        }
        match parse_decimal(operand) {
            Some(v) if (0..i64::from(MEMORY_SIZE)).contains(&v) => Ok(v as u32),
            Some(v) => Err(stmt_err!(
                stmt,
                ErrorKind::InvalidAddressValue,
                "base address {} is outside the address space",
                v
            )),
            None if is_valid_label(operand) => Err(stmt_err!(
                stmt,
                ErrorKind::UndefinedSymbol,
                "undefined symbol \"{}\"",
                operand
            )),
            None => Err(stmt_err!(
                stmt,
                ErrorKind::InvalidAddressValue,
                "invalid BASE operand \"{}\"",
                operand
            )),
        }
    }
    fn end(&self, session: &mut AssemblerSession, stmt: &Statement) {
        if let Some(operand) = stmt.operand.as_deref() {
            match session.symbols.get(operand) {
                Some(addr) => session.first_executable = addr,
                None => {
                    let msg = format!(
                        "END operand \"{}\" is not a defined symbol; execution starts at {:06X}",
                        operand, session.start_address
                    );
                    session.warn(stmt, &msg);
                }
            }
        }
    }
}

fn required_operand(stmt: &Statement) -> Result<&str, Error> {
    stmt.operand.as_deref().ok_or_else(|| {
        stmt_err!(
            stmt,
            ErrorKind::InvalidOperandSyntax,
            "{} requires an operand",
            stmt.get_mnemonic()
        )
    })
}

fn check_operand_presence(stmt: &Statement, shape: OperandShape) -> Result<(), Error> {
    match (shape, stmt.operand.is_some()) {
        (OperandShape::None, true) => Err(stmt_err!(
            stmt,
            ErrorKind::InvalidOperandSyntax,
            "{} doesn't take an operand",
            stmt.get_mnemonic()
        )),
        (OperandShape::None, false) => Ok(()),
        (_, false) => required_operand(stmt).map(|_| ()),
        (_, true) => Ok(()),
    }
}

fn register_number(stmt: &Statement, name: &str) -> Result<u8, Error> {
    Register::number(name).ok_or_else(|| stmt_err!(stmt, ErrorKind::InvalidRegisterName, "unknown register \"{}\"", name))
}

fn encode_registers(stmt: &Statement, opcode: u8, shape: OperandShape) -> Result<ObjectCode, Error> {
    let fields = split_registers(required_operand(stmt)?);
    let (r1, r2) = match (shape, fields.as_slice()) {
        (OperandShape::Register, &[r]) => (register_number(stmt, r)?, 0),
        // the second register defaults to 0 (A)
        (OperandShape::RegisterPair, &[r]) => (register_number(stmt, r)?, 0),
        (OperandShape::RegisterPair, &[r1, r2]) => (register_number(stmt, r1)?, register_number(stmt, r2)?),
        (OperandShape::RegisterCount, &[r, n]) => match parse_count(n) {
            Some(count @ 1..=16) => (register_number(stmt, r)?, (count - 1) as u8),
            _ => {
                return Err(stmt_err!(
                    stmt,
                    ErrorKind::InvalidOperandSyntax,
                    "shift count must be 1 to 16, not \"{}\"",
                    n
                ))
            }
        },
        (OperandShape::Number, &[n]) => match parse_count(n) {
            Some(n @ 0..=15) => (n as u8, 0),
            _ => {
                return Err(stmt_err!(
                    stmt,
                    ErrorKind::InvalidOperandSyntax,
                    "{} requires a number 0 to 15, not \"{}\"",
                    stmt.get_mnemonic(),
                    n
                ))
            }
        },
        _ => {
            return Err(stmt_err!(
                stmt,
                ErrorKind::InvalidOperandSyntax,
                "wrong number of operands for {}",
                stmt.get_mnemonic()
            ))
        }
    };
    Ok(encode_format2(opcode, r1, r2))
}

// flush the last Text record, then the Modification records and the End record
fn close_object(
    object: &mut ObjectProgram, text: &mut TextRecordBuilder, modifications: Vec<ObjectRecord>, first: u32,
) -> Result<(), Error> {
    text.flush(object)?;
    for m in modifications {
        object.add_record(m)?;
    }
    object.add_record(ObjectRecord::End { first })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COPY: &str = include_str!("../test/copy.asm");

    fn assemble(src: &str) -> Program { Assembler::new(Catalog::standard()).assemble_source(src) }
    fn records(p: &Program) -> Vec<String> { p.object.iter().map(|r| r.to_string()).collect() }
    fn kinds(p: &Program) -> Vec<ErrorKind> { p.diagnostics.iter().map(|e| e.kind).collect() }
    fn code_of(p: &Program, line: usize) -> String {
        p.statements
            .iter()
            .find(|s| s.line_number == line)
            .and_then(|s| s.obj.as_ref())
            .map(|o| o.to_string())
            .unwrap_or_default()
    }

    #[test]
    fn word_after_lda() {
        let p = assemble("COPY    START   0\nFIRST   LDA     ALPHA\nALPHA   WORD    5\n        END     FIRST\n");
        assert!(p.succeeded(), "{:?}", p.diagnostics);
        assert_eq!(p.symbols.get("ALPHA"), Some(3));
        assert_eq!(code_of(&p, 15), "000005");
        assert_eq!(records(&p), vec!["HCOPY  000000000006", "T00000006032000000005", "E000000"]);
    }
    #[test]
    fn duplicate_label() {
        let p = assemble(" START 0\nX WORD 1\nY WORD 3\nX WORD 2\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::DuplicateSymbol]);
        assert_eq!(p.symbols.get("X"), Some(0));
        // the duplicate is still sized
        assert_eq!(p.length, 9);
        assert!(!p.succeeded());
        assert!(p.object.is_empty());
    }
    #[test]
    fn undefined_symbol() {
        let p = assemble("PROG START 0\n LDA NOWHERE\n END PROG\n");
        assert_eq!(kinds(&p), vec![ErrorKind::UndefinedSymbol]);
        assert!(!p.succeeded());
        assert!(p.statements[1].has_error);
    }
    #[test]
    fn byte_constants() {
        let p = assemble("P START 0\nA BYTE C'EOF'\nB BYTE X'1C'\n END\n");
        assert!(p.succeeded());
        assert_eq!(code_of(&p, 10), "454F46");
        assert_eq!(code_of(&p, 15), "1C");
        assert_eq!(p.length, 4);
        let p = assemble("P START 0\nA BYTE X'1'\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::InvalidOperandSyntax]);
    }
    #[test]
    fn copy_program() {
        let asm = Assembler::new(Catalog::standard()).with_modification_records(true);
        let p = asm.assemble_source(COPY);
        assert!(p.succeeded(), "{:?}", p.diagnostics);
        assert!(p.warnings.is_empty());
        assert_eq!(
            records(&p),
            vec![
                "HCOPY  000000001077",
                "T0000001D17202D69202D4B1010360320262900003320074B10105D3F2FEC032010",
                "T00001D130F20160100030F200D4B10105D3E2003454F46",
                "T0010361DB410B400B44075101000E32019332FFADB2013A00433200857C003B850",
                "T0010531D3B2FEA1340004F0000F1B410774000E32011332FFA53C003DF2008B850",
                "T001070073B2FEF4F000005",
                "M00000705",
                "M00001405",
                "M00002705",
                "E000000",
            ]
        );
        assert_eq!(p.symbols.get("RDREC"), Some(0x1036));
        assert_eq!(p.symbols.get("OUTPUT"), Some(0x1076));
        // no modification records unless asked for
        let p = assemble(COPY);
        assert!(!records(&p).iter().any(|r| r.starts_with('M')));
    }
    #[test]
    fn structural_properties() {
        let p = assemble(COPY);
        // lengths add up to the header length
        let total: u32 = p.statements.iter().map(|s| s.encoded_length).sum();
        assert_eq!(total, p.length);
        let mut last = 0;
        for s in &p.statements {
            assert!(s.location >= last);
            last = s.location;
            if let Some(label) = s.label.as_deref() {
                assert_eq!(p.symbols.get(label), Some(s.location));
            }
            assert_eq!(s.obj.as_ref().map_or(0, |o| o.bytes.len() as u32), match s.instruction.as_ref().map(|d| d.kind) {
                Some(InstructionKind::Resb) | Some(InstructionKind::Resw) => 0,
                _ => s.encoded_length,
            });
        }
        for (_, data) in p.object.text_records() {
            assert!(data.len() <= 30);
        }
    }
    #[test]
    fn start_address_and_program_name() {
        let p = assemble("SAMPLE START 1000\nFIRST LDA ALPHA\nALPHA RESW 2\n END FIRST\n");
        assert!(p.succeeded());
        assert_eq!(p.name, "SAMPLE");
        assert_eq!(p.symbols.get("SAMPLE"), Some(0x1000));
        assert_eq!(p.symbols.get("ALPHA"), Some(0x1003));
        assert_eq!(p.length, 9);
        assert_eq!(records(&p), vec!["HSAMPLE001000000009", "T00100003032000", "E001000"]);
    }
    #[test]
    fn no_start() {
        let p = assemble(" LDA #5\n END\n");
        assert!(p.succeeded());
        assert_eq!(records(&p), vec!["H      000000000003", "T00000003010005", "E000000"]);
    }
    #[test]
    fn bad_start() {
        let p = assemble("P START 100000\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::InvalidAddressValue]);
        let p = assemble("P START XYZ\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::InvalidAddressValue]);
        let p = assemble(" LDA #5\nP START 0\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::MisplacedStart]);
    }
    #[test]
    fn end_handling() {
        let p = assemble("P START 0\n RSUB\n");
        assert_eq!(kinds(&p), vec![ErrorKind::MissingEnd]);
        let p = assemble("P START 0\n RSUB\n END\n RSUB\n. comment\n\nX WORD 1\n");
        assert_eq!(kinds(&p), vec![ErrorKind::TrailingAfterEnd, ErrorKind::TrailingAfterEnd]);
        // trailing statements don't define symbols
        assert_eq!(p.symbols.get("X"), None);
        let p = assemble("P START 100\n RSUB\n END NOSUCH\n");
        assert!(p.succeeded());
        assert_eq!(p.warnings.len(), 1);
        assert_eq!(p.first_executable, 0x100);
    }
    #[test]
    fn line_numbers_skip_comments() {
        let p = assemble(". header\nP START 0\n\n  . indented comment\n RSUB\n END\n");
        let lines: Vec<usize> = p.statements.iter().map(|s| s.line_number).collect();
        assert_eq!(lines, vec![5, 10, 15]);
    }
    #[test]
    fn pc_relative_boundaries() {
        // forward: target at PC + 2047 fits, PC + 2048 doesn't
        let p = assemble("P START 0\n J T\n RESB 2047\nT RSUB\n END\n");
        assert!(p.succeeded());
        assert_eq!(code_of(&p, 10), "3F27FF");
        let p = assemble("P START 0\n J T\n RESB 2048\nT RSUB\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::DisplacementOutOfRange]);
        // backward: PC - 2048 fits, PC - 2049 doesn't
        let p = assemble("P START 0\nT RESB 2045\n J T\n END\n");
        assert!(p.succeeded());
        assert_eq!(code_of(&p, 15), "3F2800");
        let p = assemble("P START 0\nT RESB 2046\n J T\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::DisplacementOutOfRange]);
    }
    #[test]
    fn base_relative_boundaries() {
        let src = |gap: u32| format!("P START 0\n +LDB #B\n BASE B\n LDA T\n RESB 3000\nB RESB {}\nT RSUB\n END\n", gap);
        let p = assemble(&src(4095));
        assert!(p.succeeded(), "{:?}", p.diagnostics);
        assert_eq!(code_of(&p, 20), "034FFF");
        let p = assemble(&src(4096));
        assert_eq!(kinds(&p), vec![ErrorKind::DisplacementOutOfRange]);
        // without BASE base-relative addressing isn't attempted
        let p = assemble("P START 0\n +LDB #B\n LDA T\n RESB 3000\nB RESB 10\nT RSUB\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::DisplacementOutOfRange]);
    }
    #[test]
    fn base_operands() {
        let p = assemble("P START 0\n BASE 4096\n LDA 5000\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::DisplacementOutOfRange]);
        let p = assemble("P START 0\n BASE NOSUCH\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::UndefinedSymbol]);
        let p = assemble("P START 0\n BASE 1048576\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::InvalidAddressValue]);
        let p = assemble("P START 0\n BASE #3\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::InvalidAddressValue]);
    }
    #[test]
    fn literal_operands() {
        let p = assemble("P START 0\n LDA #4095\n +LDA #4096\n LDA 100\n END\n");
        assert!(p.succeeded());
        assert_eq!(code_of(&p, 10), "010FFF");
        assert_eq!(code_of(&p, 15), "01101000");
        assert_eq!(code_of(&p, 20), "030064");
        let p = assemble("P START 0\n LDA #4096\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::DisplacementOutOfRange]);
    }
    #[test]
    fn addressing_flags() {
        let p = assemble("P START 0\n LDA @T\n LDA T,X\n LDA #T\nT WORD 0\n END\n");
        assert!(p.succeeded());
        assert_eq!(code_of(&p, 10), "022006");
        assert_eq!(code_of(&p, 15), "03A003");
        assert_eq!(code_of(&p, 20), "012000");
        let p = assemble("P START 0\n LDA #T,X\nT WORD 0\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::InvalidOperandSyntax]);
    }
    #[test]
    fn malformed_address() {
        // a target that can't be a symbol isn't reported as an undefined one
        for operand in ["1X", "#9LIVES", "2B,X", "@0x10"] {
            let p = assemble(&format!("P START 0\n LDA {}\n END\n", operand));
            assert_eq!(kinds(&p), vec![ErrorKind::InvalidOperandSyntax], "{}", operand);
        }
        let p = assemble("P START 0\n LDA TOOLONGNAME\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::InvalidOperandSyntax]);
        let p = assemble("P START 0\n LDA LATER,X\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::UndefinedSymbol]);
    }
    #[test]
    fn format1_and_format2() {
        let p = assemble("P START 0\n FIX\n COMPR A,S\n CLEAR X\n ADDR S\n SHIFTL T,4\n SVC 15\n RMO SW,PC\n END\n");
        assert!(p.succeeded(), "{:?}", p.diagnostics);
        let codes: Vec<String> = (2..=8).map(|i| code_of(&p, i * 5)).collect();
        assert_eq!(codes, vec!["C4", "A004", "B410", "9040", "A453", "B0F0", "AC98"]);
        assert_eq!(p.length, 1 + 2 * 6);
    }
    #[test]
    fn format2_errors() {
        for (src, kind) in [
            (" COMPR A,Q", ErrorKind::InvalidRegisterName),
            (" CLEAR A,X", ErrorKind::InvalidOperandSyntax),
            (" SHIFTL A,17", ErrorKind::InvalidOperandSyntax),
            (" SHIFTR A,0", ErrorKind::InvalidOperandSyntax),
            (" SVC 16", ErrorKind::InvalidOperandSyntax),
            (" TIXR", ErrorKind::InvalidOperandSyntax),
            (" FIX A", ErrorKind::InvalidOperandSyntax),
            (" RSUB X", ErrorKind::InvalidOperandSyntax),
        ] {
            let p = assemble(&format!("P START 0\n{}\n END\n", src));
            assert_eq!(kinds(&p), vec![kind], "{}", src);
        }
    }
    #[test]
    fn pass1_errors_skip_pass2() {
        // the undefined symbol isn't reported because pass 2 never runs
        let p = assemble("P START 0\n LDA NOSUCH\n FOO 3\n RESW -1\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::UnknownMnemonic, ErrorKind::InvalidOperandSyntax]);
        assert!(p.statements.iter().all(|s| s.obj.is_none()));
        // every pass 1 problem is reported, not just the first
        let p = assemble("1BAD WORD 1\nTOOLONGNAME WORD 2\n +CLEAR A\n");
        assert_eq!(
            kinds(&p),
            vec![
                ErrorKind::InvalidLabel,
                ErrorKind::InvalidLabel,
                ErrorKind::UnknownMnemonic,
                ErrorKind::MissingEnd
            ]
        );
    }
    #[test]
    fn address_space_overflow() {
        let p = assemble("P START FFFF0\n RESB 16\n END\n");
        assert!(p.succeeded());
        let p = assemble("P START FFFF0\n RESB 17\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::InvalidAddressValue]);
        let p = assemble("P START 0\n RESW 4000000000\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::InvalidAddressValue]);
    }
    #[test]
    fn text_records_break_at_gaps() {
        let p = assemble("P START 0\nA WORD 1\n RESB 6\nB WORD 2\n END\n");
        assert_eq!(records(&p), vec!["HP     00000000000C", "T00000003000001", "T00000903000002", "E000000"]);
    }
    #[test]
    fn quote_inside_character_constant() {
        let p = assemble("P START 0\nS BYTE C'IT'S'\n END\n");
        assert_eq!(kinds(&p), vec![ErrorKind::InvalidOperandSyntax]);
        assert!(p.statements[1].has_error);
    }
    #[test]
    fn diagnostics_quote_the_source_line() {
        let p = assemble("P       START   0\n        LDA     BETA\n        END\n");
        assert_eq!(p.diagnostics[0].text.as_deref(), Some("        LDA     BETA"));
        let p = assemble("P START 0\n  FOO   1\n END\n");
        assert_eq!(p.diagnostics[0].text.as_deref(), Some("  FOO   1"));
    }
    #[test]
    fn source_with_stray_bytes() -> Result<(), Error> {
        // bytes that aren't UTF-8 only matter when they're part of a statement
        let dir = tempfile::tempdir()?;
        let asm = Assembler::new(Catalog::standard());
        let path = dir.path().join("latin1.asm");
        fs::write(&path, b"P START 0\n. caf\xe9 comment\n RSUB\n END\n")?;
        let p = asm.assemble_from_file(&path, None, false)?;
        assert!(p.succeeded(), "{:?}", p.diagnostics);
        assert_eq!(records(&p), vec!["HP     000000000003", "T000000034F0000", "E000000"]);
        assert!(dir.path().join("latin1.obj").is_file());
        fs::write(&path, b"P START 0\n LD\xc1 X\n END\n")?;
        let p = asm.assemble_from_file(&path, None, false)?;
        assert_eq!(kinds(&p), vec![ErrorKind::UnknownMnemonic]);
        assert_eq!(p.diagnostics[0].line, Some(10));
        assert!(!dir.path().join("latin1.obj").exists());
        Ok(())
    }
    #[test]
    fn session_is_reset_between_runs() {
        let asm = Assembler::new(Catalog::standard());
        let mut session = AssemblerSession::new(asm.catalog());
        let first = asm.pass1(&mut session, "A START 0\nX WORD 1\n END\n".lines());
        assert_eq!(first.len(), 3);
        asm.pass1(&mut session, "B START 10\nX WORD 1\n END\n".lines());
        assert!(!session.failed());
        assert_eq!(session.symbols.get("X"), Some(0x10));
        assert_eq!(session.state, SessionState::Pass1);
        assert_eq!(session.program_name, "B");
    }
}
