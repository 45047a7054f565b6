use super::instructions::{Catalog, Descriptor, Format};
use super::obj::ObjectCode;
use super::parse::split_addressing_prefix;
use super::records::ObjectProgram;
use super::*;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

// listing columns: line(5) loc(5) label(8) ext(1) mnemonic(6) mode(1) operand(24) object code
pub const LST_LINE_WIDTH: usize = 5;
pub const LST_LABEL_WIDTH: usize = 8;
pub const LST_MNEMONIC_WIDTH: usize = 6;
pub const LST_OPERAND_WIDTH: usize = 24;

/// One source line after parsing. Pass 1 fills in the location and length,
/// pass 2 the object code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    pub line_number: usize,              // listing line number (0 for blank and comment lines)
    pub location: u32,                   // location counter before this statement
    pub label: Option<String>,           // label defined on this line
    pub mnemonic: Option<String>,        // mnemonic as written, without '+'
    pub instruction: Option<Descriptor>, // catalog entry for the mnemonic (if it's known)
    pub operand: Option<String>,
    pub is_extended: bool,
    pub is_indexed: bool,
    pub is_comment: bool,
    pub is_empty: bool,
    pub has_error: bool,
    pub encoded_length: u32,
    pub obj: Option<ObjectCode>,
    pub source: String, // the line as written, trailing whitespace removed
}
impl Statement {
    pub fn get_label(&self) -> &str { self.label.as_deref().unwrap_or("") }
    pub fn get_mnemonic(&self) -> &str { self.mnemonic.as_deref().unwrap_or("") }
    pub fn get_operand(&self) -> &str { self.operand.as_deref().unwrap_or("") }
    pub fn format(&self) -> Option<Format> { self.instruction.as_ref().and_then(|d| d.format()) }
    /// The statement as it appeared in the source, or rebuilt from its fields if that's unknown
    pub fn text(&self) -> String {
        if self.source.is_empty() {
            self.to_string()
        } else {
            self.source.clone()
        }
    }

    /// The fixed-column listing line for this statement. The addressing prefix of a
    /// format 3/4 operand moves into its own column in front of the operand.
    pub fn listing_line(&self) -> String {
        let (mode, operand) = match self.format() {
            Some(Format::ThreeFour) => {
                let (mode, rest) = split_addressing_prefix(self.get_operand());
                (mode.marker(), rest)
            }
            _ => (' ', self.get_operand()),
        };
        let line = format!(
            "{:>lw$}  {:05X}  {:<law$} {}{:<mw$} {}{:<ow$}  {}",
            self.line_number,
            self.location,
            self.get_label(),
            if self.is_extended { '+' } else { ' ' },
            self.get_mnemonic(),
            mode,
            operand,
            self.obj.as_ref().map(|o| o.to_string()).unwrap_or_default(),
            lw = LST_LINE_WIDTH,
            law = LST_LABEL_WIDTH,
            mw = LST_MNEMONIC_WIDTH,
            ow = LST_OPERAND_WIDTH,
        );
        line.trim_end().to_string()
    }
}
impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        if let Some(label) = &self.label {
            fields.push(label.clone());
        }
        if let Some(m) = &self.mnemonic {
            fields.push(format!("{}{}", if self.is_extended { "+" } else { "" }, m));
        }
        if let Some(operand) = &self.operand {
            fields.push(operand.clone());
        }
        write!(f, "{}", fields.join(" "))
    }
}

/// Symbol name to address. Names are case sensitive.
#[derive(Debug, Default)]
pub struct SymbolTable {
    map: HashMap<String, u32>,
}
impl SymbolTable {
    pub fn new() -> Self { SymbolTable::default() }
    /// Add a new symbol. A name can only be defined once; the first address is kept.
    pub fn insert(&mut self, name: &str, addr: u32) -> Result<(), Error> {
        if let Some(first) = self.map.get(name) {
            return Err(Error::new(
                ErrorKind::DuplicateSymbol,
                None,
                format!("duplicate symbol \"{}\" (first defined at {:05X})", name, first).as_str(),
            ));
        }
        self.map.insert(name.to_string(), addr);
        Ok(())
    }
    pub fn get(&self, name: &str) -> Option<u32> { self.map.get(name).copied() }
    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }
    /// (name, address) pairs ordered by address, then name
    pub fn sorted(&self) -> Vec<(&str, u32)> {
        let mut v: Vec<(&str, u32)> = self.map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        v.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));
        v
    }
    pub fn dump(&self, f: &mut dyn io::Write) -> Result<(), io::Error> {
        if self.is_empty() {
            return writeln!(f, "No symbols.");
        }
        writeln!(f, "{} symbols defined:", self.len())?;
        writeln!(f, blue!("{:8} {}"), "SYMBOL", "ADDR")?;
        for (name, addr) in self.sorted() {
            writeln!(f, "{:8} {:05X}", name, addr)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionState {
    Idle,
    Pass1,
    Pass2,
    Done,
}

/// Everything one assembly run needs to carry between (and through) the two passes.
#[derive(Debug)]
pub struct AssemblerSession<'a> {
    pub catalog: &'a Catalog,
    pub state: SessionState,
    pub symbols: SymbolTable,
    pub locctr: u32,
    pub start_address: u32,
    pub program_length: u32,
    pub program_name: String,
    pub first_executable: u32,
    pub base_value: Option<u32>,
    pub diagnostics: Vec<Error>,
    pub warnings: Vec<Error>,
}
impl<'a> AssemblerSession<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        AssemblerSession {
            catalog,
            state: SessionState::Idle,
            symbols: SymbolTable::new(),
            locctr: 0,
            start_address: 0,
            program_length: 0,
            program_name: String::new(),
            first_executable: 0,
            base_value: None,
            diagnostics: Vec::new(),
            warnings: Vec::new(),
        }
    }
    /// Forget everything from a previous run
    pub fn reset(&mut self) {
        *self = AssemblerSession::new(self.catalog);
    }
    pub fn report(&mut self, e: Error) {
        verbose_println!("  {}", e);
        self.diagnostics.push(e);
    }
    /// Report a problem with a statement and flag the statement
    pub fn flag(&mut self, stmt: &mut Statement, kind: ErrorKind, msg: &str) {
        self.report(stmt_err!(stmt, kind, "{}", msg));
        stmt.has_error = true;
    }
    pub fn warn(&mut self, stmt: &Statement, msg: &str) { self.warnings.push(stmt_err!(stmt, ErrorKind::General, "{}", msg)) }
    pub fn failed(&self) -> bool { !self.diagnostics.is_empty() }
    pub fn into_program(self, statements: Vec<Statement>, object: ObjectProgram) -> Program {
        Program {
            name: self.program_name,
            start_address: self.start_address,
            length: self.program_length,
            first_executable: self.first_executable,
            statements,
            symbols: self.symbols,
            object,
            diagnostics: self.diagnostics,
            warnings: self.warnings,
        }
    }
}

/// The outcome of assembling one source program
#[derive(Debug)]
pub struct Program {
    pub name: String,
    pub start_address: u32,
    pub length: u32,
    pub first_executable: u32,
    pub statements: Vec<Statement>,
    pub symbols: SymbolTable,
    pub object: ObjectProgram,
    pub diagnostics: Vec<Error>,
    pub warnings: Vec<Error>,
}
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "program \"{}\": start {:06X}, length {:06X}, entry {:06X}, {} statements, {} symbols",
            self.name,
            self.start_address,
            self.length,
            self.first_executable,
            self.statements.len(),
            self.symbols.len()
        )
    }
}
impl Program {
    pub fn succeeded(&self) -> bool { self.diagnostics.is_empty() && self.object.is_complete() }
    pub fn write_listing(&self, f: &mut dyn io::Write) -> Result<(), io::Error> {
        for stmt in &self.statements {
            writeln!(f, "{}", stmt.listing_line())?;
        }
        Ok(())
    }
    /// One line per warning and diagnostic followed by a summary line
    pub fn write_log(&self, f: &mut dyn io::Write, source: &str) -> Result<(), io::Error> {
        for w in &self.warnings {
            writeln!(f, "warning: {}", w)?;
        }
        for e in &self.diagnostics {
            writeln!(f, "error: {}", e)?;
        }
        if self.succeeded() {
            writeln!(f, "{}: assembled {}", source, self)
        } else {
            writeln!(f, "{}: assembly failed with {} error(s)", source, self.diagnostics.len())
        }
    }
    /// Write the listing and object files. Only meaningful for a successful run.
    pub fn write_output_files(&self, paths: &OutputPaths) -> Result<(), Error> {
        let mut file = create_file(&paths.listing)?;
        self.write_listing(&mut file)?;
        verbose_println!("wrote listing file: {}", paths.listing.display());
        let mut file = create_file(&paths.object)?;
        self.object.write_to_file(&mut file)?;
        verbose_println!("wrote object file: {}", paths.object.display());
        Ok(())
    }
}

/// Output file names derived from the source file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub intermediate: PathBuf,
    pub listing: PathBuf,
    pub object: PathBuf,
}
impl OutputPaths {
    /// `dir/prog.asm` becomes `dir/prog.int`, `dir/prog.lst` and `dir/prog.obj`,
    /// or the same names under `out_dir` when one is given.
    pub fn for_source(source: &Path, out_dir: Option<&Path>) -> Result<Self, Error> {
        let stem = source.file_stem().ok_or_else(|| general_err!("bad filename"))?;
        let mut pb = match out_dir {
            Some(dir) => dir.to_path_buf(),
            None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        pb.push(stem);
        Ok(OutputPaths {
            intermediate: pb.with_extension("int"),
            listing: pb.with_extension("lst"),
            object: pb.with_extension("obj"),
        })
    }
    /// Delete whichever of the files exist
    pub fn remove_all(&self) {
        for p in [&self.intermediate, &self.listing, &self.object] {
            if p.exists() {
                _ = fs::remove_file(p);
            }
        }
    }
}

/// Read a whole text file. Bytes that aren't valid UTF-8 become U+FFFD instead of failing the read.
pub fn read_text(path: &Path) -> Result<String, Error> {
    let bytes = fs::read(path).map_err(|e| file_err!(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn create_file(path: &Path) -> Result<File, Error> {
    File::create(path).map_err(|e| {
        Error::new(
            ErrorKind::FileOpenFailure,
            None,
            format!("unable to create \"{}\": {}", path.display(), e).as_str(),
        )
    })
}
