//! # A SIC/XE two-pass assembler written in Rust.
//!
//! ## Getting Started
//! To assemble a program:
//! ```
//! cargo run -- /path/to/program.asm
//! ```
//! ...or if you've already built the binary then just...
//! ```
//! sicxe /path/to/program.asm
//! ```
//! A successful run writes `program.lst` (listing) and `program.obj` (object program)
//! next to the source. Passing an `.obj` file instead reads and checks an object program.
//! ## Options
//! Help for command line options is available using -h or --help.
#[macro_use]
mod macros;
mod assembler;
mod config;
mod error;
mod instructions;
mod intermediate;
mod obj;
mod parse;
mod program;
mod records;
use crate::assembler::Assembler;
use crate::instructions::Catalog;
use crate::records::ObjectProgram;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::result::Result;
use std::{fmt, io};
pub(crate) use {crate::error::*, program::*};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::init();
    if let Err(e) = run() {
        if e.is_fatal() {
            error!("{} {}", red!("fatal:"), e);
        } else {
            error!("{}", e);
        }
        return Err(Box::new(e));
    }
    Ok(())
}
/// the opcode table named by --opcodes, or the standard one
fn load_catalog() -> Result<Catalog, Error> {
    match config::ARGS.opcodes.as_deref() {
        Some(file) => {
            let catalog = Catalog::from_file(Path::new(file))?;
            verbose_println!("loaded {} opcodes from {}", catalog.opcodes().len(), file);
            Ok(catalog)
        }
        None => Ok(Catalog::standard()),
    }
}
fn run() -> Result<(), Error> {
    let asm = Assembler::new(load_catalog()?).with_modification_records(config::ARGS.modification_records);
    let lookup_only = config::ARGS.opcode_list || config::ARGS.opcode.is_some();
    if config::ARGS.opcode_list {
        asm.catalog().write_table(&mut io::stdout())?;
    }
    if let Some(mnemonic) = config::ARGS.opcode.as_deref() {
        match asm.catalog().get(mnemonic) {
            Some(desc) => println!("{}", desc),
            None => warn!("\"{}\" is not in the opcode table", mnemonic),
        }
    }
    match config::ARGS.file.as_deref() {
        Some(file) => process_file(&asm, Path::new(file), None, config::ARGS.keep_intermediate),
        None if lookup_only => Ok(()),
        None => Err(general_err!("no input file given (see --help)")),
    }
}
/// process_file drives the top level functionality (assemble or inspect) of the app
fn process_file(asm: &Assembler, path: &Path, out_dir: Option<&Path>, keep_intermediate: bool) -> Result<(), Error> {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "asm" | "s" => {
            // the file looks like assembly source code, so try to assemble it
            info!("Assembling {}", path.display());
            let program = asm.assemble_from_file(path, out_dir, keep_intermediate)?;
            program.write_log(&mut io::stdout(), &path.display().to_string())?;
            if !program.succeeded() {
                let kind = program.diagnostics.first().map_or(ErrorKind::General, |e| e.kind);
                return Err(Error::new(
                    kind,
                    None,
                    format!(
                        "unable to assemble {}: {} error(s)",
                        path.display(),
                        program.diagnostics.len()
                    )
                    .as_str(),
                ));
            }
            info!("{} {}", green!("Success:"), program);
            if config::ARGS.list {
                program.write_listing(&mut io::stdout())?;
            }
            if config::ARGS.symbols {
                program.symbols.dump(&mut io::stdout())?;
            }
        }
        "obj" => {
            // the file looks like an object program; read and check it
            let object = ObjectProgram::read_from_file(path)?;
            let (name, start, length) = object
                .header()
                .ok_or_else(|| general_err!("object program has no Header record"))?;
            let bytes: usize = object.text_records().map(|(_, data)| data.len()).sum();
            info!(
                "Object program \"{}\": start {:06X}, length {:06X}, {} records, {} bytes of object code",
                name,
                start,
                length,
                object.len(),
                bytes
            );
        }
        _ => return Err(general_err!("unrecognized file type")),
    }
    Ok(())
}
