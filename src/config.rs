use clap::Parser;
use lazy_static::lazy_static;

#[derive(Parser, Debug)]
#[command(author,version,about,long_about=None)]
pub struct Args {
    /// Assembly source (.asm, .s) to assemble or object program (.obj) to inspect
    pub file: Option<String>,

    /// If the assembly succeeds then dump the listing to stdout
    #[arg(short, long)]
    pub list: bool,

    /// If the assembly succeeds then dump the symbol table to stdout
    #[arg(short, long)]
    pub symbols: bool,

    /// Load the opcode table from this file rather than the built-in SIC/XE table
    #[arg(long)]
    pub opcodes: Option<String>,

    /// Print the catalog entry for one mnemonic
    #[arg(long)]
    pub opcode: Option<String>,

    /// Print every entry in the opcode table
    #[arg(long)]
    pub opcode_list: bool,

    /// Keep the intermediate (.int) file after a successful assembly
    #[arg(short, long)]
    pub keep_intermediate: bool,

    /// Emit modification records for format 4 instructions with symbolic addresses
    #[arg(short, long)]
    pub modification_records: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

lazy_static! {
    pub static ref ARGS: Args = if cfg!(test) {
        // manually set parameters for running tests
        Args::parse_from(["test"])
    } else {
        Args::parse()
    };
}

pub fn init() { lazy_static::initialize(&ARGS); }
