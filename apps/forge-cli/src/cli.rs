//! Command-line argument surface for `forgec`.

use std::path::PathBuf;

use clap::Parser;

/// Compiles a single forge source file to a native executable via `gcc`.
#[derive(Debug, Parser)]
#[command(name = "forgec", version, about)]
pub struct Args {
    /// Source file to compile.
    pub file: PathBuf,

    /// Print the parsed AST and exit without assembling.
    #[arg(short = 't', long = "print-ast")]
    pub print_ast: bool,

    /// Print the three-address-code listing and exit without assembling.
    #[arg(short = 'p', long = "print-tac")]
    pub print_tac: bool,
}
