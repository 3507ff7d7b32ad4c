//! `forgec`: lex, parse, resolve, type-check, lower to TAC, emit x86-64
//! assembly, then shell out to `gcc` for assembling and linking.

mod cli;

use std::process::ExitCode;

use clap::Parser as _;
use thiserror::Error;
use tracing::instrument;

use forge_base::{Interner, Span};
use forge_compile::{emit_program, flatten_globals, generate, typecheck, AddressPool};
use forge_lang::ast::NodeKind;
use forge_lang::{resolve, Diagnostics, Parser};

/// Unifies every pipeline stage's error type behind a single `Span`-bearing
/// façade so the driver can render one caret diagnostic regardless of which
/// stage failed.
#[derive(Debug, Error)]
enum ForgeError {
    #[error(transparent)]
    Lex(#[from] forge_lang::LexError),
    #[error(transparent)]
    Parse(#[from] forge_lang::ParseError),
    #[error(transparent)]
    Resolve(#[from] forge_lang::ResolveError),
    #[error(transparent)]
    Type(#[from] forge_compile::TypeError),
    #[error(transparent)]
    Codegen(#[from] forge_compile::CodegenError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    fn span(&self) -> Option<Span> {
        match self {
            ForgeError::Lex(e) => Some(e.span()),
            ForgeError::Parse(e) => Some(e.span()),
            ForgeError::Resolve(e) => Some(e.span()),
            ForgeError::Type(e) => Some(e.span()),
            ForgeError::Codegen(_) | ForgeError::Io(_) => None,
        }
    }

    fn exit_code(&self) -> u8 {
        match self {
            ForgeError::Lex(_) => 2,
            ForgeError::Parse(_) => 3,
            ForgeError::Resolve(_) => 4,
            ForgeError::Type(_) => 5,
            ForgeError::Codegen(_) => 6,
            ForgeError::Io(_) => 7,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::try_init().ok();
    let args = cli::Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let source = std::fs::read_to_string(&args.file).unwrap_or_default();
            match err.span() {
                Some(span) => eprintln!("{}", Diagnostics::format_one(&source, &err.to_string(), span)),
                None => eprintln!("error: {err}"),
            }
            ExitCode::from(err.exit_code())
        }
    }
}

#[instrument(skip(args))]
fn run(args: &cli::Args) -> Result<(), ForgeError> {
    let source = std::fs::read_to_string(&args.file)?;
    let mut interner = Interner::new();

    let (mut ast, root) = Parser::new(source.as_bytes(), &mut interner).parse_program()?;
    resolve(&mut ast, &mut interner, root)?;

    if args.print_ast {
        println!("{:#?}", ast);
        return Ok(());
    }

    typecheck(&mut ast, &interner, root)?;

    let top_level: Vec<_> = match &ast.get(root).kind {
        NodeKind::Program { globals } => globals.clone(),
        _ => vec![],
    };

    let mut pool = AddressPool::new();
    let funcs = generate(&ast, &mut interner, &mut pool, root);

    if args.print_tac {
        for func in &funcs {
            println!("{}:", interner.resolve(func.name));
            for instr in &func.instrs {
                println!("  {instr:?}");
            }
        }
        return Ok(());
    }

    let globals = flatten_globals(&ast, &mut interner, &top_level);

    let asm = emit_program(&funcs, &pool, &interner, &globals)?;
    std::fs::write("tmp.S", asm)?;

    let stem = args.file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "a.out".into());
    assemble("tmp.S", &stem).map_err(|e| ForgeError::Io(std::io::Error::other(e.to_string())))?;

    Ok(())
}

/// Shells out to the external assembler/linker. This is the one place the
/// driver reaches for `anyhow` rather than a taxonomy error variant: a
/// failing subprocess isn't one of the compiler's own error categories,
/// just a boundary failure to report and exit on.
fn assemble(asm_path: &str, out_stem: &str) -> anyhow::Result<()> {
    let status = std::process::Command::new("gcc").arg(asm_path).arg("-o").arg(out_stem).status()?;
    anyhow::ensure!(status.success(), "gcc exited with status {status}");
    Ok(())
}
