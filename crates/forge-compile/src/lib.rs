//! Type checking, three-address-code generation, and x86-64 assembly
//! emission for the forge source language.
//!
//! The pipeline stages run strictly in order: [`typecheck::typecheck`]
//! annotates every expression node with its static type, [`tacgen::generate`]
//! lowers the typed tree to three-address code against a shared
//! [`address::AddressPool`], and [`asm::emit_program`] lowers that TAC to
//! AT&T-syntax x86-64 assembly text.

pub mod address;
pub mod asm;
pub mod error;
pub mod tacgen;
pub mod typecheck;
pub mod types;

pub use address::{AddrId, Address, AddressPool, Instr, Opcode};
pub use asm::emit_program;
pub use error::{CodegenError, TypeError};
pub use tacgen::{flatten_globals, generate, FunctionCode};
pub use typecheck::typecheck;
pub use types::Type;

#[cfg(test)]
mod tests {
    use forge_base::Interner;
    use forge_lang::ast::NodeKind;
    use forge_lang::resolve::resolve;
    use forge_lang::Parser;

    use super::*;

    /// End-to-end: source text all the way through to assembly text,
    /// exercising every pipeline stage this crate owns.
    #[test]
    fn full_pipeline_compiles_a_small_program_to_assembly() {
        let src = "add := (int a, int b) -> int { return a + b; } \
                   main := () -> void { println(add(1, 2)); }";
        let mut interner = Interner::new();
        let (mut ast, root) = Parser::new(src.as_bytes(), &mut interner).parse_program().unwrap();
        resolve(&mut ast, &mut interner, root).unwrap();
        typecheck(&mut ast, &interner, root).unwrap();

        let top_level: Vec<_> = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => vec![],
        };

        let mut pool = AddressPool::new();
        let funcs = generate(&ast, &mut interner, &mut pool, root);
        assert_eq!(funcs.len(), 2);

        let globals = flatten_globals(&ast, &mut interner, &top_level);

        let asm = emit_program(&funcs, &pool, &interner, &globals).unwrap();
        assert!(asm.contains(".add:"));
        assert!(asm.contains(".main:"));
        assert!(asm.contains(".globl main"));
    }
}
