//! Lexer, parser, AST, and symbol resolution for the forge source language.
//!
//! ```
//! use forge_base::Interner;
//! use forge_lang::parser::Parser;
//! use forge_lang::resolve::resolve;
//!
//! let mut interner = Interner::new();
//! let (mut ast, root) = Parser::new(b"int x := 1;", &mut interner)
//!     .parse_program()
//!     .unwrap();
//! resolve(&mut ast, &mut interner, root).unwrap();
//! ```

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod resolve;
pub mod scope;
pub mod token;

pub use ast::{Ast, NodeId};
pub use diagnostics::{Diagnostics, Mode};
pub use error::{LexError, ParseError, ResolveError};
pub use lexer::Lexer;
pub use parser::Parser;
pub use resolve::resolve;
