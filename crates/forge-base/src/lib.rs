//! # forge-base
//!
//! Shared support types used by every stage of the compiler front end and
//! back end:
//!
//! - [`Interner`]/[`Symbol`] — string interning for O(1) equality (identifier
//!   names, the compiler's string-literal table, and the dot-joined
//!   qualified names synthesized for struct fields)
//! - [`Span`] — source byte-range tracking, merged across a node's children
//!   as the parser builds each larger expression
//! - [`DynSeq`] — the growable contiguous sequence contract shared by both
//!   pipelines (atom lists, DFA transition rows, TAC instruction streams)
//!
//! This crate has no knowledge of the source language's grammar or
//! x86-64 — it is pure, reusable infrastructure.
//!
//! # Example
//!
//! ```
//! use forge_base::{Interner, Span};
//!
//! let mut interner = Interner::new();
//!
//! let hello = interner.intern("hello");
//! let span = Span::new(0, 5);
//! assert_eq!(interner.resolve(hello), "hello");
//! ```

pub mod intern;
pub mod seq;
pub mod span;

pub use intern::{Interner, Symbol, SymbolEq};
pub use seq::DynSeq;
pub use span::Span;
