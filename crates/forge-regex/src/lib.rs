//! A byte-oriented regex engine.
//!
//! Compiles a pattern through four stages — preprocessor, Thompson NFA,
//! subset-construction DFA, Myhill-Nerode minimisation — and exposes a
//! minimised [`Dfa`] supporting full-match ([`Dfa::accepts`]) and
//! longest-prefix-match ([`Dfa::longest_match`]).
//!
//! Supported syntax: literal bytes, `.`, `\d`, `\w`, any other `\x` escape,
//! `(...)` grouping, and the operators `*`, `+`, `?`, `|`. Input is
//! byte-oriented; there is no Unicode-aware matching and the byte `0xFF` is
//! reserved internally as the epsilon sentinel, so it can never appear in a
//! matched input.
//!
//! ```
//! let dfa = forge_regex::compile(b"a(b|c)*").unwrap();
//! assert!(dfa.accepts(b"abbccbb"));
//! assert!(!dfa.accepts(b"bbccbb"));
//! ```

pub mod atom;
pub mod dfa;
pub mod error;
pub mod matcher;
pub mod minimize;
pub mod nfa;

pub use dfa::Dfa;
pub use error::RegexError;

/// Compiles a pattern into a minimised DFA.
#[tracing::instrument(skip(pattern), fields(pattern_len = pattern.len()))]
pub fn compile(pattern: &[u8]) -> Result<Dfa, RegexError> {
    let atoms = atom::preprocess(pattern)?;
    tracing::debug!(atoms = atoms.len(), "preprocessed pattern");
    let nfa = nfa::build(&atoms)?;
    tracing::debug!(states = nfa.states.len(), "built NFA");
    let raw = dfa::build(&nfa);
    tracing::debug!(states = raw.num_states, "built DFA via subset construction");
    let minimized = minimize::minimize(&raw);
    tracing::debug!(states = minimized.num_states, "minimised DFA");
    Ok(minimized)
}
