//! The single error taxonomy entry for this crate: *bad-regex*.
//!
//! Every failure during preprocessing or NFA construction is a malformed
//! pattern, never an internal-invariant violation — those remain `assert!`s
//! closer to where the invariant is established.

use forge_base::Span;
use thiserror::Error;

/// A malformed regex pattern, with the byte span of the pattern text
/// implicated (not the input being matched).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegexError {
    #[error("unbalanced parenthesis at {0:?}")]
    UnbalancedParen(Span),

    #[error("pattern ends with a trailing escape character")]
    TrailingEscape,

    #[error("operator '{op}' at {span:?} has no preceding operand")]
    DanglingOperator { op: char, span: Span },

    #[error("empty pattern")]
    EmptyPattern,
}
