//! The *lex-error* and *parse-error* taxonomy entries.

use forge_base::Span;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LexError {
    #[error("unexpected byte {byte:#04x} at {span:?}")]
    UnexpectedByte { byte: u8, span: Span },

    #[error("unterminated string literal starting at {span:?}")]
    UnterminatedString { span: Span },

    #[error("unterminated character literal starting at {span:?}")]
    UnterminatedChar { span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedByte { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedChar { span } => *span,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("unexpected token at {span:?}: expected {expected}, found {found}")]
    Unexpected { expected: String, found: String, span: Span },

    #[error("lexical error: {0}")]
    Lex(#[from] LexError),
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Unexpected { span, .. } => *span,
            ParseError::Lex(e) => e.span(),
        }
    }
}

/// The *name-error* taxonomy entries, produced during symbol resolution.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error("undeclared identifier at {span:?}")]
    Undeclared { span: Span },

    #[error("redeclaration of an existing name at {span:?}")]
    Redeclared { span: Span },

    #[error("dot-access on a non-struct value at {span:?}")]
    NotAStruct { span: Span },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::Undeclared { span } | ResolveError::Redeclared { span } | ResolveError::NotAStruct { span } => {
                *span
            }
        }
    }
}
