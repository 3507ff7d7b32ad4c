//! The *type-error* and *codegen-error* taxonomy entries.

use forge_base::Span;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TypeError {
    #[error("type mismatch at {span:?}: expected {expected}, found {found}")]
    Mismatch { expected: String, found: String, span: Span },

    #[error("call to non-function at {span:?}")]
    NotCallable { span: Span },

    #[error("unsupported cast to {target} at {span:?}")]
    UnsupportedCast { target: String, span: Span },

    #[error("break outside a loop at {span:?}")]
    BreakOutsideLoop { span: Span },
}

impl TypeError {
    pub fn span(&self) -> Span {
        match self {
            TypeError::Mismatch { span, .. }
            | TypeError::NotCallable { span }
            | TypeError::UnsupportedCast { span, .. }
            | TypeError::BreakOutsideLoop { span } => *span,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodegenError {
    #[error("not implemented: real unary negation")]
    RealUnaryNegateNotImplemented,

    #[error("not implemented: modulo on real operands")]
    RealModuloNotImplemented,

    #[error("not implemented: cast from {from} to int")]
    UnsupportedIntCast { from: String },

    #[error("not implemented: {0}")]
    Unimplemented(String),
}
