//! Static types. A struct never earns its own `Type` variant: a struct
//! declaration's scalar fields are flattened to ordinary named locals or
//! globals by `tacgen::flatten_globals`/`Gen::qualified_symbol`, so every
//! expression that survives type-checking is still one of these two
//! shapes. `tuple`, `array`, and `pointer` literal syntax don't exist in
//! the surface grammar at all, so those classes are left for a future
//! surface extension (see `DESIGN.md`).

use forge_lang::ast::BasicType;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Basic(BasicType),
    Function { params: Vec<Type>, ret: Box<Type> },
}

impl Type {
    pub fn basic(bt: BasicType) -> Type {
        Type::Basic(bt)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Basic(BasicType::Int) | Type::Basic(BasicType::Real))
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Type::Basic(BasicType::Real))
    }

    pub fn as_basic(&self) -> Option<BasicType> {
        match self {
            Type::Basic(bt) => Some(*bt),
            Type::Function { .. } => None,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Basic(BasicType::Int) => write!(f, "int"),
            Type::Basic(BasicType::Real) => write!(f, "real"),
            Type::Basic(BasicType::Void) => write!(f, "void"),
            Type::Basic(BasicType::Bool) => write!(f, "bool"),
            Type::Basic(BasicType::Char) => write!(f, "char"),
            Type::Basic(BasicType::String) => write!(f, "string"),
            Type::Function { params, ret } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_types_display_by_name() {
        assert_eq!(Type::Basic(BasicType::Int).to_string(), "int");
        assert_eq!(Type::Basic(BasicType::Real).to_string(), "real");
    }

    #[test]
    fn is_numeric_accepts_int_and_real_only() {
        assert!(Type::Basic(BasicType::Int).is_numeric());
        assert!(Type::Basic(BasicType::Real).is_numeric());
        assert!(!Type::Basic(BasicType::Bool).is_numeric());
    }

    #[test]
    fn function_type_displays_signature() {
        let ty = Type::Function { params: vec![Type::Basic(BasicType::Int)], ret: Box::new(Type::Basic(BasicType::Bool)) };
        assert_eq!(ty.to_string(), "(int) -> bool");
    }
}
