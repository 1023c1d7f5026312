//! Type System for the didactic language

use std::fmt;

/// Byte size of every value: RV64 registers, stack slots and struct fields
pub const WORD_SIZE: usize = 8;

/// Environment-call codes used by `print`
pub const PRINT_INT: i64 = 1;
pub const PRINT_FLOAT: i64 = 3;
pub const PRINT_STRING: i64 = 4;

/// A struct field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }
}

/// The type of a function: one optional parameter and one optional result,
/// both `Nil` when absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub param: Box<Type>,
    pub result: Box<Type>,
}

impl Signature {
    pub fn new(param: Type, result: Type) -> Self {
        Self {
            param: Box::new(param),
            result: Box::new(result),
        }
    }
}

/// Resolved type (after type checking). Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Type {
    #[default]
    Unknown,
    Nil,
    Int,
    Float,
    String,
    Bool,
    Struct(Vec<Field>),
    Signature(Signature),
}

impl Type {
    /// Int, Float, String or Bool
    pub fn is_basic(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::String | Self::Bool)
    }

    /// Values of this type live in floating-point registers
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Look up a struct field, returning its index and type
    pub fn field(&self, name: &str) -> Option<(usize, &Type)> {
        match self {
            Self::Struct(fields) => fields
                .iter()
                .enumerate()
                .find(|(_, f)| f.name == name)
                .map(|(i, f)| (i, &f.ty)),
            _ => None,
        }
    }

    /// Byte offset of the field at `index`
    pub fn field_offset(index: usize) -> usize {
        index * WORD_SIZE
    }

    /// Size of the heap block backing a struct value
    pub fn heap_size(&self) -> usize {
        match self {
            Self::Struct(fields) => fields.len() * WORD_SIZE,
            _ => 0,
        }
    }

    /// The environment-call code `print` uses for this type
    pub fn print_code(&self) -> Option<i64> {
        match self {
            Self::Int | Self::Bool => Some(PRINT_INT),
            Self::Float => Some(PRINT_FLOAT),
            Self::String => Some(PRINT_STRING),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Nil => write!(f, "nil"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Bool => write!(f, "bool"),
            Self::Struct(fields) => {
                write!(f, "struct{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {}", field.name, field.ty)?;
                }
                write!(f, "}}")
            }
            Self::Signature(sig) => {
                write!(f, "func(")?;
                if !sig.param.is_nil() {
                    write!(f, "{}", sig.param)?;
                }
                write!(f, ")")?;
                if !sig.result.is_nil() {
                    write!(f, " {}", sig.result)?;
                }
                Ok(())
            }
        }
    }
}
