// SPDX-License-Identifier: BSD-3-Clause
use std::fmt::{self, Display};

/// The slice of the IR type system the analysis looks at. Pointers are
/// opaque; only the integer/float/pointer distinction feeds facts.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Type {
    Void,
    Integer { bits: u32 },
    Float,
    Pointer,
    Array { element: Box<Type>, len: u64 },
    Struct { fields: Vec<Type> },
}

impl Type {
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer { .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Integer { bits } => write!(f, "i{}", bits),
            Type::Float => write!(f, "float"),
            Type::Pointer => write!(f, "ptr"),
            Type::Array { element, len } => write!(f, "[{} x {}]", len, element),
            Type::Struct { fields } => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "}}")
            }
        }
    }
}
