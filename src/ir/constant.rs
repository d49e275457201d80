// SPDX-License-Identifier: BSD-3-Clause
use std::fmt::{self, Display};
use std::sync::Arc;

use super::name::{FunctionName, GlobalName};
use super::types::Type;

/// A constant expression; the operand structure mirrors the corresponding
/// instructions, and fact generation lowers these through the same path.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum ConstExpr {
    GetElementPtr { base: Arc<Constant> },
    BitCast { value: Arc<Constant> },
    IntToPtr { value: Arc<Constant> },
    PtrToInt { value: Arc<Constant> },
    Other { name: String, operands: Vec<Arc<Constant>> },
}

impl ConstExpr {
    pub(crate) fn operands(&self) -> Vec<&Arc<Constant>> {
        match self {
            ConstExpr::GetElementPtr { base } => vec![base],
            ConstExpr::BitCast { value }
            | ConstExpr::IntToPtr { value }
            | ConstExpr::PtrToInt { value } => vec![value],
            ConstExpr::Other { operands, .. } => operands.iter().collect(),
        }
    }
}

/// Constants compare structurally; equal constants denote the same abstract
/// object, which keeps the analysis conservative and lets one lowering per
/// module suffice.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Constant {
    Int { bits: u32, value: u64 },
    Float,
    /// The null pointer.
    Null,
    Undef(Type),
    /// The address of a global variable.
    Global(GlobalName),
    /// The address of a function.
    Function(FunctionName),
    Array(Vec<Arc<Constant>>),
    Struct(Vec<Arc<Constant>>),
    Expr(ConstExpr),
    /// Recognised but unsupported; fact generation fails on it.
    BlockAddress,
}

impl Constant {
    pub fn int(bits: u32, value: u64) -> Arc<Self> {
        Arc::new(Constant::Int { bits, value })
    }

    pub fn global(name: impl Into<GlobalName>) -> Arc<Self> {
        Arc::new(Constant::Global(name.into()))
    }

    pub fn function(name: impl Into<FunctionName>) -> Arc<Self> {
        Arc::new(Constant::Function(name.into()))
    }

    /// Child constants, in operand order.
    pub(crate) fn operands(&self) -> Vec<&Arc<Constant>> {
        match self {
            Constant::Array(fields) | Constant::Struct(fields) => fields.iter().collect(),
            Constant::Expr(expr) => expr.operands(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn is_integer_typed(&self) -> bool {
        match self {
            Constant::Int { .. } => true,
            Constant::Undef(ty) => ty.is_integer(),
            Constant::Expr(ConstExpr::PtrToInt { .. }) => true,
            _ => false,
        }
    }

    pub(crate) fn is_float_typed(&self) -> bool {
        match self {
            Constant::Float => true,
            Constant::Undef(ty) => ty.is_float(),
            _ => false,
        }
    }

    pub(crate) fn is_pointer_typed(&self) -> bool {
        match self {
            Constant::Null | Constant::Global(_) | Constant::Function(_) => true,
            Constant::Undef(ty) => ty.is_pointer(),
            Constant::Expr(
                ConstExpr::GetElementPtr { .. }
                | ConstExpr::BitCast { .. }
                | ConstExpr::IntToPtr { .. },
            ) => true,
            _ => false,
        }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int { value, .. } => write!(f, "{}", value),
            Constant::Float => write!(f, "<float>"),
            Constant::Null => write!(f, "null"),
            Constant::Undef(_) => write!(f, "undef"),
            Constant::Global(g) => write!(f, "{}", g),
            Constant::Function(name) => write!(f, "{}", name),
            Constant::Array(fields) => {
                write!(f, "[")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "]")
            }
            Constant::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "}}")
            }
            Constant::Expr(expr) => match expr {
                ConstExpr::GetElementPtr { base } => write!(f, "getelementptr({})", base),
                ConstExpr::BitCast { value } => write!(f, "bitcast({})", value),
                ConstExpr::IntToPtr { value } => write!(f, "inttoptr({})", value),
                ConstExpr::PtrToInt { value } => write!(f, "ptrtoint({})", value),
                ConstExpr::Other { name, .. } => write!(f, "{}(...)", name),
            },
            Constant::BlockAddress => write!(f, "blockaddress"),
        }
    }
}
