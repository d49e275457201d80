// SPDX-License-Identifier: BSD-3-Clause
use std::fmt::{self, Display};
use std::sync::Arc;

use super::constant::Constant;
use super::name::{FunctionName, LocalName};
use super::types::Type;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Operand {
    Local(Arc<LocalName>),
    Constant(Arc<Constant>),
}

impl Operand {
    pub fn local(name: Arc<LocalName>) -> Self {
        Operand::Local(name)
    }

    pub fn constant(c: Arc<Constant>) -> Self {
        Operand::Constant(c)
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Local(l) => write!(f, "{}", l),
            Operand::Constant(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Callee {
    /// A direct call to a named function.
    Function(FunctionName),
    /// A call through a pointer-valued operand.
    Pointer(Operand),
}

/// Instruction opcodes, with the operands the analysis reads. Anything the
/// analysis has no model for is `Other` and lowers to `instrUnknown`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Opcode {
    Alloca,
    Load {
        src: Operand,
    },
    Store {
        value: Operand,
        dest: Operand,
    },
    GetElementPtr {
        base: Operand,
        indices: Vec<Operand>,
    },
    BitCast {
        value: Operand,
    },
    IntToPtr {
        value: Operand,
    },
    Phi {
        incoming: Vec<Operand>,
    },
    Call {
        callee: Callee,
        args: Vec<Operand>,
    },
    Ret {
        value: Option<Operand>,
    },
    Br,
    CondBr {
        cond: Operand,
    },
    Icmp {
        lhs: Operand,
        rhs: Operand,
    },
    Fcmp {
        lhs: Operand,
        rhs: Operand,
    },
    /// Numeric casts (trunc, zext, sext, fp conversions); no pointer flow.
    Cast {
        value: Operand,
    },
    Binary {
        lhs: Operand,
        rhs: Operand,
    },
    Unary {
        value: Operand,
    },
    Unreachable,
    Other {
        name: String,
        operands: Vec<Operand>,
    },
}

impl Opcode {
    /// Every value operand, in IR operand order. Branch labels are not
    /// values here, so `br` contributes only its condition.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Opcode::Alloca | Opcode::Br | Opcode::Unreachable | Opcode::Ret { value: None } => {
                Vec::new()
            }
            Opcode::Load { src } => vec![src],
            Opcode::Store { value, dest } => vec![value, dest],
            Opcode::GetElementPtr { base, indices } => {
                let mut ops = vec![base];
                ops.extend(indices);
                ops
            }
            Opcode::BitCast { value }
            | Opcode::IntToPtr { value }
            | Opcode::Cast { value }
            | Opcode::Unary { value }
            | Opcode::CondBr { cond: value }
            | Opcode::Ret { value: Some(value) } => vec![value],
            Opcode::Phi { incoming } => incoming.iter().collect(),
            Opcode::Call { callee, args } => {
                let mut ops: Vec<&Operand> = args.iter().collect();
                if let Callee::Pointer(p) = callee {
                    ops.push(p);
                }
                ops
            }
            Opcode::Icmp { lhs, rhs } | Opcode::Fcmp { lhs, rhs } | Opcode::Binary { lhs, rhs } => {
                vec![lhs, rhs]
            }
            Opcode::Other { operands, .. } => operands.iter().collect(),
        }
    }

    pub fn mnemonic(&self) -> &str {
        match self {
            Opcode::Alloca => "alloca",
            Opcode::Load { .. } => "load",
            Opcode::Store { .. } => "store",
            Opcode::GetElementPtr { .. } => "getelementptr",
            Opcode::BitCast { .. } => "bitcast",
            Opcode::IntToPtr { .. } => "inttoptr",
            Opcode::Phi { .. } => "phi",
            Opcode::Call { .. } => "call",
            Opcode::Ret { .. } => "ret",
            Opcode::Br => "br",
            Opcode::CondBr { .. } => "br",
            Opcode::Icmp { .. } => "icmp",
            Opcode::Fcmp { .. } => "fcmp",
            Opcode::Cast { .. } => "cast",
            Opcode::Binary { .. } => "binop",
            Opcode::Unary { .. } => "unop",
            Opcode::Unreachable => "unreachable",
            Opcode::Other { name, .. } => name,
        }
    }
}

/// One SSA instruction: a result name, the opcode, and the result type.
/// Instructions without a result (stores, branches) still carry a name so
/// every instruction has an object identity.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Instruction {
    pub name: Arc<LocalName>,
    pub opcode: Opcode,
    pub ty: Type,
}

impl Instruction {
    pub fn new(name: Arc<LocalName>, opcode: Opcode, ty: Type) -> Self {
        Instruction { name, opcode, ty }
    }
}
