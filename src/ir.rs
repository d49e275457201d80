// SPDX-License-Identifier: BSD-3-Clause
//! An IR module representation that is amenable to analysis: every value is
//! `Clone + Hash + Eq`, locals are qualified by their function, and
//! constants are structural. The fact generator consumes this read-only
//! view; the optional `bitcode` feature converts `llvm_ir` modules into it.

use std::fmt::{self, Display};
use std::sync::Arc;

pub mod constant;
mod name;
pub mod types;
pub use name::*;
pub mod instruction;

use constant::Constant;
use instruction::Instruction;
use types::Type;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Global {
    pub name: GlobalName,
    /// Whether the global's memory is constant-qualified.
    pub is_constant: bool,
    /// The pointee type; the global value itself is a pointer to it.
    pub ty: Type,
    pub initializer: Option<Arc<Constant>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: Arc<LocalName>,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub name: Name,
    pub instrs: Vec<Instruction>,
}

impl Block {
    pub fn new(name: impl Into<Name>, instrs: Vec<Instruction>) -> Self {
        Block {
            name: name.into(),
            instrs,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub name: FunctionName,
    pub params: Vec<Parameter>,
    pub ret_ty: Type,
    /// Empty for declarations.
    pub blocks: Vec<Block>,
}

impl Function {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_intrinsic(&self) -> bool {
        self.name.starts_with("llvm.")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, name: &FunctionName) -> Option<&Function> {
        self.functions.iter().find(|f| &f.name == name)
    }

    pub fn global(&self, name: &GlobalName) -> Option<&Global> {
        self.globals.iter().find(|g| &g.name == name)
    }
}

/// The identity of a value for object numbering. Global and function
/// references that occur as constants canonicalise to the defining value,
/// so an address-of-global operand and the global itself share one object.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Value {
    Global(GlobalName),
    Function(FunctionName),
    Local(Arc<LocalName>),
    Constant(Arc<Constant>),
}

impl Value {
    pub fn of_constant(c: &Arc<Constant>) -> Value {
        match &**c {
            Constant::Global(g) => Value::Global(g.clone()),
            Constant::Function(f) => Value::Function(f.clone()),
            _ => Value::Constant(c.clone()),
        }
    }

    pub fn of_operand(op: &instruction::Operand) -> Value {
        match op {
            instruction::Operand::Local(l) => Value::Local(l.clone()),
            instruction::Operand::Constant(c) => Value::of_constant(c),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Global(g) => write!(f, "{}", g),
            Value::Function(name) => write!(f, "{}", name),
            Value::Local(l) => write!(f, "{}", l),
            Value::Constant(c) => write!(f, "<constant {}>", c),
        }
    }
}

impl From<&Global> for Value {
    fn from(g: &Global) -> Self {
        Value::Global(g.name.clone())
    }
}

impl From<&Function> for Value {
    fn from(f: &Function) -> Self {
        Value::Function(f.name.clone())
    }
}

impl From<&Instruction> for Value {
    fn from(i: &Instruction) -> Self {
        Value::Local(i.name.clone())
    }
}

impl From<&Parameter> for Value {
    fn from(p: &Parameter) -> Self {
        Value::Local(p.name.clone())
    }
}
