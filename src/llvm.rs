// SPDX-License-Identifier: BSD-3-Clause
//! Conversion from parsed LLVM bitcode (`llvm_ir`) into the crate's own
//! analysis-amenable IR. Opcodes the analysis has no model for become
//! [`Opcode::Other`] and end up as `instrUnknown` facts; the conversion
//! itself only fails on structurally malformed modules.

use std::collections::HashSet;
use std::sync::Arc;

use llvm_ir::types::Typed;

use crate::ir::constant::{ConstExpr, Constant};
use crate::ir::instruction::{Callee, Instruction, Opcode, Operand};
use crate::ir::types::Type;
use crate::ir::{
    Block, Function, FunctionName, Global, GlobalName, LocalName, Module, Name, Parameter,
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("malformed LLVM module: {0}")]
pub struct ConversionError(pub String);

/// Converts a parsed bitcode module.
pub fn convert_module(m: &llvm_ir::Module) -> Result<Module, ConversionError> {
    let converter = Converter {
        types: &m.types,
        functions: m
            .functions
            .iter()
            .map(|f| f.name.as_str())
            .chain(m.func_declarations.iter().map(|f| f.name.as_str()))
            .collect(),
    };

    let mut module = Module::new(m.name.clone());
    for g in &m.global_vars {
        module.globals.push(converter.convert_global(g)?);
    }
    for f in &m.functions {
        module.functions.push(converter.convert_function(f)?);
    }
    for f in &m.func_declarations {
        module.functions.push(converter.convert_declaration(f));
    }
    Ok(module)
}

struct Converter<'m> {
    types: &'m llvm_ir::types::Types,
    /// Names of functions in the module; global references to these are
    /// function constants.
    functions: HashSet<&'m str>,
}

fn convert_name(name: &llvm_ir::Name) -> Name {
    match name {
        llvm_ir::Name::Name(s) => Name::Named((**s).clone()),
        llvm_ir::Name::Number(n) => Name::Number(*n),
    }
}

fn convert_type(ty: &llvm_ir::Type) -> Type {
    match ty {
        llvm_ir::Type::VoidType => Type::Void,
        llvm_ir::Type::IntegerType { bits } => Type::Integer { bits: *bits },
        llvm_ir::Type::PointerType { .. } => Type::Pointer,
        llvm_ir::Type::FPType(_) => Type::Float,
        llvm_ir::Type::ArrayType {
            element_type,
            num_elements,
        } => Type::Array {
            element: Box::new(convert_type(element_type)),
            len: *num_elements as u64,
        },
        llvm_ir::Type::VectorType {
            element_type,
            num_elements,
            ..
        } => Type::Array {
            element: Box::new(convert_type(element_type)),
            len: *num_elements as u64,
        },
        llvm_ir::Type::StructType { element_types, .. } => Type::Struct {
            fields: element_types.iter().map(|t| convert_type(t)).collect(),
        },
        llvm_ir::Type::NamedStructType { .. } => Type::Struct { fields: vec![] },
        // Function values are pointers for our purposes.
        llvm_ir::Type::FuncType { .. } => Type::Pointer,
        _ => Type::Void,
    }
}

impl Converter<'_> {
    fn convert_global(
        &self,
        g: &llvm_ir::module::GlobalVariable,
    ) -> Result<Global, ConversionError> {
        let pointee = match &*g.ty {
            llvm_ir::Type::PointerType { pointee_type, .. } => convert_type(pointee_type),
            other => convert_type(other),
        };
        let initializer = match &g.initializer {
            Some(init) => Some(self.convert_constant(init)?),
            None => None,
        };
        Ok(Global {
            name: GlobalName::new(convert_name(&g.name)),
            is_constant: g.is_constant,
            ty: pointee,
            initializer,
        })
    }

    fn convert_declaration(&self, f: &llvm_ir::function::FunctionDeclaration) -> Function {
        let name = FunctionName::from(f.name.as_str());
        Function {
            params: f
                .parameters
                .iter()
                .map(|p| Parameter {
                    name: LocalName::new(&name, convert_name(&p.name)),
                    ty: convert_type(&p.ty),
                })
                .collect(),
            ret_ty: convert_type(&f.return_type),
            blocks: vec![],
            name,
        }
    }

    fn convert_function(&self, f: &llvm_ir::Function) -> Result<Function, ConversionError> {
        let name = FunctionName::from(f.name.as_str());
        let params = f
            .parameters
            .iter()
            .map(|p| Parameter {
                name: LocalName::new(&name, convert_name(&p.name)),
                ty: convert_type(&p.ty),
            })
            .collect();
        let mut blocks = Vec::with_capacity(f.basic_blocks.len());
        for b in &f.basic_blocks {
            blocks.push(self.convert_block(&name, b)?);
        }
        Ok(Function {
            params,
            ret_ty: convert_type(&f.return_type),
            blocks,
            name,
        })
    }

    fn convert_block(
        &self,
        fname: &FunctionName,
        b: &llvm_ir::BasicBlock,
    ) -> Result<Block, ConversionError> {
        let block_name = convert_name(&b.name);
        let mut instrs = Vec::with_capacity(b.instrs.len() + 1);
        for (idx, i) in b.instrs.iter().enumerate() {
            // Result-less instructions still need an object identity; give
            // them a block-qualified synthetic name.
            let name = match i.try_get_result() {
                Some(result) => convert_name(result),
                None => Name::Named(format!("{}.{}", block_name, idx)),
            };
            instrs.push(Instruction::new(
                LocalName::new(fname, name),
                self.convert_instruction(fname, i)?,
                convert_type(&i.get_type(self.types)),
            ));
        }
        let term_name = match b.term.try_get_result() {
            Some(result) => convert_name(result),
            None => Name::Named(format!("{}.{}", block_name, b.instrs.len())),
        };
        instrs.push(Instruction::new(
            LocalName::new(fname, term_name),
            self.convert_terminator(fname, &b.term)?,
            convert_type(&b.term.get_type(self.types)),
        ));
        Ok(Block {
            name: block_name,
            instrs,
        })
    }

    fn convert_instruction(
        &self,
        fname: &FunctionName,
        i: &llvm_ir::Instruction,
    ) -> Result<Opcode, ConversionError> {
        use llvm_ir::Instruction as I;
        Ok(match i {
            I::Alloca(_) => Opcode::Alloca,
            I::Load(load) => Opcode::Load {
                src: self.convert_operand(fname, &load.address)?,
            },
            I::Store(store) => Opcode::Store {
                value: self.convert_operand(fname, &store.value)?,
                dest: self.convert_operand(fname, &store.address)?,
            },
            I::GetElementPtr(gep) => Opcode::GetElementPtr {
                base: self.convert_operand(fname, &gep.address)?,
                indices: gep
                    .indices
                    .iter()
                    .map(|x| self.convert_operand(fname, x))
                    .collect::<Result<_, _>>()?,
            },
            I::BitCast(cast) => Opcode::BitCast {
                value: self.convert_operand(fname, &cast.operand)?,
            },
            I::IntToPtr(cast) => Opcode::IntToPtr {
                value: self.convert_operand(fname, &cast.operand)?,
            },
            I::Phi(phi) => Opcode::Phi {
                incoming: phi
                    .incoming_values
                    .iter()
                    .map(|(op, _)| self.convert_operand(fname, op))
                    .collect::<Result<_, _>>()?,
            },
            I::Call(call) => self.convert_call(fname, call)?,
            I::ICmp(cmp) => Opcode::Icmp {
                lhs: self.convert_operand(fname, &cmp.operand0)?,
                rhs: self.convert_operand(fname, &cmp.operand1)?,
            },
            I::FCmp(cmp) => Opcode::Fcmp {
                lhs: self.convert_operand(fname, &cmp.operand0)?,
                rhs: self.convert_operand(fname, &cmp.operand1)?,
            },
            I::Trunc(c) => self.cast(fname, &c.operand)?,
            I::ZExt(c) => self.cast(fname, &c.operand)?,
            I::SExt(c) => self.cast(fname, &c.operand)?,
            I::FPTrunc(c) => self.cast(fname, &c.operand)?,
            I::FPExt(c) => self.cast(fname, &c.operand)?,
            I::FPToUI(c) => self.cast(fname, &c.operand)?,
            I::FPToSI(c) => self.cast(fname, &c.operand)?,
            I::UIToFP(c) => self.cast(fname, &c.operand)?,
            I::SIToFP(c) => self.cast(fname, &c.operand)?,
            I::Add(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::Sub(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::Mul(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::UDiv(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::SDiv(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::URem(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::SRem(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::And(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::Or(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::Xor(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::Shl(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::LShr(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::AShr(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::FAdd(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::FSub(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::FMul(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::FDiv(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::FRem(b) => self.binary(fname, &b.operand0, &b.operand1)?,
            I::FNeg(u) => Opcode::Unary {
                value: self.convert_operand(fname, &u.operand)?,
            },
            other => Opcode::Other {
                name: mnemonic(other).to_string(),
                operands: vec![],
            },
        })
    }

    fn cast(&self, fname: &FunctionName, op: &llvm_ir::Operand) -> Result<Opcode, ConversionError> {
        Ok(Opcode::Cast {
            value: self.convert_operand(fname, op)?,
        })
    }

    fn binary(
        &self,
        fname: &FunctionName,
        lhs: &llvm_ir::Operand,
        rhs: &llvm_ir::Operand,
    ) -> Result<Opcode, ConversionError> {
        Ok(Opcode::Binary {
            lhs: self.convert_operand(fname, lhs)?,
            rhs: self.convert_operand(fname, rhs)?,
        })
    }

    fn convert_call(
        &self,
        fname: &FunctionName,
        call: &llvm_ir::instruction::Call,
    ) -> Result<Opcode, ConversionError> {
        let Some(callee_op) = call.function.as_ref().right() else {
            return Ok(Opcode::Other {
                name: "inline assembly call".to_string(),
                operands: vec![],
            });
        };
        let callee = match callee_op {
            llvm_ir::Operand::ConstantOperand(c) => match &**c {
                llvm_ir::Constant::GlobalReference { name, .. } => {
                    Callee::Function(FunctionName::new(convert_name(name)))
                }
                _ => Callee::Pointer(self.convert_operand(fname, callee_op)?),
            },
            _ => Callee::Pointer(self.convert_operand(fname, callee_op)?),
        };
        let mut args = Vec::with_capacity(call.arguments.len());
        for (arg, _) in &call.arguments {
            // Debug intrinsics take metadata arguments; drop them.
            if matches!(arg, llvm_ir::Operand::MetadataOperand) {
                continue;
            }
            args.push(self.convert_operand(fname, arg)?);
        }
        Ok(Opcode::Call { callee, args })
    }

    fn convert_terminator(
        &self,
        fname: &FunctionName,
        t: &llvm_ir::Terminator,
    ) -> Result<Opcode, ConversionError> {
        use llvm_ir::Terminator as T;
        Ok(match t {
            T::Ret(ret) => Opcode::Ret {
                value: match &ret.return_operand {
                    Some(op) => Some(self.convert_operand(fname, op)?),
                    None => None,
                },
            },
            T::Br(_) => Opcode::Br,
            T::CondBr(br) => Opcode::CondBr {
                cond: self.convert_operand(fname, &br.condition)?,
            },
            T::Unreachable(_) => Opcode::Unreachable,
            other => Opcode::Other {
                name: terminator_mnemonic(other).to_string(),
                operands: vec![],
            },
        })
    }

    fn convert_operand(
        &self,
        fname: &FunctionName,
        op: &llvm_ir::Operand,
    ) -> Result<Operand, ConversionError> {
        match op {
            llvm_ir::Operand::LocalOperand { name, .. } => {
                Ok(Operand::Local(LocalName::new(fname, convert_name(name))))
            }
            llvm_ir::Operand::ConstantOperand(c) => Ok(Operand::Constant(self.convert_constant(c)?)),
            llvm_ir::Operand::MetadataOperand => Err(ConversionError(
                "metadata used as a value operand".to_string(),
            )),
        }
    }

    fn convert_constant(&self, c: &llvm_ir::ConstantRef) -> Result<Arc<Constant>, ConversionError> {
        use llvm_ir::Constant as C;
        Ok(match &**c {
            C::Int { bits, value } => Constant::int(*bits, *value),
            C::Float(_) => Arc::new(Constant::Float),
            C::Null(_) => Arc::new(Constant::Null),
            C::AggregateZero(_) => Arc::new(Constant::Struct(vec![])),
            C::Struct { values, .. } => Arc::new(Constant::Struct(
                values
                    .iter()
                    .map(|v| self.convert_constant(v))
                    .collect::<Result<_, _>>()?,
            )),
            C::Array { elements, .. } => Arc::new(Constant::Array(
                elements
                    .iter()
                    .map(|v| self.convert_constant(v))
                    .collect::<Result<_, _>>()?,
            )),
            C::Vector(elements) => Arc::new(Constant::Array(
                elements
                    .iter()
                    .map(|v| self.convert_constant(v))
                    .collect::<Result<_, _>>()?,
            )),
            C::Undef(ty) => Arc::new(Constant::Undef(convert_type(ty))),
            C::Poison(ty) => Arc::new(Constant::Undef(convert_type(ty))),
            C::BlockAddress => Arc::new(Constant::BlockAddress),
            C::GlobalReference { name, .. } => {
                let converted = convert_name(name);
                match converted.text() {
                    Some(s) if self.functions.contains(s) => {
                        Arc::new(Constant::Function(FunctionName::new(converted)))
                    }
                    _ => Arc::new(Constant::Global(GlobalName::new(converted))),
                }
            }
            C::GetElementPtr(gep) => Arc::new(Constant::Expr(ConstExpr::GetElementPtr {
                base: self.convert_constant(&gep.address)?,
            })),
            C::BitCast(cast) => Arc::new(Constant::Expr(ConstExpr::BitCast {
                value: self.convert_constant(&cast.operand)?,
            })),
            C::IntToPtr(cast) => Arc::new(Constant::Expr(ConstExpr::IntToPtr {
                value: self.convert_constant(&cast.operand)?,
            })),
            C::PtrToInt(cast) => Arc::new(Constant::Expr(ConstExpr::PtrToInt {
                value: self.convert_constant(&cast.operand)?,
            })),
            other => Arc::new(Constant::Expr(ConstExpr::Other {
                name: constant_mnemonic(other).to_string(),
                operands: vec![],
            })),
        })
    }
}

fn mnemonic(i: &llvm_ir::Instruction) -> &'static str {
    use llvm_ir::Instruction as I;
    match i {
        I::PtrToInt(_) => "ptrtoint",
        I::AddrSpaceCast(_) => "addrspacecast",
        I::Select(_) => "select",
        I::ExtractValue(_) => "extractvalue",
        I::InsertValue(_) => "insertvalue",
        I::ExtractElement(_) => "extractelement",
        I::InsertElement(_) => "insertelement",
        I::ShuffleVector(_) => "shufflevector",
        I::AtomicRMW(_) => "atomicrmw",
        I::CmpXchg(_) => "cmpxchg",
        I::Fence(_) => "fence",
        I::Freeze(_) => "freeze",
        I::VAArg(_) => "va_arg",
        I::LandingPad(_) => "landingpad",
        _ => "unsupported instruction",
    }
}

fn terminator_mnemonic(t: &llvm_ir::Terminator) -> &'static str {
    use llvm_ir::Terminator as T;
    match t {
        T::Switch(_) => "switch",
        T::IndirectBr(_) => "indirectbr",
        T::Invoke(_) => "invoke",
        T::Resume(_) => "resume",
        _ => "unsupported terminator",
    }
}

fn constant_mnemonic(c: &llvm_ir::Constant) -> &'static str {
    use llvm_ir::Constant as C;
    match c {
        C::Select(_) => "constant select",
        C::ICmp(_) => "constant icmp",
        _ => "constant expression",
    }
}
