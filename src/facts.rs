// SPDX-License-Identifier: BSD-3-Clause
//! Fact generation: walks an IR module and appends DIR facts describing its
//! structure and per-instruction semantics.
//!
//! The generator runs in two phases. Phase 1 numbers every value (and the
//! affiliated memory objects of allocation sites) in a deterministic walk
//! order: globals, then functions, then per function arguments, blocks,
//! instructions, and operands. Phase 2 emits facts against those numbers.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::analysis::relations as rel;
use crate::datalog::{Formula, Program, ProgramError, Term};
use crate::ir::constant::{ConstExpr, Constant};
use crate::ir::instruction::{Callee, Instruction, Opcode, Operand};
use crate::ir::{Function, Global, Module, Value};
use crate::object_map::{ObjectMap, UnknownValue};

#[derive(Debug, thiserror::Error)]
pub enum FactError {
    #[error("unsupported constant: {0}")]
    UnsupportedConstant(String),
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    UnknownValue(#[from] UnknownValue),
}

/// Calls to library and compiler intrinsics the analysis has a model for.
/// Matchers are tried in order; the first match wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Intrinsic {
    /// Heap allocators: the call returns a fresh memory object.
    Malloc,
    /// Copies the contents of one pointed-to object into another.
    Memcpy,
    /// Calls with no effect on points-to state.
    NoEffect,
}

const INTRINSICS: [Intrinsic; 3] = [Intrinsic::Malloc, Intrinsic::Memcpy, Intrinsic::NoEffect];

const NO_EFFECT_CALLS: &[&str] = &[
    "free",
    "printf",
    "fprintf",
    "__isoc99_scanf",
    "scanf",
    "fflush",
    "feof",
    "_IO_getc",
    "tolower",
    "fclose",
    "exit",
];

impl Intrinsic {
    /// Whether this matcher recognises the callee; on a match, how many
    /// affiliated objects the call site needs.
    fn try_match(&self, callee: &Function) -> Option<u32> {
        let name = callee.name.text()?;
        match self {
            Intrinsic::Malloc => {
                let name_match = matches!(name, "malloc" | "calloc" | "realloc" | "fopen");
                let takes_size = callee.params.first().is_some_and(|p| p.ty.is_integer());
                (name_match && takes_size && callee.ret_ty.is_pointer()).then_some(1)
            }
            Intrinsic::Memcpy => {
                let name_match = name.starts_with("llvm.memcpy.")
                    || name.starts_with("llvm.memmove.")
                    || matches!(name, "strncpy" | "strcpy");
                (name_match && callee.params.len() >= 2).then_some(0)
            }
            Intrinsic::NoEffect => NO_EFFECT_CALLS.contains(&name).then_some(0),
        }
    }

    fn first_match(callee: &Function) -> Option<(Intrinsic, u32)> {
        INTRINSICS
            .iter()
            .find_map(|i| i.try_match(callee).map(|affiliated| (*i, affiliated)))
    }
}

/// Numbers the values of one module and emits the facts the analysis rules
/// consume.
pub struct FactGenerator<'m> {
    module: &'m Module,
    objects: ObjectMap,
    /// Constants lowered so far (by object ID); each constant is lowered
    /// once per module.
    lowered: HashSet<u32>,
    unsupported: Vec<String>,
}

impl<'m> FactGenerator<'m> {
    pub fn new(module: &'m Module) -> Self {
        let mut gen = FactGenerator {
            module,
            objects: ObjectMap::new(),
            lowered: HashSet::new(),
            unsupported: Vec::new(),
        };
        gen.number_module();
        for (id, value) in gen.objects.iter() {
            trace!(id, %value, "numbered object");
        }
        gen
    }

    pub fn objects(&self) -> &ObjectMap {
        &self.objects
    }

    pub fn into_objects(self) -> ObjectMap {
        self.objects
    }

    /// Mnemonics of instructions that fell through to `instrUnknown`.
    pub fn unsupported_instructions(&self) -> &[String] {
        &self.unsupported
    }

    // ------------------------------------------------------------------
    // Phase 1: object numbering

    fn number_module(&mut self) {
        for global in &self.module.globals {
            // A global variable and its storage are distinct objects; the
            // former is a pointer to the latter.
            self.objects.add_value(&Value::from(global), 1);
            if let Some(init) = &global.initializer {
                self.number_constant(init);
            }
        }
        for function in &self.module.functions {
            self.number_function(function);
        }
    }

    fn number_function(&mut self, function: &Function) {
        // The function value is a pointer; its affiliate is the code
        // object it points to.
        self.objects.add_value(&Value::from(function), 1);
        for param in &function.params {
            self.objects.add_value(&Value::from(param), 0);
        }
        for block in &function.blocks {
            for instr in &block.instrs {
                let affiliated = self.affiliated_count(instr);
                self.objects.add_value(&Value::from(instr), affiliated);
                for op in instr.opcode.operands() {
                    match op {
                        Operand::Constant(c) => self.number_constant(c),
                        Operand::Local(l) => {
                            self.objects.add_value(&Value::Local(l.clone()), 0);
                        }
                    }
                }
            }
        }
    }

    fn number_constant(&mut self, constant: &Arc<Constant>) {
        let value = Value::of_constant(constant);
        // Function references keep their code-object affiliate no matter
        // where they are first seen (a vtable-like initializer can mention
        // a function before the function walk reaches it).
        let affiliated = match value {
            Value::Function(_) | Value::Global(_) => 1,
            _ => 0,
        };
        self.objects.add_value(&value, affiliated);
        for op in constant.operands() {
            self.number_constant(op);
        }
    }

    fn affiliated_count(&self, instr: &Instruction) -> u32 {
        if let Opcode::Call { callee, .. } = &instr.opcode {
            if let Callee::Function(name) = callee {
                if let Some(callee_fn) = self.module.function(name) {
                    if let Some((_, affiliated)) = Intrinsic::first_match(callee_fn) {
                        return affiliated;
                    }
                }
            }
        }
        match instr.opcode {
            // alloca creates a frame object
            Opcode::Alloca => 1,
            _ => 0,
        }
    }

    // ------------------------------------------------------------------
    // Phase 2: fact emission

    pub fn generate(&mut self, program: &mut Program) -> Result<(), FactError> {
        self.lowered.clear();
        for global in &self.module.globals {
            self.global_facts(program, global)?;
        }
        for function in &self.module.functions {
            self.function_facts(program, function)?;
        }
        Ok(())
    }

    fn global_facts(&mut self, program: &mut Program, global: &Global) -> Result<(), FactError> {
        let global_id = self.objects.object_id(&Value::from(global))?;
        let mem_id = self.objects.affiliated_object_id(global_id, 1);

        fact(program, rel::GLOBAL, &[global_id])?;
        // The pointer to a global is immutable and has no address itself;
        // the storage behind it is addressable.
        fact(program, rel::IMMUTABLE, &[global_id])?;
        fact(program, rel::NONADDRESSABLE, &[global_id])?;
        fact(program, rel::MEM, &[mem_id])?;
        fact(program, rel::HAS_ALLOCATED_MEMORY, &[global_id, mem_id])?;
        if global.is_constant {
            fact(program, rel::IMMUTABLE, &[mem_id])?;
        }

        match &global.initializer {
            Some(init) => {
                self.constant_facts(program, init)?;
                let init_id = self.objects.object_id(&Value::of_constant(init))?;
                fact(program, rel::HAS_INITIALIZER, &[global_id, init_id])?;
            }
            None => {
                // External definition; the storage holds who-knows-what.
                fact(program, rel::HAS_NO_INITIALIZER, &[global_id])?;
            }
        }
        Ok(())
    }

    fn function_facts(
        &mut self,
        program: &mut Program,
        function: &Function,
    ) -> Result<(), FactError> {
        let function_id = self.objects.object_id(&Value::from(function))?;
        let code_id = self.objects.affiliated_object_id(function_id, 1);

        fact(program, rel::FUNCTION, &[function_id])?;
        fact(program, rel::MEM, &[code_id])?;
        fact(program, rel::HAS_ALLOCATED_MEMORY, &[function_id, code_id])?;
        // Both the function pointer and the code object are immutable; only
        // the code object is addressable.
        fact(program, rel::IMMUTABLE, &[function_id])?;
        fact(program, rel::IMMUTABLE, &[code_id])?;
        fact(program, rel::NONADDRESSABLE, &[function_id])?;

        for param in &function.params {
            let param_id = self.objects.object_id(&Value::from(param))?;
            fact(program, rel::NONADDRESSABLE, &[param_id])?;
            fact(program, rel::IMMUTABLE, &[param_id])?;
        }

        for block in &function.blocks {
            for instr in &block.instrs {
                self.instruction_facts(program, function_id, instr)?;
            }
        }
        Ok(())
    }

    fn instruction_facts(
        &mut self,
        program: &mut Program,
        function_id: u32,
        instr: &Instruction,
    ) -> Result<(), FactError> {
        let instr_id = self.objects.object_id(&Value::from(instr))?;

        if instr.ty.is_integer() || instr.ty.is_float() {
            fact(program, rel::NONPOINTER, &[instr_id])?;
        }

        fact(program, rel::HAS_INSTR, &[function_id, instr_id])?;
        fact(program, rel::INSTR, &[instr_id])?;
        // SSA: results are written once and have no address.
        fact(program, rel::IMMUTABLE, &[instr_id])?;
        fact(program, rel::NONADDRESSABLE, &[instr_id])?;

        for op in instr.opcode.operands() {
            let op_id = self.operand_id(op)?;
            fact(program, rel::HAS_OPERAND, &[instr_id, op_id])?;
            if let Operand::Constant(c) = op {
                self.constant_facts(program, c)?;
            }
        }

        match &instr.opcode {
            Opcode::Alloca => {
                let mem_id = self.objects.affiliated_object_id(instr_id, 1);
                fact(program, rel::MEM, &[mem_id])?;
                fact(program, rel::INSTR_ALLOCA, &[instr_id, mem_id])?;
            }
            Opcode::GetElementPtr { base, .. } => {
                let base_id = self.operand_id(base)?;
                fact(program, rel::INSTR_GETELEMENTPTR, &[instr_id, base_id])?;
            }
            Opcode::Load { src } => {
                let src_id = self.operand_id(src)?;
                fact(program, rel::INSTR_LOAD, &[instr_id, src_id])?;
            }
            Opcode::Store { value, dest } => {
                let value_id = self.operand_id(value)?;
                let dest_id = self.operand_id(dest)?;
                fact(program, rel::INSTR_STORE, &[instr_id, value_id, dest_id])?;
            }
            Opcode::Ret { value: Some(value) } => {
                let value_id = self.operand_id(value)?;
                fact(program, rel::INSTR_RET, &[instr_id, value_id])?;
            }
            Opcode::Ret { value: None } => {}
            Opcode::BitCast { value } => {
                let value_id = self.operand_id(value)?;
                fact(program, rel::INSTR_BITCAST, &[instr_id, value_id])?;
            }
            Opcode::IntToPtr { value } => {
                // The only way to conjure a pointer from an integer; the
                // rules treat the result as pointing anywhere.
                let value_id = self.operand_id(value)?;
                fact(program, rel::INSTR_INTTOPTR, &[instr_id, value_id])?;
            }
            Opcode::Phi { .. } => {
                // Incoming values are covered by hasOperand.
                fact(program, rel::INSTR_PHI, &[instr_id])?;
            }
            Opcode::Call { callee, args } => {
                self.call_facts(program, instr_id, callee, args)?;
            }
            // Flow-insensitive: branches carry no pointer information.
            Opcode::Br | Opcode::CondBr { .. } => {}
            Opcode::Icmp { .. }
            | Opcode::Fcmp { .. }
            | Opcode::Cast { .. }
            | Opcode::Binary { .. }
            | Opcode::Unary { .. }
            | Opcode::Unreachable => {}
            Opcode::Other { .. } => {
                self.unknown_instruction(program, instr_id, instr.opcode.mnemonic())?;
            }
        }
        Ok(())
    }

    fn call_facts(
        &mut self,
        program: &mut Program,
        instr_id: u32,
        callee: &Callee,
        args: &[Operand],
    ) -> Result<(), FactError> {
        let name = match callee {
            Callee::Function(name) => name,
            // Calls through pointers are not resolved.
            Callee::Pointer(_) => {
                return self.unknown_instruction(program, instr_id, "indirect call")
            }
        };
        let Some(callee_fn) = self.module.function(name) else {
            return self.unknown_instruction(program, instr_id, "call outside module");
        };

        if callee_fn.is_declaration() || callee_fn.is_intrinsic() {
            match Intrinsic::first_match(callee_fn) {
                Some((Intrinsic::Malloc, _)) => {
                    let mem_id = self.objects.affiliated_object_id(instr_id, 1);
                    fact(program, rel::MEM, &[mem_id])?;
                    fact(program, rel::INTRINSIC_MALLOC, &[instr_id, mem_id])?;
                }
                Some((Intrinsic::Memcpy, _)) => {
                    let (Some(dest), Some(src)) = (args.first(), args.get(1)) else {
                        return self.unknown_instruction(program, instr_id, "short memcpy");
                    };
                    let dest_id = self.operand_id(dest)?;
                    let src_id = self.operand_id(src)?;
                    fact(program, rel::INTRINSIC_MEMCPY, &[instr_id, dest_id, src_id])?;
                }
                Some((Intrinsic::NoEffect, _)) => {}
                None => {
                    return self.unknown_instruction(program, instr_id, "unmodelled declaration")
                }
            }
        } else {
            let function_id = self.objects.object_id(&Value::from(callee_fn))?;
            fact(program, rel::INSTR_CALL, &[instr_id, function_id])?;
            debug_assert!(
                args.len() >= callee_fn.params.len(),
                "call with fewer actuals than formals"
            );
            for (actual, formal) in args.iter().zip(&callee_fn.params) {
                let actual_id = self.operand_id(actual)?;
                let formal_id = self.objects.object_id(&Value::from(formal))?;
                fact(
                    program,
                    rel::HAS_CALL_ARGUMENT,
                    &[instr_id, actual_id, formal_id],
                )?;
            }
        }
        Ok(())
    }

    fn constant_facts(
        &mut self,
        program: &mut Program,
        constant: &Arc<Constant>,
    ) -> Result<(), FactError> {
        let id = self.objects.object_id(&Value::of_constant(constant))?;
        if !self.lowered.insert(id) {
            return Ok(());
        }

        // Structurally equal constants share one object, so this is
        // conservative for aliasing.
        fact(program, rel::CONSTANT, &[id])?;
        fact(program, rel::IMMUTABLE, &[id])?;
        fact(program, rel::NONADDRESSABLE, &[id])?;
        if constant.is_integer_typed() || constant.is_float_typed() {
            fact(program, rel::NONPOINTER, &[id])?;
        }

        for op in constant.operands() {
            self.constant_facts(program, op)?;
        }

        match &**constant {
            Constant::Array(fields) | Constant::Struct(fields) => {
                // An aggregate and its fields alias each other.
                for field in fields {
                    let field_id = self.objects.object_id(&Value::of_constant(field))?;
                    fact(program, rel::HAS_CONSTANT_FIELD, &[id, field_id])?;
                }
            }
            Constant::Expr(expr) => self.constant_expr_facts(program, id, expr)?,
            Constant::Undef(ty) => {
                if ty.is_pointer() {
                    fact(program, rel::UNDEF, &[id])?;
                }
            }
            Constant::Null => {
                fact(program, rel::NULL, &[id])?;
            }
            // Globals and functions get their facts from the module walk.
            Constant::Global(_) | Constant::Function(_) => {}
            Constant::Int { .. } | Constant::Float => {}
            Constant::BlockAddress => {
                return Err(FactError::UnsupportedConstant(constant.to_string()));
            }
        }
        Ok(())
    }

    /// A constant expression is an instruction in disguise; it gets the
    /// same structural and opcode facts.
    fn constant_expr_facts(
        &mut self,
        program: &mut Program,
        id: u32,
        expr: &ConstExpr,
    ) -> Result<(), FactError> {
        fact(program, rel::INSTR, &[id])?;
        for op in expr.operands() {
            let op_id = self.objects.object_id(&Value::of_constant(op))?;
            fact(program, rel::HAS_OPERAND, &[id, op_id])?;
        }
        match expr {
            ConstExpr::GetElementPtr { base } => {
                let base_id = self.objects.object_id(&Value::of_constant(base))?;
                fact(program, rel::INSTR_GETELEMENTPTR, &[id, base_id])?;
            }
            ConstExpr::BitCast { value } => {
                let value_id = self.objects.object_id(&Value::of_constant(value))?;
                fact(program, rel::INSTR_BITCAST, &[id, value_id])?;
            }
            ConstExpr::IntToPtr { value } => {
                let value_id = self.objects.object_id(&Value::of_constant(value))?;
                fact(program, rel::INSTR_INTTOPTR, &[id, value_id])?;
            }
            ConstExpr::PtrToInt { .. } => {
                self.unknown_instruction(program, id, "ptrtoint")?;
            }
            ConstExpr::Other { name, .. } => {
                self.unknown_instruction(program, id, name)?;
            }
        }
        Ok(())
    }

    fn unknown_instruction(
        &mut self,
        program: &mut Program,
        id: u32,
        what: &str,
    ) -> Result<(), FactError> {
        warn!(
            instruction = %self.objects.display(id),
            what,
            "unsupported instruction"
        );
        self.unsupported.push(format!("{}", self.objects.display(id)));
        fact(program, rel::INSTR_UNKNOWN, &[id])?;
        Ok(())
    }

    fn operand_id(&self, op: &Operand) -> Result<u32, UnknownValue> {
        self.objects.object_id(&Value::of_operand(op))
    }
}

fn fact(program: &mut Program, relation: &str, args: &[u32]) -> Result<(), ProgramError> {
    program.add_formula(Formula::fact(
        relation,
        args.iter().copied().map(Term::constant).collect(),
    ))
}
