// SPDX-License-Identifier: BSD-3-Clause
//! The analysis façade: ties rule fragments, fact generation, and the
//! solver backend together, and answers alias queries over the
//! materialised relations.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{self, Display};
use std::io::{self, Write};

use tracing::debug;

use crate::backend::{Engine, SolverError, Z3Backend};
use crate::datalog::{Atom, Formula, Program, ProgramError, Term};
use crate::facts::{FactError, FactGenerator};
use crate::ir::instruction::Opcode;
use crate::ir::{Module, Value};
use crate::object_map::{ObjectMap, UnknownValue};

pub mod andersen;
pub mod relations;

/// The analysis rule set to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "bitcode", derive(clap::ValueEnum))]
pub enum Algorithm {
    #[default]
    Andersen,
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Andersen => write!(f, "andersen"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Options {
    pub algorithm: Algorithm,
}

/// Three-valued answer for whether two pointers can refer to overlapping
/// memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AliasResult {
    NoAlias,
    MayAlias,
    MustAlias,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Facts(#[from] FactError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Value(#[from] UnknownValue),
}

/// One analysis run over one module: owns the object map, the loaded
/// program, and the materialised relations.
pub struct PointerAnalysis<'m> {
    module: &'m Module,
    objects: ObjectMap,
    program: Program,
    points_to: BTreeSet<(u32, u32)>,
    alias_pairs: BTreeSet<(u32, u32)>,
    points_to_sets: BTreeMap<u32, BTreeSet<u32>>,
    /// `mem` facts in emission order.
    addressable: Vec<u32>,
    functions: HashSet<u32>,
    constant_globals: HashMap<u32, bool>,
    allocas: HashSet<u32>,
}

impl<'m> PointerAnalysis<'m> {
    pub fn new(module: &'m Module) -> Result<Self, AnalysisError> {
        Self::with_options(module, &Options::default())
    }

    pub fn with_options(module: &'m Module, opts: &Options) -> Result<Self, AnalysisError> {
        let mut program = match opts.algorithm {
            Algorithm::Andersen => andersen::program()?,
        };

        let mut generator = FactGenerator::new(module);
        generator.generate(&mut program)?;
        let objects = generator.into_objects();

        let mut backend = Z3Backend::new();
        backend.load(&program)?;
        let points_to = materialise(backend.query(relations::POINTS_TO)?)?;
        let alias_pairs = materialise(backend.query(relations::ALIAS)?)?;
        debug!(
            points_to = points_to.len(),
            alias = alias_pairs.len(),
            "materialised analysis relations"
        );

        let mut points_to_sets: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        for (pointer, pointee) in &points_to {
            points_to_sets.entry(*pointer).or_default().insert(*pointee);
        }

        let addressable = program
            .formulas()
            .iter()
            .filter_map(|f| match f {
                Formula::Atom(atom) if atom.relation_name() == relations::MEM => {
                    match atom.arguments() {
                        [Term::Constant(id)] => Some(*id),
                        _ => None,
                    }
                }
                _ => None,
            })
            .collect();

        let mut functions = HashSet::new();
        let mut constant_globals = HashMap::new();
        let mut allocas = HashSet::new();
        for global in &module.globals {
            let id = objects.object_id(&Value::from(global))?;
            constant_globals.insert(id, global.is_constant);
        }
        for function in &module.functions {
            functions.insert(objects.object_id(&Value::from(function))?);
            for block in &function.blocks {
                for instr in &block.instrs {
                    if let Opcode::Alloca = instr.opcode {
                        allocas.insert(objects.object_id(&Value::from(instr))?);
                    }
                }
            }
        }

        Ok(PointerAnalysis {
            module,
            objects,
            program,
            points_to,
            alias_pairs,
            points_to_sets,
            addressable,
            functions,
            constant_globals,
            allocas,
        })
    }

    pub fn objects(&self) -> &ObjectMap {
        &self.objects
    }

    /// The loaded program: rules plus generated facts.
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn points_to(&self) -> &BTreeSet<(u32, u32)> {
        &self.points_to
    }

    pub fn points_to_set(&self, value: &Value) -> Result<BTreeSet<u32>, UnknownValue> {
        let id = self.objects.object_id(value)?;
        Ok(self.points_to_sets.get(&id).cloned().unwrap_or_default())
    }

    /// `MustAlias` for a value and itself, `MayAlias` when the solved alias
    /// relation contains the pair, `NoAlias` otherwise.
    pub fn alias(&self, a: &Value, b: &Value) -> Result<AliasResult, UnknownValue> {
        if a == b {
            return Ok(AliasResult::MustAlias);
        }
        let id_a = self.objects.object_id(a)?;
        let id_b = self.objects.object_id(b)?;
        if id_a == id_b {
            return Ok(AliasResult::MustAlias);
        }
        if self.alias_pairs.contains(&(id_a, id_b)) || self.alias_pairs.contains(&(id_b, id_a)) {
            return Ok(AliasResult::MayAlias);
        }
        Ok(AliasResult::NoAlias)
    }

    /// Whether `loc` can only refer to constant memory. Functions and
    /// constant globals qualify; stack slots qualify when `or_local` is
    /// set; the unknown object never does.
    pub fn points_to_constant_memory(
        &self,
        loc: &Value,
        or_local: bool,
    ) -> Result<bool, UnknownValue> {
        let id = self.objects.object_id(loc)?;
        match loc {
            Value::Function(_) => return Ok(true),
            Value::Global(name) => {
                return Ok(self
                    .module
                    .global(name)
                    .map(|g| g.is_constant)
                    .unwrap_or(false));
            }
            _ => {}
        }
        let Some(pointees) = self.points_to_sets.get(&id) else {
            return Ok(true);
        };
        for pointee in pointees {
            let Some((_, distance)) = self.objects.main_value_of(*pointee) else {
                // A special object, or nothing we can attribute.
                return Ok(false);
            };
            let site = *pointee - distance;
            let ok = self.functions.contains(&site)
                || self.constant_globals.get(&site).copied().unwrap_or(false)
                || (or_local && self.allocas.contains(&site));
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Renders the addressable objects and the points-to relation in the
    /// fixture format.
    pub fn print_points_to(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "================== all addressable objects")?;
        for id in &self.addressable {
            writeln!(out, "{}", self.objects.display(*id))?;
        }
        writeln!(out, "================== all addressable objects")?;
        writeln!(out, "================== points-to relation")?;
        for (pointer, pointee) in &self.points_to {
            writeln!(
                out,
                "{} -> {}",
                self.objects.display(*pointer),
                self.objects.display(*pointee)
            )?;
        }
        writeln!(out, "================== points-to relation")?;
        Ok(())
    }
}

fn materialise(atoms: Vec<Atom>) -> Result<BTreeSet<(u32, u32)>, AnalysisError> {
    let mut pairs = BTreeSet::new();
    for atom in atoms {
        match atom.arguments() {
            [Term::Constant(a), Term::Constant(b)] => {
                pairs.insert((*a, *b));
            }
            _ => {
                return Err(AnalysisError::Solver(SolverError::Protocol(format!(
                    "non-binary or non-ground tuple in {}",
                    atom.relation_name()
                ))));
            }
        }
    }
    Ok(pairs)
}
