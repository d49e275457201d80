// SPDX-License-Identifier: BSD-3-Clause
//! May-alias / points-to analysis over an LLVM-style IR, reduced to a
//! Datalog fixed-point problem.
//!
//! The pieces, in dependency order:
//!
//! - [`datalog`]: a sorted Datalog intermediate representation (sorts,
//!   relations, facts, Horn clauses) with well-formedness checks.
//! - [`dsl`]: the [`dir_program!`] macro for authoring rule programs.
//! - [`ir`]: an analysis-amenable IR module model.
//! - [`object_map`]: dense numbering of IR values and the affiliated
//!   memory objects of allocation sites.
//! - [`facts`]: the fact generator walking an [`ir::Module`].
//! - [`backend`]: compilation of a program into bit-vector Horn clauses
//!   for Z3's fixed-point engine, and answer decoding.
//! - [`analysis`]: the façade tying it all together, with the Andersen
//!   rule set as data.

pub mod analysis;
pub mod backend;
pub mod datalog;
pub mod dsl;
pub mod facts;
pub mod ir;
pub mod object_map;

#[cfg(feature = "bitcode")]
pub mod cli;
#[cfg(feature = "bitcode")]
pub mod llvm;

pub use analysis::{Algorithm, AliasResult, AnalysisError, Options, PointerAnalysis};
pub use backend::{Engine, SolverError, Z3Backend};
pub use datalog::{Atom, Formula, Program, ProgramError, Relation, Sort, Term};
pub use facts::{FactError, FactGenerator};
pub use object_map::{ObjectMap, UnknownValue, ANY_OBJECT, NUM_SPECIAL_OBJECTS};
