// SPDX-License-Identifier: BSD-3-Clause
//! The solver backend: compiles a DIR program into a constraint system over
//! fixed-width bit-vectors, submits it to a Horn-clause fixed-point engine,
//! and decodes answer relations back into ground atoms.
//!
//! A sort of size `s` becomes a bit-vector sort of width `⌈log2 s⌉ + 1`;
//! every relation becomes a boolean-valued predicate over such sorts. A
//! ground atom becomes a body-less rule, and a Horn clause becomes
//! `∀ vars. body₁ ∧ … ∧ bodyₙ ⇒ head`.

use std::collections::HashMap;

use tracing::debug;

use crate::datalog::{Atom, Formula, Program, Term};

mod z3;

use z3::{Ast, Fixedpoint, QueryStatus, RelationRef, SortRef};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SolverError {
    /// The engine reported neither sat nor unsat.
    #[error("solver returned unknown: {0}")]
    Unknown(String),
    /// The engine's answer was not in the expected shape.
    #[error("solver protocol error: {0}")]
    Protocol(String),
    #[error("query for undeclared relation: {0}")]
    UnknownRelation(String),
}

/// A Horn-clause fixed-point engine: load a program, then ask for the full
/// extension of a relation in the least fixed point.
pub trait Engine {
    fn load(&mut self, program: &Program) -> Result<(), SolverError>;
    fn query(&mut self, relation_name: &str) -> Result<Vec<Atom>, SolverError>;
}

struct Loaded {
    engine: Fixedpoint,
    sorts: HashMap<String, SortRef>,
    relations: HashMap<String, RelationRef>,
    arities: HashMap<String, Vec<String>>,
}

/// Backend over Z3's fixedpoint (μZ) engine. `load` resets all state; an
/// instance is single-use per load but reusable across loads. Dropping it
/// releases the native context.
#[derive(Default)]
pub struct Z3Backend {
    loaded: Option<Loaded>,
}

impl Z3Backend {
    pub fn new() -> Self {
        Z3Backend::default()
    }
}

/// `⌈log2 size⌉ + 1`, written to avoid overflow near `u32::MAX`.
fn bit_width(size: u32) -> u32 {
    debug_assert!(size > 0);
    if size <= 1 {
        1
    } else {
        (size - 1).ilog2() + 2
    }
}

impl Engine for Z3Backend {
    fn load(&mut self, program: &Program) -> Result<(), SolverError> {
        self.loaded = None;
        let engine = Fixedpoint::new();

        let mut sorts = HashMap::new();
        for sort in program.sorts() {
            sorts.insert(
                sort.name().to_string(),
                engine.bv_sort(bit_width(sort.size())),
            );
        }

        let mut relations = HashMap::new();
        let mut arities = HashMap::new();
        for relation in program.relations() {
            let mut domain = Vec::with_capacity(relation.arity());
            for sort_name in relation.argument_sort_names() {
                domain.push(*sorts.get(sort_name).ok_or_else(|| {
                    SolverError::Protocol(format!(
                        "relation {} refers to undeclared sort {}",
                        relation.name(),
                        sort_name
                    ))
                })?);
            }
            relations.insert(
                relation.name().to_string(),
                engine.relation(relation.name(), &domain),
            );
            arities.insert(
                relation.name().to_string(),
                relation.argument_sort_names().to_vec(),
            );
        }

        let mut loaded = Loaded {
            engine,
            sorts,
            relations,
            arities,
        };

        let mut var_counter: u32 = 0;
        for (rule_counter, formula) in program.formulas().iter().enumerate() {
            let rule = compile_formula(&loaded, &mut var_counter, formula)?;
            let name = format!(
                "rule-{}-{}",
                formula.head().relation_name(),
                rule_counter
            );
            loaded.engine.add_rule(rule, &name);
        }
        debug!(
            rules = program.formulas().len(),
            relations = loaded.relations.len(),
            "loaded datalog program into the fixed-point engine"
        );

        self.loaded = Some(loaded);
        Ok(())
    }

    fn query(&mut self, relation_name: &str) -> Result<Vec<Atom>, SolverError> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| SolverError::Protocol("no program loaded".to_string()))?;
        let relation = *loaded
            .relations
            .get(relation_name)
            .ok_or_else(|| SolverError::UnknownRelation(relation_name.to_string()))?;

        match loaded.engine.query(relation) {
            QueryStatus::Unsat => Ok(Vec::new()),
            QueryStatus::Unknown(reason) => Err(SolverError::Unknown(reason)),
            QueryStatus::Sat => decode_answer(loaded, relation_name),
        }
    }
}

/// Compiles one formula into a (possibly quantified) Horn rule. Every
/// variable gets a fresh engine constant, sorted by the position of its
/// first occurrence.
fn compile_formula(
    loaded: &Loaded,
    var_counter: &mut u32,
    formula: &Formula,
) -> Result<Ast, SolverError> {
    let mut var_names: Vec<String> = Vec::new();
    let mut var_table: HashMap<String, Ast> = HashMap::new();

    for atom in std::iter::once(formula.head()).chain(formula.body().iter()) {
        let sort_names = loaded.arities.get(atom.relation_name()).ok_or_else(|| {
            SolverError::Protocol(format!("undeclared relation {}", atom.relation_name()))
        })?;
        for (term, sort_name) in atom.arguments().iter().zip(sort_names) {
            if let Term::Variable(v) = term {
                if !var_table.contains_key(v) {
                    let sort = loaded.sorts[sort_name];
                    let fresh = loaded
                        .engine
                        .fresh_const(&format!("V{}", var_counter), sort);
                    *var_counter += 1;
                    var_table.insert(v.clone(), fresh);
                    var_names.push(v.clone());
                }
            }
        }
    }

    let emit_atom = |atom: &Atom| -> Result<Ast, SolverError> {
        let sort_names = &loaded.arities[atom.relation_name()];
        let mut args = Vec::with_capacity(atom.arity());
        for (term, sort_name) in atom.arguments().iter().zip(sort_names) {
            args.push(match term {
                Term::Variable(v) => var_table[v],
                Term::Constant(c) => loaded
                    .engine
                    .bv_literal(u64::from(*c), loaded.sorts[sort_name]),
            });
        }
        Ok(loaded.engine.apply(loaded.relations[atom.relation_name()], &args))
    };

    let head = emit_atom(formula.head())?;
    let body = formula
        .body()
        .iter()
        .map(emit_atom)
        .collect::<Result<Vec<_>, _>>()?;

    let mut rule = head;
    if !body.is_empty() {
        rule = loaded.engine.implies(loaded.engine.and(&body), head);
    }
    if !var_names.is_empty() {
        let bound: Vec<Ast> = var_names.iter().map(|v| var_table[v]).collect();
        rule = loaded.engine.forall(&bound, rule);
    }
    Ok(rule)
}

/// Decodes the answer constraint for one relation. Two shapes are valid: a
/// single assignment (an equality or conjunction of equalities) and a
/// disjunction of such assignments.
fn decode_answer(loaded: &Loaded, relation_name: &str) -> Result<Vec<Atom>, SolverError> {
    let engine = &loaded.engine;
    let answer = engine.answer();

    let mut tuples = Vec::new();
    if engine.is_or(answer) {
        for disjunct in engine.app_args(answer) {
            tuples.push(parse_assignment(loaded, disjunct)?);
        }
    } else if engine.is_and(answer) || engine.is_eq(answer) {
        tuples.push(parse_assignment(loaded, answer)?);
    } else {
        return Err(SolverError::Protocol(format!(
            "answer for {} is neither an assignment nor a disjunction",
            relation_name
        )));
    }

    Ok(tuples
        .into_iter()
        .map(|args| Atom::new(relation_name, args))
        .collect())
}

/// Parses `(= var literal)` or a conjunction thereof into a tuple. The
/// equalities are taken in the order the engine printed them.
fn parse_assignment(loaded: &Loaded, clause: Ast) -> Result<Vec<Term>, SolverError> {
    let engine = &loaded.engine;
    let mut args = Vec::new();
    if engine.is_and(clause) {
        for equality in engine.app_args(clause) {
            args.push(parse_equality(loaded, equality)?);
        }
    } else if engine.is_eq(clause) {
        args.push(parse_equality(loaded, clause)?);
    } else {
        return Err(SolverError::Protocol(
            "assignment is neither an equality nor a conjunction".to_string(),
        ));
    }
    Ok(args)
}

fn parse_equality(loaded: &Loaded, equality: Ast) -> Result<Term, SolverError> {
    let engine = &loaded.engine;
    if !engine.is_eq(equality) {
        return Err(SolverError::Protocol(
            "expected an equality in the answer assignment".to_string(),
        ));
    }
    let parts = engine.app_args(equality);
    if parts.len() != 2 {
        return Err(SolverError::Protocol(
            "equality with unexpected arity".to_string(),
        ));
    }
    if !engine.is_var(parts[0]) {
        return Err(SolverError::Protocol(
            "left-hand side of an answer equality is not a variable".to_string(),
        ));
    }
    let value = engine.numeral_u64(parts[1]).ok_or_else(|| {
        SolverError::Protocol(
            "right-hand side of an answer equality is not a bit-vector literal".to_string(),
        )
    })?;
    let value = u32::try_from(value)
        .map_err(|_| SolverError::Protocol(format!("answer constant {} overflows", value)))?;
    Ok(Term::Constant(value))
}

#[cfg(test)]
mod tests {
    use super::bit_width;

    #[test]
    fn bit_widths_cover_the_domain() {
        assert_eq!(bit_width(1), 1);
        assert_eq!(bit_width(2), 2);
        assert_eq!(bit_width(255), 9);
        assert_eq!(bit_width(256), 9);
        assert_eq!(bit_width(257), 10);
        assert_eq!(bit_width(65535), 17);
        assert_eq!(bit_width(65536), 17);
    }
}
