// SPDX-License-Identifier: BSD-3-Clause
//! A sorted Datalog intermediate representation.
//!
//! The language is a sorted subset of what bddbddb accepts:
//!
//! ```text
//! term    := constant | variable
//! atom    := R(term [, term]*)
//! formula := atom | atom :- atom [, atom]*
//! program := (formula .)+
//! ```
//!
//! A [`Program`] owns sort and relation declarations plus an ordered list of
//! formulas. Atoms are not checked at construction; all well-formedness
//! checks (declared relation, arity, sort ranges, range restriction) run
//! when a formula is admitted via [`Program::add_formula`].

use std::collections::BTreeMap;
use std::fmt::{self, Display, Write as _};

/// Default domain size for sorts declared without an explicit size.
pub const DEFAULT_SORT_SIZE: u32 = 65535;

/// Either a variable (a symbol) or an unsigned constant. Constants carry no
/// sort; the position in the enclosing atom determines it.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Term {
    Variable(String),
    Constant(u32),
}

impl Term {
    pub fn variable(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    pub fn constant(value: u32) -> Self {
        Term::Constant(value)
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(v) => write!(f, "{}", v),
            Term::Constant(c) => write!(f, "{}", c),
        }
    }
}

impl From<u32> for Term {
    fn from(value: u32) -> Self {
        Term::Constant(value)
    }
}

impl From<&str> for Term {
    fn from(name: &str) -> Self {
        Term::Variable(name.to_string())
    }
}

/// A named finite domain `[0, size)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sort {
    name: String,
    size: u32,
}

impl Sort {
    /// A sort with the default size.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_size(name, DEFAULT_SORT_SIZE)
    }

    pub fn with_size(name: impl Into<String>, size: u32) -> Self {
        debug_assert!(size > 0, "sorts must have positive size");
        Sort {
            name: name.into(),
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.size)
    }
}

/// A named, arity-k schema: an ordered list of sort names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    name: String,
    sort_names: Vec<String>,
}

impl Relation {
    pub fn new<S: Into<String>>(name: impl Into<String>, sort_names: Vec<S>) -> Self {
        Relation {
            name: name.into(),
            sort_names: sort_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.sort_names.len()
    }

    pub fn argument_sort_names(&self) -> &[String] {
        &self.sort_names
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, sort) in self.sort_names.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "V{}: {}", i, sort)?;
        }
        f.write_str(")")
    }
}

/// An application of a relation symbol to terms.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Atom {
    relation: String,
    args: Vec<Term>,
}

impl Atom {
    pub fn new(relation: impl Into<String>, args: Vec<Term>) -> Self {
        Atom {
            relation: relation.into(),
            args,
        }
    }

    pub fn relation_name(&self) -> &str {
        &self.relation
    }

    pub fn arguments(&self) -> &[Term] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Ground atoms have no variables.
    pub fn is_ground(&self) -> bool {
        self.args.iter().all(|t| !t.is_variable())
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.relation)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

/// Either a plain atom (a fact when ground, a query pattern otherwise) or a
/// Horn clause with a non-empty body. Body members are atoms by
/// construction; nesting clauses is unrepresentable.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Formula {
    Atom(Atom),
    Rule { head: Atom, body: Vec<Atom> },
}

impl Formula {
    pub fn fact(relation: impl Into<String>, args: Vec<Term>) -> Self {
        Formula::Atom(Atom::new(relation, args))
    }

    pub fn rule(head: Atom, body: Vec<Atom>) -> Self {
        debug_assert!(!body.is_empty(), "horn clauses need a non-empty body");
        Formula::Rule { head, body }
    }

    pub fn head(&self) -> &Atom {
        match self {
            Formula::Atom(atom) => atom,
            Formula::Rule { head, .. } => head,
        }
    }

    pub fn body(&self) -> &[Atom] {
        match self {
            Formula::Atom(_) => &[],
            Formula::Rule { body, .. } => body,
        }
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Formula::Atom(_))
    }

    /// Every atom of the formula, head first.
    pub(crate) fn atoms(&self) -> impl Iterator<Item = &Atom> {
        std::iter::once(self.head()).chain(self.body().iter())
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head())?;
        let body = self.body();
        if !body.is_empty() {
            f.write_str(" :- ")?;
            for (i, atom) in body.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", atom)?;
            }
        }
        Ok(())
    }
}

/// Failure modes of program construction and formula admission.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    #[error("duplicate sort: {0}")]
    DuplicateSort(String),
    #[error("duplicate relation: {0}")]
    DuplicateRelation(String),
    #[error("unknown relation: {0}")]
    UnknownRelation(String),
    #[error("relation {relation} refers to undeclared sort {sort}")]
    UnknownSort { relation: String, sort: String },
    #[error("atom of {relation} has {actual} arguments, expected {expected}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        actual: usize,
    },
    #[error("head variable {variable} of a {relation} clause does not appear in the body")]
    RangeUnrestricted { relation: String, variable: String },
    #[error(
        "constant {value} at position {position} of {relation} exceeds sort {sort} (size {size})"
    )]
    ConstantOutOfRange {
        relation: String,
        position: usize,
        value: u32,
        sort: String,
        size: u32,
    },
    #[error("name {0} is reserved (leading underscore)")]
    ReservedName(String),
    #[error("malformed atom: {0}")]
    MalformedAtom(String),
}

/// Sorts, relations, and an ordered sequence of formulas. Declaration maps
/// are keyed by name; formula order is immaterial for semantics but
/// preserved for printing and stable replay.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    sorts: BTreeMap<String, Sort>,
    relations: BTreeMap<String, Relation>,
    formulas: Vec<Formula>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn add_sort(&mut self, sort: Sort) -> Result<(), ProgramError> {
        if self.sorts.contains_key(sort.name()) {
            return Err(ProgramError::DuplicateSort(sort.name().to_string()));
        }
        self.sorts.insert(sort.name().to_string(), sort);
        Ok(())
    }

    /// Sorts referenced by the relation need not be declared yet; they must
    /// be by the time formulas over the relation are added.
    pub fn add_relation(&mut self, relation: Relation) -> Result<(), ProgramError> {
        if self.relations.contains_key(relation.name()) {
            return Err(ProgramError::DuplicateRelation(relation.name().to_string()));
        }
        self.relations
            .insert(relation.name().to_string(), relation);
        Ok(())
    }

    pub fn add_formula(&mut self, formula: Formula) -> Result<(), ProgramError> {
        for atom in formula.atoms() {
            self.check_atom(atom)?;
        }
        if let Formula::Rule { head, body } = &formula {
            for term in head.arguments() {
                if let Term::Variable(v) = term {
                    let in_body = body
                        .iter()
                        .flat_map(|atom| atom.arguments())
                        .any(|t| matches!(t, Term::Variable(b) if b == v));
                    if !in_body {
                        return Err(ProgramError::RangeUnrestricted {
                            relation: head.relation_name().to_string(),
                            variable: v.clone(),
                        });
                    }
                }
            }
        }
        self.formulas.push(formula);
        Ok(())
    }

    fn check_atom(&self, atom: &Atom) -> Result<(), ProgramError> {
        let relation = self
            .relations
            .get(atom.relation_name())
            .ok_or_else(|| ProgramError::UnknownRelation(atom.relation_name().to_string()))?;
        if atom.arity() != relation.arity() {
            return Err(ProgramError::ArityMismatch {
                relation: relation.name().to_string(),
                expected: relation.arity(),
                actual: atom.arity(),
            });
        }
        for (position, (term, sort_name)) in atom
            .arguments()
            .iter()
            .zip(relation.argument_sort_names())
            .enumerate()
        {
            let sort = self
                .sorts
                .get(sort_name)
                .ok_or_else(|| ProgramError::UnknownSort {
                    relation: relation.name().to_string(),
                    sort: sort_name.clone(),
                })?;
            if let Term::Constant(value) = term {
                if *value >= sort.size() {
                    return Err(ProgramError::ConstantOutOfRange {
                        relation: relation.name().to_string(),
                        position,
                        value: *value,
                        sort: sort_name.clone(),
                        size: sort.size(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn has_sort(&self, name: &str) -> bool {
        self.sorts.contains_key(name)
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn get_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn sorts(&self) -> impl Iterator<Item = &Sort> {
        self.sorts.values()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    pub fn formulas(&self) -> &[Formula] {
        &self.formulas
    }

    /// Parses the printed form of a ground atom (`R(1, 2)`) under this
    /// program's schema. The result is admitted through the same checks as
    /// [`Program::add_formula`], so parsing the rendering of an admitted
    /// fact yields an equal atom.
    pub fn parse_ground_atom(&self, text: &str) -> Result<Atom, ProgramError> {
        let text = text.trim();
        let malformed = || ProgramError::MalformedAtom(text.to_string());
        let open = text.find('(').ok_or_else(malformed)?;
        let close = text.rfind(')').ok_or_else(malformed)?;
        if close != text.len() - 1 || open == 0 {
            return Err(malformed());
        }
        let relation = &text[..open];
        let inner = text[open + 1..close].trim();
        let mut args = Vec::new();
        if !inner.is_empty() {
            for piece in inner.split(',') {
                let value: u32 = piece.trim().parse().map_err(|_| malformed())?;
                args.push(Term::Constant(value));
            }
        }
        let atom = Atom::new(relation, args);
        self.check_atom(&atom)?;
        Ok(atom)
    }

    /// The canonical engine-ingest rendering (bddbddb syntax): relation
    /// schemas carry `printtuples` and every formula ends with a period.
    pub fn to_engine_string(&self) -> String {
        let mut out = String::new();
        for sort in self.sorts.values() {
            let _ = writeln!(out, "{}", sort);
        }
        let _ = writeln!(out);
        for relation in self.relations.values() {
            let _ = writeln!(out, "{} printtuples", relation);
        }
        let _ = writeln!(out);
        for formula in &self.formulas {
            let _ = writeln!(out, "{}.", formula);
        }
        out
    }
}

/// The debug rendering: the engine form without `printtuples` markers and
/// terminating periods.
impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sort in self.sorts.values() {
            writeln!(f, "{}", sort)?;
        }
        writeln!(f)?;
        for relation in self.relations.values() {
            writeln!(f, "{}", relation)?;
        }
        writeln!(f)?;
        for formula in &self.formulas {
            writeln!(f, "{}", formula)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_program() -> Program {
        let mut program = Program::new();
        program.add_sort(Sort::with_size("V", 16)).unwrap();
        program
            .add_relation(Relation::new("edge", vec!["V", "V"]))
            .unwrap();
        program
            .add_relation(Relation::new("path", vec!["V", "V"]))
            .unwrap();
        program
    }

    #[test]
    fn duplicate_sort_rejected() {
        let mut program = graph_program();
        assert_eq!(
            program.add_sort(Sort::new("V")),
            Err(ProgramError::DuplicateSort("V".to_string()))
        );
    }

    #[test]
    fn duplicate_relation_rejected() {
        let mut program = graph_program();
        assert_eq!(
            program.add_relation(Relation::new("edge", vec!["V"])),
            Err(ProgramError::DuplicateRelation("edge".to_string()))
        );
    }

    #[test]
    fn unknown_relation_rejected() {
        let mut program = graph_program();
        let fact = Formula::fact("vertex", vec![Term::constant(1)]);
        assert_eq!(
            program.add_formula(fact),
            Err(ProgramError::UnknownRelation("vertex".to_string()))
        );
    }

    #[test]
    fn arity_mismatch_rejected() {
        let mut program = graph_program();
        let fact = Formula::fact("edge", vec![Term::constant(1)]);
        assert_eq!(
            program.add_formula(fact),
            Err(ProgramError::ArityMismatch {
                relation: "edge".to_string(),
                expected: 2,
                actual: 1,
            })
        );
    }

    #[test]
    fn range_restriction_enforced() {
        let mut program = graph_program();
        let clause = Formula::rule(
            Atom::new("path", vec![Term::variable("x"), Term::variable("y")]),
            vec![Atom::new(
                "edge",
                vec![Term::variable("x"), Term::variable("x")],
            )],
        );
        assert_eq!(
            program.add_formula(clause),
            Err(ProgramError::RangeUnrestricted {
                relation: "path".to_string(),
                variable: "y".to_string(),
            })
        );
    }

    #[test]
    fn constants_checked_against_sort_size() {
        let mut program = graph_program();
        let fact = Formula::fact("edge", vec![Term::constant(3), Term::constant(16)]);
        assert_eq!(
            program.add_formula(fact),
            Err(ProgramError::ConstantOutOfRange {
                relation: "edge".to_string(),
                position: 1,
                value: 16,
                sort: "V".to_string(),
                size: 16,
            })
        );
    }

    #[test]
    fn undeclared_sort_caught_at_admission() {
        let mut program = Program::new();
        program
            .add_relation(Relation::new("vertex", vec!["V"]))
            .unwrap();
        let fact = Formula::fact("vertex", vec![Term::constant(0)]);
        assert_eq!(
            program.add_formula(fact),
            Err(ProgramError::UnknownSort {
                relation: "vertex".to_string(),
                sort: "V".to_string(),
            })
        );
    }

    #[test]
    fn debug_rendering() {
        let mut program = graph_program();
        program
            .add_formula(Formula::fact(
                "edge",
                vec![Term::constant(1), Term::constant(2)],
            ))
            .unwrap();
        program
            .add_formula(Formula::rule(
                Atom::new("path", vec![Term::variable("x"), Term::variable("z")]),
                vec![
                    Atom::new("path", vec![Term::variable("x"), Term::variable("y")]),
                    Atom::new("edge", vec![Term::variable("y"), Term::variable("z")]),
                ],
            ))
            .unwrap();
        let expected = "\
V 16

edge(V0: V, V1: V)
path(V0: V, V1: V)

edge(1, 2)
path(x, z) :- path(x, y), edge(y, z)
";
        assert_eq!(program.to_string(), expected);
    }

    #[test]
    fn engine_rendering() {
        let mut program = graph_program();
        program
            .add_formula(Formula::fact(
                "edge",
                vec![Term::constant(1), Term::constant(2)],
            ))
            .unwrap();
        let expected = "\
V 16

edge(V0: V, V1: V) printtuples
path(V0: V, V1: V) printtuples

edge(1, 2).
";
        assert_eq!(program.to_engine_string(), expected);
    }

    #[test]
    fn ground_atom_round_trip() {
        let mut program = graph_program();
        let fact = Formula::fact("edge", vec![Term::constant(7), Term::constant(3)]);
        program.add_formula(fact.clone()).unwrap();
        let printed = fact.to_string();
        let reparsed = program.parse_ground_atom(&printed).unwrap();
        assert_eq!(&reparsed, fact.head());
    }

    #[test]
    fn parse_rejects_out_of_schema_atoms() {
        let program = graph_program();
        assert!(matches!(
            program.parse_ground_atom("edge(1)"),
            Err(ProgramError::ArityMismatch { .. })
        ));
        assert!(matches!(
            program.parse_ground_atom("nope(1, 2)"),
            Err(ProgramError::UnknownRelation(_))
        ));
        assert!(matches!(
            program.parse_ground_atom("edge(1, x)"),
            Err(ProgramError::MalformedAtom(_))
        ));
    }
}
