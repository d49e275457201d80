// SPDX-License-Identifier: BSD-3-Clause
//! An embedded DSL for authoring DIR programs.
//!
//! [`dir_program!`] evaluates to `Result<Program, ProgramError>`:
//!
//! ```
//! use datalog_aa::dir_program;
//!
//! let program = dir_program! {
//!     sort V = 16;
//!
//!     rel vertex(V);
//!     rel edge(V, V);
//!     rel path(V, V);
//!
//!     path(x, x) <- vertex(x);
//!     path(x, y) <- edge(x, y);
//!     path(x, z) <- path(x, y), path(y, z);
//!
//!     fact vertex(1);
//!     fact vertex(2);
//!     fact edge(1, 2);
//! }
//! .unwrap();
//! assert_eq!(program.formulas().len(), 6);
//! ```
//!
//! Identifiers in argument position are variables, integer literals are
//! constants, and `_` is a wildcard that expands to a fresh variable each
//! time it appears. Names starting with an underscore are reserved for the
//! wildcard supply and rejected.

use crate::datalog::{Atom, Formula, Program, ProgramError, Relation, Sort, Term};

/// Accumulates one program under construction; used by [`dir_program!`].
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
    wildcards: u32,
}

fn check_name(name: &str) -> Result<(), ProgramError> {
    if name.starts_with('_') {
        return Err(ProgramError::ReservedName(name.to_string()));
    }
    Ok(())
}

impl ProgramBuilder {
    pub fn new() -> Self {
        ProgramBuilder::default()
    }

    /// Continues building on top of an existing program (used by
    /// [`dir_extend!`](crate::dir_extend) to append rule fragments to a
    /// declaration base).
    pub fn resume(program: Program) -> Self {
        ProgramBuilder {
            program,
            wildcards: 0,
        }
    }

    pub fn sort(&mut self, name: &str, size: u32) -> Result<(), ProgramError> {
        check_name(name)?;
        self.program.add_sort(Sort::with_size(name, size))
    }

    pub fn sort_with_default_size(&mut self, name: &str) -> Result<(), ProgramError> {
        check_name(name)?;
        self.program.add_sort(Sort::new(name))
    }

    pub fn relation(&mut self, name: &str, sort_names: &[&str]) -> Result<(), ProgramError> {
        check_name(name)?;
        self.program
            .add_relation(Relation::new(name, sort_names.to_vec()))
    }

    pub fn variable(&self, name: &str) -> Result<Term, ProgramError> {
        check_name(name)?;
        Ok(Term::variable(name))
    }

    /// A fresh, never-reused variable; freshness is local to this builder.
    pub fn wildcard(&mut self) -> Term {
        let term = Term::variable(format!("_{}", self.wildcards));
        self.wildcards += 1;
        term
    }

    pub fn fact(&mut self, relation: &str, args: Vec<Term>) -> Result<(), ProgramError> {
        self.program.add_formula(Formula::fact(relation, args))
    }

    pub fn rule(&mut self, head: Atom, body: Vec<Atom>) -> Result<(), ProgramError> {
        self.program.add_formula(Formula::rule(head, body))
    }

    pub fn finish(self) -> Program {
        self.program
    }
}

#[macro_export]
macro_rules! dir_program {
    ($($t:tt)*) => {
        (|| -> ::std::result::Result<$crate::datalog::Program, $crate::datalog::ProgramError> {
            #[allow(unused_mut)]
            let mut __builder = $crate::dsl::ProgramBuilder::new();
            $crate::__dir_program!(__builder; $($t)*);
            ::std::result::Result::Ok(__builder.finish())
        })()
    };
}

/// Like [`dir_program!`], but extends an existing [`Program`] instead of
/// starting from an empty one.
#[macro_export]
macro_rules! dir_extend {
    ($program:expr; $($t:tt)*) => {
        (|| -> ::std::result::Result<$crate::datalog::Program, $crate::datalog::ProgramError> {
            #[allow(unused_mut)]
            let mut __builder = $crate::dsl::ProgramBuilder::resume($program);
            $crate::__dir_program!(__builder; $($t)*);
            ::std::result::Result::Ok(__builder.finish())
        })()
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __dir_program {
    ($b:ident;) => {};
    ($b:ident; sort $name:ident = $size:expr ; $($rest:tt)*) => {
        $b.sort(stringify!($name), $size)?;
        $crate::__dir_program!($b; $($rest)*);
    };
    ($b:ident; sort $name:ident ; $($rest:tt)*) => {
        $b.sort_with_default_size(stringify!($name))?;
        $crate::__dir_program!($b; $($rest)*);
    };
    ($b:ident; rel $name:ident ( $($sort:ident),* $(,)? ) ; $($rest:tt)*) => {
        $b.relation(stringify!($name), &[$(stringify!($sort)),*])?;
        $crate::__dir_program!($b; $($rest)*);
    };
    ($b:ident; fact $name:ident ( $($arg:tt),* $(,)? ) ; $($rest:tt)*) => {
        {
            let __args = vec![$($crate::__dir_term!($b; $arg)),*];
            $b.fact(stringify!($name), __args)?;
        }
        $crate::__dir_program!($b; $($rest)*);
    };
    ($b:ident;
     $head:ident ( $($harg:tt),* $(,)? ) <-
     $( $brel:ident ( $($barg:tt),* $(,)? ) ),+ ;
     $($rest:tt)*) => {
        {
            let __head_args = vec![$($crate::__dir_term!($b; $harg)),*];
            let __head = $crate::datalog::Atom::new(stringify!($head), __head_args);
            let __body = vec![$({
                let __args = vec![$($crate::__dir_term!($b; $barg)),*];
                $crate::datalog::Atom::new(stringify!($brel), __args)
            }),+];
            $b.rule(__head, __body)?;
        }
        $crate::__dir_program!($b; $($rest)*);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __dir_term {
    ($b:ident; _) => {
        $b.wildcard()
    };
    ($b:ident; $var:ident) => {
        $b.variable(stringify!($var))?
    };
    ($b:ident; $constant:literal) => {
        $crate::datalog::Term::constant($constant)
    };
}

#[cfg(test)]
mod tests {
    use crate::datalog::{ProgramError, Term};

    #[test]
    fn graph_program_renders() {
        let program = dir_program! {
            sort V = 16;

            rel vertex(V);
            rel edge(V, V);
            rel path(V, V);

            path(x, x) <- vertex(x);
            path(x, y) <- edge(x, y);
            path(x, z) <- path(x, y), path(y, z);

            fact vertex(1);
            fact vertex(2);
            fact vertex(3);

            fact edge(1, 2);
            fact edge(2, 3);
        }
        .unwrap();

        let expected = "\
V 16

edge(V0: V, V1: V)
path(V0: V, V1: V)
vertex(V0: V)

path(x, x) :- vertex(x)
path(x, y) :- edge(x, y)
path(x, z) :- path(x, y), path(y, z)
vertex(1)
vertex(2)
vertex(3)
edge(1, 2)
edge(2, 3)
";
        assert_eq!(program.to_string(), expected);
    }

    #[test]
    fn default_sort_size() {
        let program = dir_program! {
            sort obj;
            rel mem(obj);
        }
        .unwrap();
        assert_eq!(
            program.sorts().next().unwrap().size(),
            crate::datalog::DEFAULT_SORT_SIZE
        );
    }

    #[test]
    fn wildcards_are_fresh() {
        let program = dir_program! {
            sort V = 8;
            rel edge(V, V);
            rel reaches(V);

            reaches(x) <- edge(x, _), edge(_, x);
        }
        .unwrap();

        let body = program.formulas()[0].body();
        let first = &body[0].arguments()[1];
        let second = &body[1].arguments()[0];
        assert_eq!(first, &Term::variable("_0"));
        assert_eq!(second, &Term::variable("_1"));
    }

    #[test]
    fn reserved_relation_name_rejected() {
        let result = dir_program! {
            sort V = 8;
            rel _edge(V, V);
        };
        assert_eq!(
            result.unwrap_err(),
            ProgramError::ReservedName("_edge".to_string())
        );
    }

    #[test]
    fn reserved_variable_name_rejected() {
        let result = dir_program! {
            sort V = 8;
            rel edge(V, V);
            edge(_x, _x) <- edge(_x, _x);
        };
        assert_eq!(
            result.unwrap_err(),
            ProgramError::ReservedName("_x".to_string())
        );
    }

    #[test]
    fn facts_go_through_admission() {
        let result = dir_program! {
            sort V = 4;
            rel vertex(V);
            fact vertex(4);
        };
        assert!(matches!(
            result.unwrap_err(),
            ProgramError::ConstantOutOfRange { value: 4, .. }
        ));
    }
}
