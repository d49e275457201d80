// SPDX-License-Identifier: BSD-3-Clause
//! The Andersen (inclusion-based) points-to rules. The rules are data: the
//! façade clones the program this module builds and appends the generated
//! facts before loading the solver backend.
//!
//! Object `0` is the special "some unknown object"; anything the analysis
//! cannot resolve points there, and `0` points to itself so that loads
//! through unknown pointers stay unknown.

use crate::datalog::{Program, ProgramError};
use crate::dir_extend;

pub fn program() -> Result<Program, ProgramError> {
    let declarations = super::relations::declarations()?;
    dir_extend! {
        declarations;

        // Allocation sites seed the relation.
        pointsTo(p, m) <- hasAllocatedMemory(p, m);
        pointsTo(i, m) <- instrAlloca(i, m);
        pointsTo(i, m) <- intrinsicMalloc(i, m);

        // Copy-like value flow.
        pointsTo(i, o) <- instrBitCast(i, v), pointsTo(v, o);
        pointsTo(i, o) <- instrGetelementptr(i, b), pointsTo(b, o);
        pointsTo(i, o) <- instrPHI(i), hasOperand(i, v), pointsTo(v, o);

        // Loads and stores go through the pointed-to memory.
        pointsTo(i, o) <- instrLoad(i, s), pointsTo(s, m), pointsTo(m, o);
        pointsTo(m, o) <- instrStore(_, v, d), pointsTo(d, m), pointsTo(v, o);
        pointsTo(m, o) <- intrinsicMemcpy(_, d, s), pointsTo(d, m),
                          pointsTo(s, n), pointsTo(n, o);

        // Interprocedural flow through direct calls.
        pointsTo(formal, o) <- hasCallArgument(_, actual, formal), pointsTo(actual, o);
        pointsTo(i, o) <- instrCall(i, f), hasInstr(f, r), instrRet(r, v), pointsTo(v, o);

        // Global initializers fill the global's storage; aggregate
        // constants and their fields flow into each other.
        pointsTo(m, o) <- hasAllocatedMemory(g, m), hasInitializer(g, k), pointsTo(k, o);
        pointsTo(c, o) <- hasConstantField(c, f), pointsTo(f, o);
        pointsTo(f, o) <- hasConstantField(c, f), pointsTo(c, o);

        // The unknown object.
        fact pointsTo(0, 0);
        pointsTo(i, 0) <- instrIntToPtr(i, _);
        pointsTo(i, 0) <- instrUnknown(i);
        pointsTo(c, 0) <- undef(c);
        pointsTo(m, 0) <- hasAllocatedMemory(g, m), hasNoInitializer(g);

        // May-alias: two pointers sharing a pointee, or one that may point
        // anywhere.
        alias(x, y) <- pointsTo(x, o), pointsTo(y, o);
        alias(x, y) <- pointsTo(x, 0), pointsTo(y, o);
        alias(x, y) <- alias(y, x);
    }
}
