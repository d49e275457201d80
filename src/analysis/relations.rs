// SPDX-License-Identifier: BSD-3-Clause
//! The relation schema shared by the fact generator and the analysis rule
//! fragments. Both sides name relations through these constants; the rules
//! must declare every one of them.

use crate::datalog::{Program, ProgramError};
use crate::dir_program;

/// The single sort: object IDs handed out by the object map.
pub const SORT_OBJ: &str = "obj";

pub const POINTS_TO: &str = "pointsTo";
pub const ALIAS: &str = "alias";

pub const FUNCTION: &str = "function";
pub const GLOBAL: &str = "global";
pub const CONSTANT: &str = "constant";
pub const INSTR: &str = "instr";
pub const MEM: &str = "mem";

pub const HAS_INSTR: &str = "hasInstr";
pub const HAS_OPERAND: &str = "hasOperand";
pub const HAS_ALLOCATED_MEMORY: &str = "hasAllocatedMemory";
pub const HAS_INITIALIZER: &str = "hasInitializer";
pub const HAS_NO_INITIALIZER: &str = "hasNoInitializer";
pub const HAS_CONSTANT_FIELD: &str = "hasConstantField";

pub const IMMUTABLE: &str = "immutable";
pub const NONADDRESSABLE: &str = "nonaddressable";
pub const NONPOINTER: &str = "nonpointer";
pub const UNDEF: &str = "undef";
pub const NULL: &str = "null";

pub const INSTR_ALLOCA: &str = "instrAlloca";
pub const INSTR_GETELEMENTPTR: &str = "instrGetelementptr";
pub const INSTR_LOAD: &str = "instrLoad";
pub const INSTR_STORE: &str = "instrStore";
pub const INSTR_RET: &str = "instrRet";
pub const INSTR_BITCAST: &str = "instrBitCast";
pub const INSTR_INTTOPTR: &str = "instrIntToPtr";
pub const INSTR_PHI: &str = "instrPHI";
pub const INSTR_CALL: &str = "instrCall";
pub const INSTR_UNKNOWN: &str = "instrUnknown";
pub const HAS_CALL_ARGUMENT: &str = "hasCallArgument";

pub const INTRINSIC_MALLOC: &str = "intrinsicMalloc";
pub const INTRINSIC_MEMCPY: &str = "intrinsicMemcpy";

/// All relation names, for schema checks.
pub const ALL: &[&str] = &[
    POINTS_TO,
    ALIAS,
    FUNCTION,
    GLOBAL,
    CONSTANT,
    INSTR,
    MEM,
    HAS_INSTR,
    HAS_OPERAND,
    HAS_ALLOCATED_MEMORY,
    HAS_INITIALIZER,
    HAS_NO_INITIALIZER,
    HAS_CONSTANT_FIELD,
    IMMUTABLE,
    NONADDRESSABLE,
    NONPOINTER,
    UNDEF,
    NULL,
    INSTR_ALLOCA,
    INSTR_GETELEMENTPTR,
    INSTR_LOAD,
    INSTR_STORE,
    INSTR_RET,
    INSTR_BITCAST,
    INSTR_INTTOPTR,
    INSTR_PHI,
    INSTR_CALL,
    INSTR_UNKNOWN,
    HAS_CALL_ARGUMENT,
    INTRINSIC_MALLOC,
    INTRINSIC_MEMCPY,
];

/// The sort and relation declarations, without any rules or facts.
pub fn declarations() -> Result<Program, ProgramError> {
    dir_program! {
        sort obj;

        rel pointsTo(obj, obj);
        rel alias(obj, obj);

        rel function(obj);
        rel global(obj);
        rel constant(obj);
        rel instr(obj);
        rel mem(obj);

        rel hasInstr(obj, obj);
        rel hasOperand(obj, obj);
        rel hasAllocatedMemory(obj, obj);
        rel hasInitializer(obj, obj);
        rel hasNoInitializer(obj);
        rel hasConstantField(obj, obj);

        rel immutable(obj);
        rel nonaddressable(obj);
        rel nonpointer(obj);
        rel undef(obj);
        rel null(obj);

        rel instrAlloca(obj, obj);
        rel instrGetelementptr(obj, obj);
        rel instrLoad(obj, obj);
        rel instrStore(obj, obj, obj);
        rel instrRet(obj, obj);
        rel instrBitCast(obj, obj);
        rel instrIntToPtr(obj, obj);
        rel instrPHI(obj);
        rel instrCall(obj, obj);
        rel instrUnknown(obj);
        rel hasCallArgument(obj, obj, obj);

        rel intrinsicMalloc(obj, obj);
        rel intrinsicMemcpy(obj, obj, obj);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_relation_is_declared() {
        let program = declarations().unwrap();
        assert!(program.has_sort(SORT_OBJ));
        for name in ALL {
            assert!(program.has_relation(name), "missing relation {}", name);
        }
        assert_eq!(program.relations().count(), ALL.len());
    }
}
