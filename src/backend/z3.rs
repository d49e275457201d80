// SPDX-License-Identifier: BSD-3-Clause
//! A thin wrapper over the slice of the Z3 C API the backend needs: a
//! context, a fixedpoint engine, bit-vector sorts and literals, relation
//! declarations, universally quantified Horn rules, and enough AST
//! inspection to decode answer formulas.
//!
//! The safe `z3` crate does not expose the fixedpoint interface, so this
//! module binds `z3-sys` directly. All raw handles are owned by (and only
//! valid for the lifetime of) one [`Fixedpoint`]; the context is created
//! without manual AST reference counting, so every AST lives until the
//! engine is dropped.

use std::ffi::{CStr, CString};

use z3_sys::{
    Z3_ast, Z3_context, Z3_del_config, Z3_del_context, Z3_fixedpoint, Z3_fixedpoint_add_rule,
    Z3_fixedpoint_dec_ref, Z3_fixedpoint_get_answer, Z3_fixedpoint_get_reason_unknown,
    Z3_fixedpoint_inc_ref, Z3_fixedpoint_query_relations, Z3_fixedpoint_register_relation,
    Z3_func_decl, Z3_get_app_arg, Z3_get_app_decl, Z3_get_app_num_args, Z3_get_ast_kind,
    Z3_get_decl_kind, Z3_get_numeral_uint64, Z3_mk_and, Z3_mk_app, Z3_mk_bool_sort,
    Z3_mk_bv_sort, Z3_mk_config, Z3_mk_const, Z3_mk_context, Z3_mk_fixedpoint,
    Z3_mk_forall_const, Z3_mk_func_decl, Z3_mk_implies, Z3_mk_string_symbol,
    Z3_mk_unsigned_int64, Z3_sort, Z3_to_app,
};

// Values from z3_api.h, compared numerically so this file does not depend
// on how the bindings model the C enums.
const AST_KIND_NUMERAL: u32 = 0;
const AST_KIND_APP: u32 = 1;
const AST_KIND_VAR: u32 = 2;
const DECL_KIND_EQ: u32 = 0x102;
const DECL_KIND_AND: u32 = 0x105;
const DECL_KIND_OR: u32 = 0x106;
const LBOOL_FALSE: i32 = -1;
const LBOOL_TRUE: i32 = 1;

#[derive(Clone, Copy)]
pub(crate) struct SortRef(Z3_sort);

#[derive(Clone, Copy)]
pub(crate) struct RelationRef(Z3_func_decl);

#[derive(Clone, Copy)]
pub(crate) struct Ast(Z3_ast);

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum QueryStatus {
    Sat,
    Unsat,
    Unknown(String),
}

/// One Z3 context plus one fixedpoint engine.
pub(crate) struct Fixedpoint {
    ctx: Z3_context,
    fp: Z3_fixedpoint,
}

impl Fixedpoint {
    pub(crate) fn new() -> Self {
        unsafe {
            let cfg = Z3_mk_config().expect("Z3_mk_config returned null");
            let ctx = Z3_mk_context(cfg).expect("Z3_mk_context returned null");
            Z3_del_config(cfg);
            let fp = Z3_mk_fixedpoint(ctx).expect("Z3_mk_fixedpoint returned null");
            Z3_fixedpoint_inc_ref(ctx, fp);
            Fixedpoint { ctx, fp }
        }
    }

    fn symbol(&self, name: &str) -> z3_sys::Z3_symbol {
        // Z3 interns symbol strings, so the CString may drop afterwards.
        let c = CString::new(name).expect("symbol names never contain NUL");
        unsafe {
            Z3_mk_string_symbol(self.ctx, c.as_ptr()).expect("Z3_mk_string_symbol returned null")
        }
    }

    pub(crate) fn bv_sort(&self, width: u32) -> SortRef {
        SortRef(unsafe { Z3_mk_bv_sort(self.ctx, width).expect("Z3_mk_bv_sort returned null") })
    }

    /// Declares a boolean-valued predicate over the given domain and
    /// registers it as a fixedpoint relation.
    pub(crate) fn relation(&self, name: &str, domain: &[SortRef]) -> RelationRef {
        let sorts: Vec<Z3_sort> = domain.iter().map(|s| s.0).collect();
        unsafe {
            let range = Z3_mk_bool_sort(self.ctx).expect("Z3_mk_bool_sort returned null");
            let decl = Z3_mk_func_decl(
                self.ctx,
                self.symbol(name),
                sorts.len() as u32,
                sorts.as_ptr(),
                range,
            )
            .expect("Z3_mk_func_decl returned null");
            Z3_fixedpoint_register_relation(self.ctx, self.fp, decl);
            RelationRef(decl)
        }
    }

    pub(crate) fn bv_literal(&self, value: u64, sort: SortRef) -> Ast {
        Ast(unsafe {
            Z3_mk_unsigned_int64(self.ctx, value, sort.0)
                .expect("Z3_mk_unsigned_int64 returned null")
        })
    }

    pub(crate) fn fresh_const(&self, name: &str, sort: SortRef) -> Ast {
        Ast(unsafe {
            Z3_mk_const(self.ctx, self.symbol(name), sort.0).expect("Z3_mk_const returned null")
        })
    }

    pub(crate) fn apply(&self, relation: RelationRef, args: &[Ast]) -> Ast {
        let args: Vec<Z3_ast> = args.iter().map(|a| a.0).collect();
        Ast(unsafe {
            Z3_mk_app(self.ctx, relation.0, args.len() as u32, args.as_ptr())
                .expect("Z3_mk_app returned null")
        })
    }

    pub(crate) fn and(&self, conjuncts: &[Ast]) -> Ast {
        let args: Vec<Z3_ast> = conjuncts.iter().map(|a| a.0).collect();
        Ast(unsafe {
            Z3_mk_and(self.ctx, args.len() as u32, args.as_ptr()).expect("Z3_mk_and returned null")
        })
    }

    pub(crate) fn implies(&self, antecedent: Ast, consequent: Ast) -> Ast {
        Ast(unsafe {
            Z3_mk_implies(self.ctx, antecedent.0, consequent.0)
                .expect("Z3_mk_implies returned null")
        })
    }

    pub(crate) fn forall(&self, bound: &[Ast], body: Ast) -> Ast {
        let apps: Vec<z3_sys::Z3_app> = unsafe {
            bound
                .iter()
                .map(|a| Z3_to_app(self.ctx, a.0).expect("Z3_to_app returned null"))
                .collect()
        };
        Ast(unsafe {
            Z3_mk_forall_const(
                self.ctx,
                0,
                apps.len() as u32,
                apps.as_ptr(),
                0,
                std::ptr::null(),
                body.0,
            )
            .expect("Z3_mk_forall_const returned null")
        })
    }

    pub(crate) fn add_rule(&self, rule: Ast, name: &str) {
        unsafe { Z3_fixedpoint_add_rule(self.ctx, self.fp, rule.0, Some(self.symbol(name))) }
    }

    pub(crate) fn query(&self, relation: RelationRef) -> QueryStatus {
        let decls = [relation.0];
        let result = unsafe {
            Z3_fixedpoint_query_relations(self.ctx, self.fp, decls.len() as u32, decls.as_ptr())
        };
        match result as i32 {
            LBOOL_TRUE => QueryStatus::Sat,
            LBOOL_FALSE => QueryStatus::Unsat,
            _ => QueryStatus::Unknown(self.reason_unknown()),
        }
    }

    fn reason_unknown(&self) -> String {
        unsafe {
            let reason = Z3_fixedpoint_get_reason_unknown(self.ctx, self.fp);
            if reason.is_null() {
                String::from("unknown")
            } else {
                CStr::from_ptr(reason).to_string_lossy().into_owned()
            }
        }
    }

    pub(crate) fn answer(&self) -> Ast {
        Ast(unsafe {
            Z3_fixedpoint_get_answer(self.ctx, self.fp)
                .expect("Z3_fixedpoint_get_answer returned null")
        })
    }

    // ------------------------------------------------------------------
    // Answer inspection

    fn decl_kind(&self, ast: Ast) -> Option<u32> {
        unsafe {
            if Z3_get_ast_kind(self.ctx, ast.0) as u32 != AST_KIND_APP {
                return None;
            }
            let app = Z3_to_app(self.ctx, ast.0).expect("Z3_to_app returned null");
            let decl = Z3_get_app_decl(self.ctx, app).expect("Z3_get_app_decl returned null");
            Some(Z3_get_decl_kind(self.ctx, decl) as u32)
        }
    }

    pub(crate) fn is_and(&self, ast: Ast) -> bool {
        self.decl_kind(ast) == Some(DECL_KIND_AND)
    }

    pub(crate) fn is_or(&self, ast: Ast) -> bool {
        self.decl_kind(ast) == Some(DECL_KIND_OR)
    }

    pub(crate) fn is_eq(&self, ast: Ast) -> bool {
        self.decl_kind(ast) == Some(DECL_KIND_EQ)
    }

    /// A bound (answer) variable.
    pub(crate) fn is_var(&self, ast: Ast) -> bool {
        unsafe { Z3_get_ast_kind(self.ctx, ast.0) as u32 == AST_KIND_VAR }
    }

    pub(crate) fn app_args(&self, ast: Ast) -> Vec<Ast> {
        unsafe {
            if Z3_get_ast_kind(self.ctx, ast.0) as u32 != AST_KIND_APP {
                return Vec::new();
            }
            let app = Z3_to_app(self.ctx, ast.0).expect("Z3_to_app returned null");
            let n = Z3_get_app_num_args(self.ctx, app);
            (0..n)
                .map(|i| {
                    Ast(Z3_get_app_arg(self.ctx, app, i).expect("Z3_get_app_arg returned null"))
                })
                .collect()
        }
    }

    pub(crate) fn numeral_u64(&self, ast: Ast) -> Option<u64> {
        unsafe {
            if Z3_get_ast_kind(self.ctx, ast.0) as u32 != AST_KIND_NUMERAL {
                return None;
            }
            let mut out: u64 = 0;
            if Z3_get_numeral_uint64(self.ctx, ast.0, &mut out) {
                Some(out)
            } else {
                None
            }
        }
    }
}

impl Drop for Fixedpoint {
    fn drop(&mut self) {
        unsafe {
            Z3_fixedpoint_dec_ref(self.ctx, self.fp);
            Z3_del_context(self.ctx);
        }
    }
}
