// SPDX-License-Identifier: BSD-3-Clause
// End-to-end scenarios: build small IR modules, run the full analysis
// (fact generation, Z3 fixed point, materialisation), and check the
// answers. Requires libz3 at link time, like every solver-backed test.

use datalog_aa::analysis::{AliasResult, PointerAnalysis};
use datalog_aa::ir::constant::Constant;
use datalog_aa::ir::instruction::{Callee, Instruction, Opcode, Operand};
use datalog_aa::ir::types::Type;
use datalog_aa::ir::{
    Block, Function, FunctionName, Global, GlobalName, LocalName, Module, Parameter, Value,
};

// ------------------------------------------------------------------
// Helpers

fn function(
    name: &str,
    params: Vec<(&str, Type)>,
    ret_ty: Type,
    body: Vec<Instruction>,
) -> Function {
    let fname = FunctionName::from(name);
    Function {
        params: params
            .into_iter()
            .map(|(p, ty)| Parameter {
                name: LocalName::new(&fname, p),
                ty,
            })
            .collect(),
        ret_ty,
        blocks: if body.is_empty() {
            vec![]
        } else {
            vec![Block::new("entry", body)]
        },
        name: fname,
    }
}

fn instr(function: &str, name: &str, opcode: Opcode, ty: Type) -> Instruction {
    Instruction::new(
        LocalName::new(&FunctionName::from(function), name),
        opcode,
        ty,
    )
}

fn local(function: &str, name: &str) -> Operand {
    Operand::Local(LocalName::new(&FunctionName::from(function), name))
}

fn value(function: &str, name: &str) -> Value {
    Value::Local(LocalName::new(&FunctionName::from(function), name))
}

fn ret_void(function: &str, name: &str) -> Instruction {
    instr(function, name, Opcode::Ret { value: None }, Type::Void)
}

fn id(analysis: &PointerAnalysis<'_>, v: &Value) -> u32 {
    analysis.objects().object_id(v).unwrap()
}

// ------------------------------------------------------------------
// Scenarios

#[test]
fn stack_self_alias() {
    let mut module = Module::new("stack_self_alias");
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr("f", "p", Opcode::Alloca, Type::Pointer),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let p = value("f", "p");
    assert_eq!(analysis.alias(&p, &p).unwrap(), AliasResult::MustAlias);
    let p_id = id(&analysis, &p);
    assert!(analysis.points_to().contains(&(p_id, p_id + 1)));
}

#[test]
fn store_then_load() {
    let mut module = Module::new("store_then_load");
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr("f", "p", Opcode::Alloca, Type::Pointer),
            instr("f", "q", Opcode::Alloca, Type::Pointer),
            instr(
                "f",
                "s",
                Opcode::Store {
                    value: local("f", "q"),
                    dest: local("f", "p"),
                },
                Type::Void,
            ),
            instr(
                "f",
                "r",
                Opcode::Load {
                    src: local("f", "p"),
                },
                Type::Pointer,
            ),
            ret_void("f", "t"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let (p, q, r) = (value("f", "p"), value("f", "q"), value("f", "r"));
    let (p_id, q_id, r_id) = (id(&analysis, &p), id(&analysis, &q), id(&analysis, &r));
    let points_to = analysis.points_to();
    assert!(points_to.contains(&(p_id, p_id + 1)));
    assert!(points_to.contains(&(q_id, q_id + 1)));
    // The store fills the slot behind %p with %q's slot.
    assert!(points_to.contains(&(p_id + 1, q_id + 1)));
    // The load reads it back.
    assert!(points_to.contains(&(r_id, q_id + 1)));

    assert_eq!(analysis.alias(&q, &r).unwrap(), AliasResult::MayAlias);
    assert_eq!(analysis.alias(&p, &q).unwrap(), AliasResult::NoAlias);
}

#[test]
fn malloc_intrinsic() {
    let mut module = Module::new("malloc_intrinsic");
    module.functions.push(function(
        "malloc",
        vec![("size", Type::Integer { bits: 64 })],
        Type::Pointer,
        vec![],
    ));
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr(
                "f",
                "h",
                Opcode::Call {
                    callee: Callee::Function(FunctionName::from("malloc")),
                    args: vec![Operand::Constant(Constant::int(64, 16))],
                },
                Type::Pointer,
            ),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let h_id = id(&analysis, &value("f", "h"));
    assert!(analysis.points_to().contains(&(h_id, h_id + 1)));
    let rendered = analysis.program().to_string();
    assert!(rendered.contains(&format!("intrinsicMalloc({}, {})", h_id, h_id + 1)));
    assert!(rendered.contains(&format!("mem({})", h_id + 1)));
}

#[test]
fn direct_call_argument_passing() {
    let mut module = Module::new("direct_call");
    module.functions.push(function(
        "g",
        vec![("x", Type::Pointer)],
        Type::Void,
        vec![ret_void("g", "r")],
    ));
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr("f", "a", Opcode::Alloca, Type::Pointer),
            instr(
                "f",
                "c",
                Opcode::Call {
                    callee: Callee::Function(FunctionName::from("g")),
                    args: vec![local("f", "a")],
                },
                Type::Void,
            ),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let a_id = id(&analysis, &value("f", "a"));
    let x_id = id(&analysis, &value("g", "x"));
    let c_id = id(&analysis, &value("f", "c"));
    let rendered = analysis.program().to_string();
    assert!(rendered.contains(&format!("hasCallArgument({}, {}, {})", c_id, a_id, x_id)));
    // The formal argument inherits the actual's points-to set.
    assert!(analysis.points_to().contains(&(x_id, a_id + 1)));
    assert_eq!(
        analysis.alias(&value("g", "x"), &value("f", "a")).unwrap(),
        AliasResult::MayAlias
    );
}

#[test]
fn returned_pointers_flow_to_the_call() {
    let mut module = Module::new("call_return");
    module.functions.push(function(
        "mk",
        vec![],
        Type::Pointer,
        vec![
            instr("mk", "p", Opcode::Alloca, Type::Pointer),
            instr(
                "mk",
                "r",
                Opcode::Ret {
                    value: Some(local("mk", "p")),
                },
                Type::Void,
            ),
        ],
    ));
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr(
                "f",
                "c",
                Opcode::Call {
                    callee: Callee::Function(FunctionName::from("mk")),
                    args: vec![],
                },
                Type::Pointer,
            ),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let p_id = id(&analysis, &value("mk", "p"));
    let c_id = id(&analysis, &value("f", "c"));
    assert!(analysis.points_to().contains(&(c_id, p_id + 1)));
}

#[test]
fn constant_global_memory() {
    let mut module = Module::new("constant_global");
    module.globals.push(Global {
        name: GlobalName::from("c"),
        is_constant: true,
        ty: Type::Integer { bits: 32 },
        initializer: Some(Constant::int(32, 7)),
    });
    module.globals.push(Global {
        name: GlobalName::from("v"),
        is_constant: false,
        ty: Type::Integer { bits: 32 },
        initializer: Some(Constant::int(32, 8)),
    });
    module.functions.push(function(
        "f",
        vec![],
        Type::Pointer,
        vec![
            instr(
                "f",
                "p",
                Opcode::GetElementPtr {
                    base: Operand::Constant(Constant::global("c")),
                    indices: vec![Operand::Constant(Constant::int(64, 0))],
                },
                Type::Pointer,
            ),
            instr(
                "f",
                "q",
                Opcode::GetElementPtr {
                    base: Operand::Constant(Constant::global("v")),
                    indices: vec![Operand::Constant(Constant::int(64, 0))],
                },
                Type::Pointer,
            ),
            instr(
                "f",
                "r",
                Opcode::Ret {
                    value: Some(local("f", "p")),
                },
                Type::Void,
            ),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    // The global itself answers by qualification.
    assert!(analysis
        .points_to_constant_memory(&Value::Global(GlobalName::from("c")), false)
        .unwrap());
    assert!(!analysis
        .points_to_constant_memory(&Value::Global(GlobalName::from("v")), false)
        .unwrap());
    // A derived pointer answers through its points-to set.
    assert!(analysis
        .points_to_constant_memory(&value("f", "p"), false)
        .unwrap());
    assert!(!analysis
        .points_to_constant_memory(&value("f", "q"), false)
        .unwrap());
}

#[test]
fn stack_slots_are_local_constant_memory() {
    let mut module = Module::new("stack_slots");
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr("f", "p", Opcode::Alloca, Type::Pointer),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let p = value("f", "p");
    assert!(analysis.points_to_constant_memory(&p, true).unwrap());
    assert!(!analysis.points_to_constant_memory(&p, false).unwrap());
}

#[test]
fn functions_are_constant_memory() {
    let mut module = Module::new("fn_const");
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![ret_void("f", "r")],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();
    assert!(analysis
        .points_to_constant_memory(&Value::Function(FunctionName::from("f")), false)
        .unwrap());
}

#[test]
fn unknown_external_call_is_tolerated() {
    let mut module = Module::new("unknown_call");
    module
        .functions
        .push(function("extern_unknown", vec![], Type::Void, vec![]));
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr("f", "p", Opcode::Alloca, Type::Pointer),
            instr(
                "f",
                "c",
                Opcode::Call {
                    callee: Callee::Function(FunctionName::from("extern_unknown")),
                    args: vec![],
                },
                Type::Void,
            ),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let c_id = id(&analysis, &value("f", "c"));
    assert!(analysis
        .program()
        .to_string()
        .contains(&format!("instrUnknown({})", c_id)));
    // Alias queries stay well-defined.
    let p = value("f", "p");
    assert_eq!(analysis.alias(&p, &p).unwrap(), AliasResult::MustAlias);
}

#[test]
fn inttoptr_may_alias_everything() {
    let mut module = Module::new("inttoptr");
    module.functions.push(function(
        "f",
        vec![("n", Type::Integer { bits: 64 })],
        Type::Void,
        vec![
            instr("f", "p", Opcode::Alloca, Type::Pointer),
            instr(
                "f",
                "q",
                Opcode::IntToPtr {
                    value: local("f", "n"),
                },
                Type::Pointer,
            ),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let p = value("f", "p");
    let q = value("f", "q");
    assert_eq!(analysis.alias(&q, &p).unwrap(), AliasResult::MayAlias);
    assert!(!analysis.points_to_constant_memory(&q, true).unwrap());
}

#[test]
fn phi_and_bitcast_merge_flows() {
    let mut module = Module::new("phi_bitcast");
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr("f", "a", Opcode::Alloca, Type::Pointer),
            instr("f", "b", Opcode::Alloca, Type::Pointer),
            instr(
                "f",
                "cast",
                Opcode::BitCast {
                    value: local("f", "a"),
                },
                Type::Pointer,
            ),
            instr(
                "f",
                "m",
                Opcode::Phi {
                    incoming: vec![local("f", "cast"), local("f", "b")],
                },
                Type::Pointer,
            ),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let a_id = id(&analysis, &value("f", "a"));
    let b_id = id(&analysis, &value("f", "b"));
    let m_id = id(&analysis, &value("f", "m"));
    assert!(analysis.points_to().contains(&(m_id, a_id + 1)));
    assert!(analysis.points_to().contains(&(m_id, b_id + 1)));
    assert_eq!(
        analysis.alias(&value("f", "m"), &value("f", "a")).unwrap(),
        AliasResult::MayAlias
    );
    // The two distinct slots still never alias.
    assert_eq!(
        analysis.alias(&value("f", "a"), &value("f", "b")).unwrap(),
        AliasResult::NoAlias
    );
}

#[test]
fn memcpy_copies_pointees() {
    let mut module = Module::new("memcpy");
    module.functions.push(function(
        "strcpy",
        vec![("d", Type::Pointer), ("s", Type::Pointer)],
        Type::Pointer,
        vec![],
    ));
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr("f", "src", Opcode::Alloca, Type::Pointer),
            instr("f", "dst", Opcode::Alloca, Type::Pointer),
            instr("f", "x", Opcode::Alloca, Type::Pointer),
            instr(
                "f",
                "st",
                Opcode::Store {
                    value: local("f", "x"),
                    dest: local("f", "src"),
                },
                Type::Void,
            ),
            instr(
                "f",
                "cp",
                Opcode::Call {
                    callee: Callee::Function(FunctionName::from("strcpy")),
                    args: vec![local("f", "dst"), local("f", "src")],
                },
                Type::Pointer,
            ),
            instr(
                "f",
                "ld",
                Opcode::Load {
                    src: local("f", "dst"),
                },
                Type::Pointer,
            ),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let x_id = id(&analysis, &value("f", "x"));
    let dst_id = id(&analysis, &value("f", "dst"));
    let ld = value("f", "ld");
    // The copy moved *src's contents into *dst.
    assert!(analysis.points_to().contains(&(dst_id + 1, x_id + 1)));
    assert!(analysis
        .points_to()
        .contains(&(id(&analysis, &ld), x_id + 1)));
    assert_eq!(
        analysis.alias(&ld, &value("f", "x")).unwrap(),
        AliasResult::MayAlias
    );
}

#[test]
fn global_initializer_flows_into_storage() {
    let mut module = Module::new("global_init");
    module.functions.push(function(
        "g",
        vec![],
        Type::Void,
        vec![ret_void("g", "r")],
    ));
    module.globals.push(Global {
        name: GlobalName::from("fp"),
        is_constant: false,
        ty: Type::Pointer,
        initializer: Some(Constant::function("g")),
    });
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr(
                "f",
                "ld",
                Opcode::Load {
                    src: Operand::Constant(Constant::global("fp")),
                },
                Type::Pointer,
            ),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let g_id = id(&analysis, &Value::Function(FunctionName::from("g")));
    let ld_id = id(&analysis, &value("f", "ld"));
    // Loading the global yields the function's code object.
    assert!(analysis.points_to().contains(&(ld_id, g_id + 1)));
    assert!(analysis
        .points_to_constant_memory(&value("f", "ld"), false)
        .unwrap());
}

#[test]
fn runs_are_deterministic() {
    let mut module = Module::new("deterministic");
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr("f", "p", Opcode::Alloca, Type::Pointer),
            instr("f", "q", Opcode::Alloca, Type::Pointer),
            instr(
                "f",
                "s",
                Opcode::Store {
                    value: local("f", "q"),
                    dest: local("f", "p"),
                },
                Type::Void,
            ),
            ret_void("f", "r"),
        ],
    ));
    let first = PointerAnalysis::new(&module).unwrap();
    let second = PointerAnalysis::new(&module).unwrap();
    assert_eq!(first.points_to(), second.points_to());

    let mut out_first = Vec::new();
    let mut out_second = Vec::new();
    first.print_points_to(&mut out_first).unwrap();
    second.print_points_to(&mut out_second).unwrap();
    assert_eq!(out_first, out_second);
}

#[test]
fn print_points_to_format() {
    let mut module = Module::new("print_format");
    module.functions.push(function(
        "f",
        vec![],
        Type::Void,
        vec![
            instr("f", "p", Opcode::Alloca, Type::Pointer),
            ret_void("f", "r"),
        ],
    ));
    let analysis = PointerAnalysis::new(&module).unwrap();

    let mut out = Vec::new();
    analysis.print_points_to(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "================== all addressable objects");
    assert!(lines.contains(&"@f::%p::aff(1)"));
    assert!(text.contains("================== points-to relation\n"));
    assert!(text.contains("@f::%p -> @f::%p::aff(1)"));
}
