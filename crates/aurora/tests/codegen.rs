// IR-level tests for the code generator: these compile small programs
// and assert on the structure of the verified module.

mod common;

use anyhow::Result;
use common::{codes_for_failing_source, gen_ir_for_source};

#[test]
fn arithmetic_and_return() -> Result<()> {
    let ir = gen_ir_for_source("fn main() -> int { var x: int = 2 + 3 * 4; return x; }")?;

    assert!(ir.contains("define i64 @main()"), "main returns i64:\n{ir}");
    // Constant operands fold: the store writes 14 directly.
    assert!(ir.contains("i64 14"), "2 + 3 * 4 should fold to 14:\n{ir}");
    assert!(ir.contains("ret i64"), "missing integer return:\n{ir}");
    Ok(())
}

#[test]
fn short_circuit_and_uses_phi_blocks() -> Result<()> {
    let ir = gen_ir_for_source(
        "fn side(x: int) -> bool { return x > 0; }\n\
         fn main() -> int { if false && side(1) { return 1; } return 0; }",
    )?;

    assert!(ir.contains("rhs:"), "missing rhs block:\n{ir}");
    assert!(ir.contains("merge:"), "missing merge block:\n{ir}");
    assert!(ir.contains("phi i1"), "logical op must merge through a phi:\n{ir}");
    // The callee is only reachable through the rhs block, never the
    // false edge from the entry.
    assert!(ir.contains("define i1 @side"), "side must still be emitted:\n{ir}");
    Ok(())
}

#[test]
fn class_with_primary_constructor() -> Result<()> {
    let ir = gen_ir_for_source(
        "class P(let x: int, let y: int)\n\
         fn main() -> int { let p = P(3, 4); return p.x + p.y; }",
    )?;

    // Struct with exactly the declared fields, in order.
    assert!(
        ir.contains("%P = type { i64, i64 }"),
        "class struct must hold the two int fields:\n{ir}"
    );
    // Uniform constructor mangling with parameter tags.
    assert!(
        ir.contains("@P_constructor_i_i"),
        "primary constructor symbol missing:\n{ir}"
    );
    assert!(ir.contains("call ptr @malloc"), "instances come from malloc:\n{ir}");
    assert!(ir.contains("getelementptr"), "field access uses GEPs:\n{ir}");
    Ok(())
}

#[test]
fn optional_null_comparison_extracts_flag() -> Result<()> {
    let ir = gen_ir_for_source(
        "fn main() -> int { let a: int? = null; if a == null { return 42; } return 0; }",
    )?;

    // Optionals lower to { i1, i64 }; comparing against null reads the
    // has_value flag.
    assert!(ir.contains("{ i1, i64 }"), "optional int layout:\n{ir}");
    assert!(ir.contains("extractvalue"), "null compare extracts the flag:\n{ir}");
    assert!(ir.contains("ret i64 42"), "then-branch returns 42:\n{ir}");
    Ok(())
}

#[test]
fn array_literal_and_for_loop() -> Result<()> {
    let ir = gen_ir_for_source(
        "fn main() -> int {\n\
             let a = [10, 20, 30];\n\
             var s: int = 0;\n\
             for i in 0..3 { s = s + a[i]; }\n\
             return s;\n\
         }",
    )?;

    assert!(ir.contains("@aurora_array_create"), "array backed by runtime:\n{ir}");
    assert!(ir.contains("@aurora_array_set"), "elements stored via runtime:\n{ir}");
    assert!(ir.contains("@aurora_array_length"), "length read from runtime:\n{ir}");
    for block in ["forcond", "forbody", "forstep", "afterfor"] {
        assert!(ir.contains(block), "for loop must emit {block}:\n{ir}");
    }
    Ok(())
}

#[test]
fn constructor_overloads_get_distinct_symbols() -> Result<()> {
    let ir = gen_ir_for_source(
        "class C {\n\
             constructor(x: int) { this.v = x }\n\
             constructor(x: double) { this.v = 100 }\n\
             var v: int = 0\n\
         }\n\
         fn main() -> int { let c = C(7); return c.v; }",
    )?;

    assert!(
        ir.contains("define void @C_constructor_i"),
        "int overload symbol:\n{ir}"
    );
    assert!(
        ir.contains("define void @C_constructor_d"),
        "double overload symbol:\n{ir}"
    );
    // The call site picked the int overload for C(7).
    assert!(
        ir.contains("call void @C_constructor_i("),
        "call site must dispatch on the argument signature:\n{ir}"
    );
    Ok(())
}

#[test]
fn scope_variables_released_before_return() -> Result<()> {
    let ir = gen_ir_for_source(
        "class P(let x: int, let y: int)\n\
         fn main() -> int { let p = P(1, 2); return p.x; }",
    )?;

    assert!(
        ir.contains("call void @aurora_release"),
        "class locals are released at scope exit:\n{ir}"
    );
    let release_pos = ir.find("call void @aurora_release").unwrap();
    let ret_pos = ir[release_pos..].find("ret i64").map(|p| p + release_pos);
    assert!(
        ret_pos.is_some(),
        "release must come before the terminator:\n{ir}"
    );
    Ok(())
}

#[test]
fn while_loop_blocks_and_break() -> Result<()> {
    let ir = gen_ir_for_source(
        "fn main() -> int {\n\
             var i: int = 0;\n\
             while i < 10 { if i == 5 { break; } i = i + 1; }\n\
             return i;\n\
         }",
    )?;

    for block in ["whilecond", "whilebody", "afterwhile"] {
        assert!(ir.contains(block), "while must emit {block}:\n{ir}");
    }
    assert!(
        ir.contains("br label %afterwhile"),
        "break jumps to the after block:\n{ir}"
    );
    // The condition is an integer compare, not a float compare.
    assert!(
        ir.contains("icmp slt i64"),
        "while condition lowers type-appropriately:\n{ir}"
    );
    Ok(())
}

#[test]
fn loop_statement_with_continue() -> Result<()> {
    let ir = gen_ir_for_source(
        "fn main() -> int {\n\
             var i: int = 0;\n\
             loop {\n\
                 i = i + 1;\n\
                 if i < 3 { continue; }\n\
                 break;\n\
             }\n\
             return i;\n\
         }",
    )?;

    assert!(ir.contains("loopbody"), "loop body block:\n{ir}");
    assert!(ir.contains("afterloop"), "loop exit block:\n{ir}");
    assert!(
        ir.contains("br label %loopbody"),
        "continue re-enters the body:\n{ir}"
    );
    Ok(())
}

#[test]
fn member_assignment_on_arbitrary_receiver() -> Result<()> {
    let ir = gen_ir_for_source(
        "class P(var x: int, var y: int)\n\
         fn bump(p: P) { p.x = p.x + 1 }\n\
         fn main() -> int { let p = P(1, 2); bump(p); return p.x; }",
    )?;

    assert!(
        ir.contains("define void @bump(ptr"),
        "receiver passes as pointer:\n{ir}"
    );
    assert!(ir.contains("store i64"), "field store emitted:\n{ir}");
    Ok(())
}

#[test]
fn method_call_resolves_mangled_symbol() -> Result<()> {
    let ir = gen_ir_for_source(
        "class Counter {\n\
             var n: int = 0\n\
             fn add(k: int) -> int { this.n = this.n + k\n return this.n }\n\
         }\n\
         fn main() -> int { let c = Counter(0); return c.add(5); }",
    )?;

    assert!(
        ir.contains("define i64 @Counter_add(ptr"),
        "method symbol Class_name with this first:\n{ir}"
    );
    assert!(
        ir.contains("call i64 @Counter_add("),
        "member call dispatches to the mangled symbol:\n{ir}"
    );
    Ok(())
}

#[test]
fn object_singleton_methods_are_emitted() -> Result<()> {
    let ir = gen_ir_for_source(
        "object Config {\n\
             let version: int = 7\n\
             fn get() -> int { return 7 }\n\
         }\n\
         fn main() -> int { let c = Config(7); return c.get(); }",
    )?;

    assert!(ir.contains("define i64 @Config_get(ptr"), "{ir}");
    Ok(())
}

#[test]
fn ternary_merges_through_phi() -> Result<()> {
    let ir = gen_ir_for_source("fn main() -> int { let x: int = 1; return x > 0 ? 10 : 20; }")?;
    for block in ["ternary_then", "ternary_else", "ternary_merge"] {
        assert!(ir.contains(block), "ternary must emit {block}:\n{ir}");
    }
    assert!(ir.contains("phi i64"), "ternary result is a phi:\n{ir}");
    Ok(())
}

#[test]
fn builtins_are_declared_on_demand() -> Result<()> {
    let ir = gen_ir_for_source("fn main() -> int { aurora_println_int(42); return 0; }")?;
    assert!(
        ir.contains("declare i64 @aurora_println_int(i64)"),
        "stdlib prototype declared lazily:\n{ir}"
    );
    // Unused builtins stay out of the module.
    assert!(!ir.contains("aurora_sqrt"), "unused builtins not declared:\n{ir}");
    Ok(())
}

#[test]
fn if_with_both_branches_returning_suppresses_merge() -> Result<()> {
    let ir = gen_ir_for_source(
        "fn main() -> int { let x: int = 3; if x > 0 { return 1; } else { return 2; } }",
    )?;
    assert!(
        !ir.contains("ifcont"),
        "merge block suppressed when both branches terminate:\n{ir}"
    );
    Ok(())
}

#[test]
fn force_unwrap_guards_with_panic() -> Result<()> {
    let ir = gen_ir_for_source("fn main(a: int?) -> int { return a!; }")?;
    assert!(ir.contains("unwrap_ok"), "{ir}");
    assert!(ir.contains("unwrap_fail"), "{ir}");
    assert!(ir.contains("@aurora_panic"), "null unwrap panics:\n{ir}");
    assert!(ir.contains("unreachable"), "panic path terminates:\n{ir}");
    Ok(())
}

#[test]
fn null_coalesce_falls_back() -> Result<()> {
    let ir = gen_ir_for_source("fn pick(a: int?, b: int) -> int { return a ?? b; }")?;
    for block in ["coalesce_some", "coalesce_none", "coalesce_merge"] {
        assert!(ir.contains(block), "?? must emit {block}:\n{ir}");
    }
    Ok(())
}

#[test]
fn imports_are_loaded_and_emitted_before_the_importer() -> Result<()> {
    use aurora::Compiler;
    use aurora::codegen::CodeGen;
    use aurora::modules;
    use inkwell::context::Context;

    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("mathlib.aur"),
        "fn double_it(x: int) -> int { return x * 2 }\n",
    )?;
    let entry_path = dir.path().join("main.aur");
    std::fs::write(
        &entry_path,
        "import mathlib\nfn main() -> int { return double_it(21); }\n",
    )?;

    let source = std::fs::read_to_string(&entry_path)?;
    let compiler = Compiler::new_silent();
    let context = Context::create();
    let codegen = CodeGen::new(&compiler, &context, "import_test");

    modules::compile_entry(&codegen, &source, entry_path.to_str().unwrap())?;

    let ir = codegen.module.print_to_string().to_string();
    assert!(
        ir.contains("define i64 @double_it"),
        "imported function emitted:\n{ir}"
    );
    assert!(ir.contains("call i64 @double_it"), "importer calls it:\n{ir}");

    // Loading is idempotent: the resolved path sits in the loaded set.
    assert_eq!(compiler.loaded_modules.borrow().len(), 2);
    Ok(())
}

#[test]
fn import_cycles_terminate() -> Result<()> {
    use aurora::Compiler;
    use aurora::codegen::CodeGen;
    use aurora::modules;
    use inkwell::context::Context;

    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("a.aur"),
        "import b\nfn from_a() -> int { return 1 }\n",
    )?;
    std::fs::write(
        dir.path().join("b.aur"),
        "import a\nfn from_b() -> int { return 2 }\n",
    )?;
    let entry_path = dir.path().join("main.aur");
    std::fs::write(&entry_path, "import a\nfn main() -> int { return 0; }\n")?;

    let source = std::fs::read_to_string(&entry_path)?;
    let compiler = Compiler::new_silent();
    let context = Context::create();
    let codegen = CodeGen::new(&compiler, &context, "cycle_test");

    modules::compile_entry(&codegen, &source, entry_path.to_str().unwrap())?;

    let ir = codegen.module.print_to_string().to_string();
    assert!(ir.contains("@from_a"), "{ir}");
    assert!(ir.contains("@from_b"), "{ir}");
    Ok(())
}

#[test]
fn break_outside_loop_is_a_codegen_error() {
    let codes = codes_for_failing_source("fn main() -> int { break; return 0; }");
    assert!(codes.iter().any(|c| c == "E3003"), "{codes:?}");
}

#[test]
fn unknown_function_is_a_codegen_error() {
    let codes = codes_for_failing_source("fn main() -> int { nope(); return 0; }");
    assert!(codes.iter().any(|c| c == "E3002"), "{codes:?}");
}

#[test]
fn value_return_from_void_function_is_rejected() {
    let codes = codes_for_failing_source("fn main() { return 3; }");
    assert!(codes.iter().any(|c| c == "E3003"), "{codes:?}");
}
