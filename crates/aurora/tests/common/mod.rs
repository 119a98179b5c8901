use anyhow::Result;

use aurora::Compiler;
use aurora::codegen::CodeGen;
use aurora::modules;

use inkwell::context::Context;

/// Compile a source fragment and return the textual IR of the verified
/// module. Diagnostics are silenced; a reported error fails the
/// compilation and surfaces through the `Result`.
#[allow(dead_code)]
pub fn gen_ir_for_source(src: &str) -> Result<String> {
    let compiler = Compiler::new_silent();
    let context = Context::create();
    let codegen = CodeGen::new(&compiler, &context, "test_module");

    modules::compile_entry(&codegen, src, "<test>")?;

    Ok(codegen.module.print_to_string().to_string())
}

/// Compile a fragment that is expected to fail; returns the diagnostic
/// codes that were reported.
#[allow(dead_code)]
pub fn codes_for_failing_source(src: &str) -> Vec<String> {
    let compiler = Compiler::new_silent();
    let context = Context::create();
    let codegen = CodeGen::new(&compiler, &context, "test_module");

    let result = modules::compile_entry(&codegen, src, "<test>");
    assert!(result.is_err(), "expected compilation to fail");

    let diagnostics = compiler.diagnostics.borrow();
    diagnostics
        .diagnostics()
        .iter()
        .map(|d| d.code.clone())
        .collect()
}
