//! In-process JIT execution.
//!
//! The emitted module is handed to an LLVM JIT engine; every external
//! declaration whose name matches a runtime or standard-library symbol
//! is bound to its absolute address in this process before `main` is
//! looked up and invoked with the signature inferred from its declared
//! return type. Both `aurora_` and `auroraStd_` prefixed names resolve
//! to the same implementations.

use anyhow::{Result, anyhow};
use inkwell::OptimizationLevel;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::targets::{InitializationConfig, Target};
use inkwell::types::BasicTypeEnum;

use crate::codegen::CodeGen;

/// Signature of the program entry point, derived from the declared
/// return type of `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MainKind {
    Int,
    Double,
    Void,
}

/// Absolute address of a runtime or stdlib symbol in this process, if
/// the name is one of ours. `auroraStd_` aliases map to the same
/// implementation as their `aurora_` twins.
fn runtime_symbol_address(name: &str) -> Option<usize> {
    let base = name
        .strip_prefix("auroraStd_")
        .map(|rest| format!("aurora_{rest}"))
        .unwrap_or_else(|| name.to_string());

    use aurora_runtime as rt;
    use aurora_std as std_;

    Some(match base.as_str() {
        // Heap primitives
        "aurora_retain" => rt::aurora_retain as usize,
        "aurora_release" => rt::aurora_release as usize,
        "aurora_get_ref_count" => rt::aurora_get_ref_count as usize,
        "aurora_array_create" => rt::aurora_array_create as usize,
        "aurora_array_free" => rt::aurora_array_free as usize,
        "aurora_array_length" => rt::aurora_array_length as usize,
        "aurora_array_get_ptr" => rt::aurora_array_get_ptr as usize,
        "aurora_array_set" => rt::aurora_array_set as usize,
        "aurora_array_bounds_check" => rt::aurora_array_bounds_check as usize,
        "aurora_object_create" => rt::aurora_object_create as usize,
        "aurora_object_free" => rt::aurora_object_free as usize,
        "aurora_string_create" => rt::aurora_string_create as usize,
        "aurora_string_free" => rt::aurora_string_free as usize,
        "aurora_string_length" => rt::aurora_string_length as usize,
        "aurora_malloc" => rt::aurora_malloc as usize,
        "aurora_free" => rt::aurora_free as usize,
        "aurora_assert" => rt::aurora_assert as usize,
        "aurora_panic" => rt::aurora_panic as usize,

        // I/O
        "printd" => std_::printd as usize,
        "aurora_print_int" => std_::aurora_print_int as usize,
        "aurora_println_int" => std_::aurora_println_int as usize,
        "aurora_print_double" => std_::aurora_print_double as usize,
        "aurora_println_double" => std_::aurora_println_double as usize,
        "aurora_print_bool" => std_::aurora_print_bool as usize,
        "aurora_println_bool" => std_::aurora_println_bool as usize,
        "aurora_print_string" => std_::aurora_print_string as usize,
        "aurora_println_string" => std_::aurora_println_string as usize,

        // Strings
        "aurora_string_concat" => std_::aurora_string_concat as usize,
        "aurora_string_compare" => std_::aurora_string_compare as usize,
        "aurora_string_equals" => std_::aurora_string_equals as usize,
        "aurora_string_substring" => std_::aurora_string_substring as usize,
        "aurora_string_contains" => std_::aurora_string_contains as usize,
        "aurora_string_to_upper" => std_::aurora_string_to_upper as usize,
        "aurora_string_to_lower" => std_::aurora_string_to_lower as usize,
        "aurora_string_trim" => std_::aurora_string_trim as usize,
        "aurora_string_replace" => std_::aurora_string_replace as usize,
        "aurora_string_to_int" => std_::aurora_string_to_int as usize,
        "aurora_string_to_double" => std_::aurora_string_to_double as usize,
        "aurora_int_to_string" => std_::aurora_int_to_string as usize,
        "aurora_double_to_string" => std_::aurora_double_to_string as usize,

        // Math
        "aurora_sin" => std_::aurora_sin as usize,
        "aurora_cos" => std_::aurora_cos as usize,
        "aurora_tan" => std_::aurora_tan as usize,
        "aurora_asin" => std_::aurora_asin as usize,
        "aurora_acos" => std_::aurora_acos as usize,
        "aurora_atan" => std_::aurora_atan as usize,
        "aurora_atan2" => std_::aurora_atan2 as usize,
        "aurora_exp" => std_::aurora_exp as usize,
        "aurora_log" => std_::aurora_log as usize,
        "aurora_log10" => std_::aurora_log10 as usize,
        "aurora_pow" => std_::aurora_pow as usize,
        "aurora_sqrt" => std_::aurora_sqrt as usize,
        "aurora_floor" => std_::aurora_floor as usize,
        "aurora_ceil" => std_::aurora_ceil as usize,
        "aurora_round" => std_::aurora_round as usize,
        "aurora_random_int" => std_::aurora_random_int as usize,
        "aurora_random_double" => std_::aurora_random_double as usize,
        "aurora_random_seed" => std_::aurora_random_seed as usize,

        // Time
        "aurora_time_now" => std_::aurora_time_now as usize,
        "aurora_time_now_millis" => std_::aurora_time_now_millis as usize,
        "aurora_sleep_millis" => std_::aurora_sleep_millis as usize,

        // File I/O
        "aurora_file_read" => std_::aurora_file_read as usize,
        "aurora_file_write" => std_::aurora_file_write as usize,
        "aurora_file_append" => std_::aurora_file_append as usize,
        "aurora_file_exists" => std_::aurora_file_exists as usize,
        "aurora_file_delete" => std_::aurora_file_delete as usize,

        // Environment
        "aurora_exit" => std_::aurora_exit as usize,
        "aurora_get_env" => std_::aurora_get_env as usize,
        "aurora_arg_count" => std_::aurora_arg_count as usize,
        "aurora_arg_get" => std_::aurora_arg_get as usize,

        _ => return None,
    })
}

/// Bind every external declaration the module references to its
/// in-process implementation.
fn bind_runtime_symbols(codegen: &CodeGen, engine: &ExecutionEngine) {
    for function in codegen.module.get_functions() {
        if function.count_basic_blocks() > 0 {
            continue;
        }
        let Ok(name) = function.get_name().to_str() else {
            continue;
        };
        if let Some(address) = runtime_symbol_address(name) {
            engine.add_global_mapping(&function, address);
        }
    }
}

/// JIT-compile the module and invoke `main`, returning its value (0
/// for void) as the process exit code.
pub fn run_main(codegen: &CodeGen) -> Result<i32> {
    let logger = &codegen.compiler.logger;

    let main_fn = codegen
        .module
        .get_function("main")
        .ok_or_else(|| anyhow!("No 'main' function found"))?;

    let kind = match main_fn.get_type().get_return_type() {
        None => MainKind::Void,
        Some(BasicTypeEnum::IntType(t)) if t.get_bit_width() == 64 => MainKind::Int,
        Some(BasicTypeEnum::FloatType(_)) => MainKind::Double,
        Some(other) => {
            return Err(anyhow!("Unsupported return type for 'main': {other:?}"));
        }
    };

    Target::initialize_native(&InitializationConfig::default())
        .map_err(|e| anyhow!("Failed to initialize native target: {e}"))?;

    let engine = codegen
        .module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|e| anyhow!("Failed to create JIT: {}", e.to_string()))?;

    bind_runtime_symbols(codegen, &engine);
    logger.debug("Runtime symbols bound into JIT");

    let exit_code = unsafe {
        match kind {
            MainKind::Int => {
                let main = engine
                    .get_function::<unsafe extern "C" fn() -> i64>("main")
                    .map_err(|e| anyhow!("Could not find main function: {e}"))?;
                main.call() as i32
            }
            MainKind::Double => {
                let main = engine
                    .get_function::<unsafe extern "C" fn() -> f64>("main")
                    .map_err(|e| anyhow!("Could not find main function: {e}"))?;
                main.call() as i32
            }
            MainKind::Void => {
                let main = engine
                    .get_function::<unsafe extern "C" fn()>("main")
                    .map_err(|e| anyhow!("Could not find main function: {e}"))?;
                main.call();
                0
            }
        }
    };

    logger.info(format!("Program completed with exit code: {exit_code}"));
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_prefixes_resolve_to_the_same_address() {
        let a = runtime_symbol_address("aurora_println_int").unwrap();
        let b = runtime_symbol_address("auroraStd_println_int").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn runtime_and_stdlib_symbols_resolve() {
        for name in [
            "aurora_retain",
            "aurora_release",
            "aurora_array_create",
            "aurora_array_set",
            "aurora_array_length",
            "aurora_object_create",
            "aurora_string_create",
            "aurora_panic",
            "aurora_print_int",
            "aurora_sqrt",
            "aurora_time_now",
            "aurora_file_read",
            "aurora_get_env",
            "printd",
        ] {
            assert!(
                runtime_symbol_address(name).is_some(),
                "symbol {name} must resolve"
            );
        }
        assert!(runtime_symbol_address("not_a_symbol").is_none());
    }
}
