//! Module loading and the compile pipeline.
//!
//! `import` declarations resolve to `.aur` files (package-style paths,
//! relative paths or bare names), searching relative to the importing
//! file, then the sysroot, then the current directory. Each resolved
//! absolute path is loaded at most once; the loaded-set is updated
//! before sub-imports are processed so import cycles terminate.
//! An imported module is parsed and fully code-generated before its
//! importer's top-level definitions.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow};

use aurora_ast::{ImportDecl, Program};

use crate::codegen::CodeGen;
use crate::parser::Parser;

/// Compile-time fallback sysroot, used when neither `AURORA_HOME` nor
/// the executable location yields a usable directory.
const DEFAULT_SYSROOT: &str = "/usr/local/lib/aurora";

/// Sysroot used for module resolution: `AURORA_HOME`, else the
/// executable's directory, else a compile-time default, else the
/// current directory.
pub fn sysroot() -> PathBuf {
    if let Ok(home) = std::env::var("AURORA_HOME") {
        let path = PathBuf::from(home);
        if path.is_dir() {
            return path;
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if dir.is_dir() {
                return dir.to_path_buf();
            }
        }
    }
    let default = PathBuf::from(DEFAULT_SYSROOT);
    if default.is_dir() {
        return default;
    }
    PathBuf::from(".")
}

/// Translate an import path into a relative `.aur` file path:
/// `com.example.util` becomes `com/example/util.aur`; explicit paths
/// get the extension appended when missing.
fn import_file_path(module_path: &str) -> PathBuf {
    let has_separator = module_path.contains('/') || module_path.contains('\\');
    let mut file = if !has_separator && module_path.contains('.') {
        module_path.replace('.', "/")
    } else {
        module_path.to_string()
    };
    if !file.ends_with(".aur") {
        file.push_str(".aur");
    }
    PathBuf::from(file)
}

/// Resolve an import against the importing file's directory, the
/// sysroot and the current directory; the first existing candidate
/// wins.
pub fn resolve_import(module_path: &str, current_file: Option<&Path>) -> Option<PathBuf> {
    let file = import_file_path(module_path);

    let mut candidates = Vec::new();
    if let Some(current) = current_file {
        if let Some(dir) = current.parent() {
            candidates.push(dir.join(&file));
        }
    }
    candidates.push(sysroot().join(&file));
    candidates.push(file);

    for candidate in candidates {
        if candidate.exists() {
            return candidate.canonicalize().ok();
        }
    }
    None
}

/// Load, parse and code-generate one imported module (and its own
/// imports, recursively).
pub fn load_import(
    codegen: &CodeGen,
    import: &ImportDecl,
    current_file: Option<&Path>,
) -> Result<()> {
    let compiler = codegen.compiler;
    let logger = &compiler.logger;

    let Some(resolved) = resolve_import(&import.module_path, current_file) else {
        logger.error(format!("Module file not found: {}", import.module_path));
        return Err(anyhow!("Module file not found: {}", import.module_path));
    };

    // Idempotent: a path already in the set (including one currently
    // being loaded) is skipped, which keeps import cycles finite.
    if !compiler.loaded_modules.borrow_mut().insert(resolved.clone()) {
        logger.debug_in(
            format!("Module already loaded: {}", import.module_path),
            "Modules",
        );
        return Ok(());
    }

    let source = std::fs::read_to_string(&resolved)
        .with_context(|| format!("Cannot open module file: {}", resolved.display()))?;
    logger.debug_in(
        format!(
            "Loaded module source: {} ({} bytes)",
            resolved.display(),
            source.len()
        ),
        "Modules",
    );

    let program = {
        let mut parser = Parser::new(&source, compiler);
        parser
            .parse_program()
            .map_err(|_| anyhow!("Failed to parse module: {}", import.module_path))?
    };

    // Sub-imports load before this module's definitions are emitted.
    for sub_import in &program.imports {
        load_import(codegen, sub_import, Some(&resolved))?;
    }

    codegen
        .emit_program(&program)
        .map_err(|d| anyhow!("{}", d.message))?;

    logger.debug_in(
        format!("Successfully loaded module: {}", import.module_path),
        "Modules",
    );
    Ok(())
}

/// Full front half of the pipeline for an entry file: parse, load
/// imports, generate code and verify the module. Any reported
/// diagnostic aborts with an error.
pub fn compile_entry(codegen: &CodeGen, source: &str, filename: &str) -> Result<Program> {
    let compiler = codegen.compiler;
    let logger = &compiler.logger;

    {
        let mut diags = compiler.diagnostics.borrow_mut();
        diags.set_source_code(source);
        diags.set_filename(filename);
    }
    if let Ok(canonical) = Path::new(filename).canonicalize() {
        compiler.loaded_modules.borrow_mut().insert(canonical);
    }

    logger.phase_start("Parsing");
    let program = {
        let mut parser = Parser::new(source, compiler);
        parser.parse_program().map_err(|_| anyhow!("Parse error"))?
    };
    logger.phase_end("Parsing");
    logger.info(format!(
        "Parsed {} function(s), {} class(es), and {} import(s)",
        program.functions.len(),
        program.classes.len(),
        program.imports.len()
    ));

    // Built-in prototypes are registered before any code generation so
    // imported modules can reach them too.
    codegen.declare_legacy_builtins();

    if !program.imports.is_empty() {
        logger.phase_start("Module loading");
        for import in &program.imports {
            load_import(codegen, import, Some(Path::new(filename)))?;
        }
        logger.phase_end("Module loading");
    }

    logger.phase_start("Code generation");
    codegen
        .emit_program(&program)
        .map_err(|d| anyhow!("{}", d.message))?;
    logger.phase_end("Code generation");

    if compiler.has_errors() {
        return Err(anyhow!("Code generation failed"));
    }

    // Internal consistency gate: the module must verify before any
    // emission or JIT step.
    codegen
        .module
        .verify()
        .map_err(|msg| anyhow!("Module verification failed: {}", msg.to_string()))?;

    Ok(program)
}
