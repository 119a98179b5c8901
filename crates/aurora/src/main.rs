//! Aurora compiler driver.
//!
//! Default mode compiles the input to LLVM IR, JIT-links it with the
//! runtime and standard library, runs `main` and exits with its return
//! value. `--emit-llvm` writes the textual IR instead; `--lex` dumps
//! tokens; `--type-demo` prints the type-system walkthrough.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser as ClapParser;
use inkwell::context::Context;

use aurora::codegen::CodeGen;
use aurora::diagnostics::SourceLocation;
use aurora::lexer::{Lexer, TokenKind};
use aurora::logger::LogLevel;
use aurora::types::TypeRegistry;
use aurora::{Compiler, jit, modules};
use aurora_ast::Type;

#[derive(ClapParser)]
#[command(
    name = "aurora",
    version,
    about = "AuroraLang - A Modern LLVM-Powered Language"
)]
struct Cli {
    /// Enable debug mode (same as --log-level debug)
    #[arg(long)]
    debug: bool,

    /// Enable trace mode (most verbose)
    #[arg(long)]
    trace: bool,

    /// Set log level: trace|debug|info|warn|error|off
    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,

    /// Show lexer tokens only
    #[arg(long)]
    lex: bool,

    /// Emit LLVM IR to file instead of running
    #[arg(long = "emit-llvm")]
    emit_llvm: bool,

    /// Output file for --emit-llvm (default: output.ll)
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<String>,

    /// Show type system demo
    #[arg(long = "type-demo")]
    type_demo: bool,

    /// Source file to compile (.aur)
    file: Option<String>,
}

fn demonstrate_type_system() {
    println!("=== AuroraLang Type System Demo ===");

    let mut registry = TypeRegistry::new();

    println!("\nBasic Types:");
    for ty in [Type::Int, Type::Double, Type::Bool, Type::String] {
        println!("  - {}", registry.display(&ty));
    }

    println!("\nOptional Types (Null-Safe):");
    for ty in [
        Type::optional(Type::Int),
        Type::optional(Type::String),
    ] {
        println!("  - {}", registry.display(&ty));
    }

    let func = Type::Function {
        ret: Box::new(Type::Int),
        params: vec![Type::Int, Type::Int],
    };
    println!("\nFunction Type:");
    println!("  - {}", registry.display(&func));

    let example = registry.class_type("Example");
    println!("\nClass Type:");
    println!("  - {}", registry.display(&example));

    println!("\nType Properties:");
    println!("  - int is nullable: no");
    println!(
        "  - int? is nullable: {}",
        if Type::optional(Type::Int).is_nullable() {
            "yes"
        } else {
            "no"
        }
    );
}

fn dump_tokens(source: &str, compiler: &Compiler) {
    println!("Tokens:");
    let mut lexer = Lexer::new(source, compiler);
    loop {
        let token = lexer.next_token();
        if token.kind == TokenKind::Eof {
            break;
        }
        println!("  {token}");
    }
}

fn compile_and_run(cli: &Cli, compiler: &Compiler, source: &str, filename: &str) -> Result<i32> {
    let logger = &compiler.logger;
    let context = Context::create();
    let codegen = CodeGen::new(compiler, &context, "AuroraModule");

    logger.info("Starting compilation...");
    modules::compile_entry(&codegen, source, filename)?;

    if cli.emit_llvm {
        let out_file = cli.output.clone().unwrap_or_else(|| "output.ll".to_string());
        codegen
            .module
            .print_to_file(Path::new(&out_file))
            .map_err(|e| anyhow::anyhow!("Could not write {}: {}", out_file, e.to_string()))?;
        logger.info(format!("Generated LLVM IR: {out_file}"));
        return Ok(0);
    }

    logger.phase_start("JIT compilation and execution");
    let exit_code = jit::run_main(&codegen)?;
    logger.phase_end("JIT compilation and execution");
    Ok(exit_code)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let compiler = Compiler::new();
    if cli.debug {
        compiler.logger.set_level(LogLevel::Debug);
        compiler.diagnostics.borrow_mut().set_debug_mode(true);
    }
    if cli.trace {
        compiler.logger.set_level(LogLevel::Trace);
        compiler.diagnostics.borrow_mut().set_debug_mode(true);
    }
    if let Some(level) = &cli.log_level {
        match LogLevel::parse(level) {
            Some(level) => compiler.logger.set_level(level),
            None => {
                eprintln!("Error: Invalid log level: {level}");
                return ExitCode::FAILURE;
            }
        }
    }

    if cli.type_demo {
        demonstrate_type_system();
        return ExitCode::SUCCESS;
    }

    let Some(filename) = cli.file.clone() else {
        eprintln!("Error: No input file specified");
        return ExitCode::FAILURE;
    };

    let source = match std::fs::read_to_string(&filename) {
        Ok(source) => source,
        Err(_) => {
            compiler.diagnostics.borrow_mut().report_error(
                "E0001",
                format!("Cannot open file: {filename}"),
                SourceLocation::new(filename.clone(), 0, 0, 0),
            );
            return ExitCode::FAILURE;
        }
    };

    if cli.lex {
        dump_tokens(&source, &compiler);
        return ExitCode::SUCCESS;
    }

    let result = compile_and_run(&cli, &compiler, &source, &filename);

    if compiler.diagnostics.borrow().is_debug_mode() {
        compiler.diagnostics.borrow().print_summary();
    }

    match result {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            compiler.logger.error(format!("Compilation error: {err}"));
            if !compiler.has_errors() {
                eprintln!("error: {err}");
            }
            ExitCode::FAILURE
        }
    }
}
