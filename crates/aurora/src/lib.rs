//! Aurora compiler core.
//!
//! The pipeline is: lexer -> recursive-descent parser (building a typed
//! AST with inference during parsing) -> LLVM-IR code generation ->
//! in-process JIT. A [`Compiler`] value owns the process-wide pieces
//! (type registry, diagnostic engine, logger, loaded-module set) so
//! tests can run in isolation; there are no true singletons.

pub mod codegen;
pub mod diagnostics;
pub mod jit;
pub mod lexer;
pub mod logger;
pub mod modules;
pub mod parser;
pub mod types;

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::PathBuf;

use diagnostics::DiagnosticEngine;
use logger::Logger;
use types::TypeRegistry;

/// Shared compiler state threaded through the lexer, parser and code
/// generator. Interior mutability mirrors how the stages interleave:
/// the module loader parses (mutating the registry) and then generates
/// code (reading it) for each import before returning to the importer.
pub struct Compiler {
    pub registry: RefCell<TypeRegistry>,
    pub diagnostics: RefCell<DiagnosticEngine>,
    pub logger: Logger,
    pub loaded_modules: RefCell<HashSet<PathBuf>>,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            registry: RefCell::new(TypeRegistry::new()),
            diagnostics: RefCell::new(DiagnosticEngine::new()),
            logger: Logger::default(),
            loaded_modules: RefCell::new(HashSet::new()),
        }
    }

    /// Test-friendly constructor that swallows diagnostic output.
    pub fn new_silent() -> Self {
        let compiler = Compiler::new();
        compiler.diagnostics.borrow_mut().set_silent(true);
        compiler
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.borrow().has_errors()
    }
}
