//! Diagnostic engine.
//!
//! Every stage of the pipeline reports here: the lexer (E1001), the
//! parser (E2001), code generation (E3001-E3004) and the driver
//! (E0001). Diagnostics are printed immediately in a rustc-like format
//! and counted so the pipeline can gate on `has_errors()`.

use std::io::IsTerminal;

use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Note,
    Warning,
    Error,
    Fatal,
}

impl DiagnosticLevel {
    fn label(self) -> &'static str {
        match self {
            DiagnosticLevel::Note => "Note",
            DiagnosticLevel::Warning => "Warning",
            DiagnosticLevel::Error => "Error",
            DiagnosticLevel::Fatal => "Fatal Error",
        }
    }
}

/// Source location with 1-based line/column; `length` is the width of
/// the caret underline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub filename: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl SourceLocation {
    pub fn new(filename: impl Into<String>, line: usize, column: usize, length: usize) -> Self {
        SourceLocation {
            filename: filename.into(),
            line,
            column,
            length: length.max(1),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.line > 0 && self.column > 0
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        SourceLocation::new("<input>", 0, 0, 1)
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub code: String,
    pub message: String,
    pub location: SourceLocation,
    pub notes: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn new(
        level: DiagnosticLevel,
        code: impl Into<String>,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Diagnostic {
            level,
            code: code.into(),
            message: message.into(),
            location,
            notes: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Code-generation error with no usable source location.
    pub fn codegen(code: &str, message: impl Into<String>) -> Self {
        Diagnostic::new(
            DiagnosticLevel::Error,
            code,
            message,
            SourceLocation::new("<codegen>", 0, 0, 0),
        )
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

impl From<inkwell::builder::BuilderError> for Diagnostic {
    fn from(err: inkwell::builder::BuilderError) -> Self {
        Diagnostic::codegen("E3002", format!("IR builder failure: {err}"))
    }
}

pub struct DiagnosticEngine {
    debug_mode: bool,
    use_colors: bool,
    /// Suppresses printing (tests exercise error paths without noise).
    silent: bool,
    error_count: usize,
    warning_count: usize,
    source_code: String,
    filename: String,
    diagnostics: Vec<Diagnostic>,
}

impl Default for DiagnosticEngine {
    fn default() -> Self {
        DiagnosticEngine::new()
    }
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        DiagnosticEngine {
            debug_mode: false,
            use_colors: std::io::stderr().is_terminal(),
            silent: false,
            error_count: 0,
            warning_count: 0,
            source_code: String::new(),
            filename: String::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn set_source_code(&mut self, source: &str) {
        self.source_code = source.to_string();
    }

    pub fn set_filename(&mut self, filename: &str) {
        self.filename = filename.to_string();
    }

    pub fn set_debug_mode(&mut self, enable: bool) {
        self.debug_mode = enable;
    }

    pub fn is_debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn set_use_colors(&mut self, enable: bool) {
        self.use_colors = enable;
    }

    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
    }

    pub fn report(&mut self, diag: Diagnostic) {
        match diag.level {
            DiagnosticLevel::Error | DiagnosticLevel::Fatal => self.error_count += 1,
            DiagnosticLevel::Warning => self.warning_count += 1,
            DiagnosticLevel::Note => {}
        }
        if !self.silent {
            self.print_diagnostic(&diag);
        }
        self.diagnostics.push(diag);
    }

    pub fn report_error(&mut self, code: &str, message: impl Into<String>, loc: SourceLocation) {
        self.report(Diagnostic::new(DiagnosticLevel::Error, code, message, loc));
    }

    pub fn report_warning(&mut self, code: &str, message: impl Into<String>, loc: SourceLocation) {
        self.report(Diagnostic::new(
            DiagnosticLevel::Warning,
            code,
            message,
            loc,
        ));
    }

    pub fn report_note(&mut self, message: impl Into<String>, loc: SourceLocation) {
        self.report(Diagnostic::new(DiagnosticLevel::Note, "", message, loc));
    }

    fn paint(&self, text: &str, level: DiagnosticLevel) -> String {
        if !self.use_colors {
            return text.to_string();
        }
        match level {
            DiagnosticLevel::Note => text.cyan().bold().to_string(),
            DiagnosticLevel::Warning => text.yellow().bold().to_string(),
            DiagnosticLevel::Error | DiagnosticLevel::Fatal => text.red().bold().to_string(),
        }
    }

    fn gutter(&self, text: &str) -> String {
        if self.use_colors {
            text.blue().to_string()
        } else {
            text.to_string()
        }
    }

    fn print_diagnostic(&self, diag: &Diagnostic) {
        // Header: Error[E2001]: message
        let mut header = self.paint(diag.level.label(), diag.level);
        if !diag.code.is_empty() {
            header.push_str(&format!("[{}]", diag.code));
        }
        if self.use_colors {
            eprintln!("{}: {}", header, diag.message.bold());
        } else {
            eprintln!("{}: {}", header, diag.message);
        }

        let loc = &diag.location;
        if loc.is_valid() {
            let filename = if loc.filename == "<input>" && !self.filename.is_empty() {
                &self.filename
            } else {
                &loc.filename
            };
            eprintln!(
                "{}{}:{}:{}",
                self.gutter("  --> "),
                filename,
                loc.line,
                loc.column
            );
            eprintln!("{}", self.gutter("   |"));
            self.print_source_snippet(loc);
        }

        for note in &diag.notes {
            eprintln!("{}{}", self.gutter("   = note: "), note);
        }
        for suggestion in &diag.suggestions {
            if self.use_colors {
                eprintln!("   = {}: {}", "help".green(), suggestion);
            } else {
                eprintln!("   = help: {}", suggestion);
            }
        }
        eprintln!();
    }

    fn print_source_snippet(&self, loc: &SourceLocation) {
        if self.source_code.is_empty() {
            return;
        }
        let Some(line) = self.source_code.lines().nth(loc.line - 1) else {
            return;
        };

        eprintln!("{} {}", self.gutter(&format!("{:4} |", loc.line)), line);

        let mut caret = String::new();
        for _ in 1..loc.column {
            caret.push(' ');
        }
        for _ in 0..loc.length.max(1) {
            caret.push('^');
        }
        let caret = if self.use_colors {
            caret.red().to_string()
        } else {
            caret
        };
        eprintln!("{} {}", self.gutter("     |"), caret);
    }

    pub fn print_summary(&self) {
        if self.silent {
            return;
        }
        if self.error_count > 0 || self.warning_count > 0 {
            let mut parts = Vec::new();
            if self.error_count > 0 {
                parts.push(format!("{} error(s)", self.error_count));
            }
            if self.warning_count > 0 {
                parts.push(format!("{} warning(s)", self.warning_count));
            }
            eprintln!("{}", parts.join(", "));
        } else {
            eprintln!("No errors or warnings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_engine() -> DiagnosticEngine {
        let mut engine = DiagnosticEngine::new();
        engine.set_silent(true);
        engine
    }

    #[test]
    fn errors_and_warnings_are_counted_separately() {
        let mut engine = quiet_engine();
        assert!(!engine.has_errors());

        engine.report_warning("W0001", "suspicious", SourceLocation::default());
        assert!(!engine.has_errors());
        assert_eq!(engine.warning_count(), 1);

        engine.report_error("E2001", "bad token", SourceLocation::new("t.aur", 3, 7, 2));
        assert!(engine.has_errors());
        assert_eq!(engine.error_count(), 1);

        engine.report_note("by the way", SourceLocation::default());
        assert_eq!(engine.error_count(), 1);
        assert_eq!(engine.diagnostics().len(), 3);
    }

    #[test]
    fn fatal_counts_as_error() {
        let mut engine = quiet_engine();
        engine.report(Diagnostic::new(
            DiagnosticLevel::Fatal,
            "E0001",
            "cannot open file",
            SourceLocation::default(),
        ));
        assert!(engine.has_errors());
    }

    #[test]
    fn clear_resets_counts() {
        let mut engine = quiet_engine();
        engine.report_error("E3001", "boom", SourceLocation::default());
        engine.clear();
        assert!(!engine.has_errors());
        assert!(engine.diagnostics().is_empty());
    }

    #[test]
    fn locations_track_validity() {
        assert!(!SourceLocation::default().is_valid());
        assert!(SourceLocation::new("f.aur", 1, 1, 1).is_valid());
        // length is clamped to at least one caret
        assert_eq!(SourceLocation::new("f.aur", 1, 1, 0).length, 1);
    }
}
