//! Leveled compiler logger with phase timing.
//!
//! Off by default; `--debug`, `--trace` and `--log-level` raise the
//! level from the CLI. Interior mutability keeps the call sites on
//! `&self`, matching how the rest of the pipeline is threaded.

use std::cell::{Cell, RefCell};
use std::io::IsTerminal;
use std::time::Instant;

use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Off,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "off" => Some(LogLevel::Off),
            _ => None,
        }
    }
}

pub struct Logger {
    level: Cell<LogLevel>,
    use_colors: bool,
    phases: RefCell<Vec<(String, Instant)>>,
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new(LogLevel::Off)
    }
}

impl Logger {
    pub fn new(level: LogLevel) -> Self {
        Logger {
            level: Cell::new(level),
            use_colors: std::io::stderr().is_terminal(),
            phases: RefCell::new(Vec::new()),
        }
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.set(level);
    }

    pub fn level(&self) -> LogLevel {
        self.level.get()
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level.get() && self.level.get() != LogLevel::Off
    }

    fn emit(&self, level: LogLevel, tag: &str, message: &str, component: Option<&str>) {
        if !self.enabled(level) {
            return;
        }
        let tag = if self.use_colors {
            match level {
                LogLevel::Trace => tag.dimmed().to_string(),
                LogLevel::Debug => tag.cyan().to_string(),
                LogLevel::Info => tag.green().to_string(),
                LogLevel::Warning => tag.yellow().to_string(),
                LogLevel::Error => tag.red().bold().to_string(),
                LogLevel::Off => tag.to_string(),
            }
        } else {
            tag.to_string()
        };
        match component {
            Some(c) => eprintln!("[{tag}] [{c}] {message}"),
            None => eprintln!("[{tag}] {message}"),
        }
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Trace, "trace", message.as_ref(), None);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Debug, "debug", message.as_ref(), None);
    }

    pub fn debug_in(&self, message: impl AsRef<str>, component: &str) {
        self.emit(LogLevel::Debug, "debug", message.as_ref(), Some(component));
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Info, "info", message.as_ref(), None);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Warning, "warn", message.as_ref(), None);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Error, "error", message.as_ref(), None);
    }

    /// Start a named compilation phase; ended (with timing) by
    /// [`phase_end`](Self::phase_end).
    pub fn phase_start(&self, name: &str) {
        self.phases
            .borrow_mut()
            .push((name.to_string(), Instant::now()));
        self.emit(LogLevel::Info, "info", &format!("{name}..."), None);
    }

    pub fn phase_end(&self, name: &str) {
        let started = {
            let mut phases = self.phases.borrow_mut();
            match phases.iter().rposition(|(n, _)| n == name) {
                Some(idx) => Some(phases.remove(idx).1),
                None => None,
            }
        };
        if let Some(started) = started {
            self.emit(
                LogLevel::Info,
                "info",
                &format!("{name} done in {:.2?}", started.elapsed()),
                None,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing() {
        assert_eq!(LogLevel::parse("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("warn"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn off_disables_everything() {
        let logger = Logger::new(LogLevel::Off);
        assert!(!logger.enabled(LogLevel::Error));

        logger.set_level(LogLevel::Warning);
        assert!(logger.enabled(LogLevel::Error));
        assert!(!logger.enabled(LogLevel::Info));
    }

    #[test]
    fn phase_stack_tolerates_unmatched_end() {
        let logger = Logger::new(LogLevel::Off);
        logger.phase_start("Parsing");
        logger.phase_end("Parsing");
        // Ending a phase that was never started must not panic.
        logger.phase_end("Linking");
    }
}
