//! Compiler failures.

use std::fmt;
use std::path::PathBuf;

/// Position in the source file (1-based line, 0-based column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Fatal error reported by the compiler itself (syntax or semantic error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerFailure {
    pub code: Option<String>,
    pub message: String,
    pub location: Option<Location>,
}

impl CompilerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.location = Some(Location { line, column });
        self
    }
}

/// A compile failure attributed to a source file.
///
/// `Clone` so one failure can be delivered to every caller waiting on the
/// same in-flight compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub filename: PathBuf,
    pub code: Option<String>,
    pub message: String,
    pub location: Option<Location>,
}

impl CompileError {
    pub fn from_failure(filename: impl Into<PathBuf>, failure: CompilerFailure) -> Self {
        Self {
            filename: filename.into(),
            code: failure.code,
            message: failure.message,
            location: failure.location,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filename.display())?;
        if let Some(location) = self.location {
            write!(f, ":{location}")?;
        }
        write!(f, ": ")?;
        if let Some(code) = &self.code {
            write!(f, "[{code}] ")?;
        }
        f.write_str(&self.message)
    }
}

impl std::error::Error for CompileError {}
