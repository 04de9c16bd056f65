//! Compiler boundary.
//!
//! The component compiler is an external collaborator behind [`Compiler`]:
//! source text + options in, `{ js, css, warnings, dependencies }` out.
//! [`CompilerAdapter`] wraps it and normalizes the output into a
//! [`CompileRecord`](crate::cache::CompileRecord). The adapter never touches
//! the cache.

mod adapter;
mod error;

#[cfg(test)]
pub(crate) mod mock;

pub use adapter::CompilerAdapter;
pub use error::{CompileError, CompilerFailure, Location};

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::Code;

/// How the compiler should emit component styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssMode {
    /// Return CSS separately (served through the style virtual module).
    External,
    /// Embed CSS into the generated JS.
    Injected,
}

/// Everything the compiler needs for one invocation.
#[derive(Debug, Clone)]
pub struct CompileInput {
    pub filename: PathBuf,
    pub code: String,
    pub ssr: bool,
    pub dev: bool,
    pub css: CssMode,
    pub css_hash_prefix: Option<String>,
}

/// Non-fatal compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub code: Option<String>,
    pub message: String,
    pub location: Option<Location>,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            location: None,
        }
    }
}

/// Output as returned by the compiler, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    pub js: Code,
    pub css: Option<Code>,
    pub warnings: Vec<Warning>,
    pub dependencies: Vec<PathBuf>,
}

/// The external component compiler.
pub trait Compiler: Send + Sync {
    fn compile(
        &self,
        input: CompileInput,
    ) -> impl Future<Output = Result<RawOutput, CompilerFailure>> + Send;
}

impl<C: Compiler> Compiler for Arc<C> {
    fn compile(
        &self,
        input: CompileInput,
    ) -> impl Future<Output = Result<RawOutput, CompilerFailure>> + Send {
        (**self).compile(input)
    }
}
