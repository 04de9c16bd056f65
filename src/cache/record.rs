//! Cached compile output for one source file.

use std::fmt;
use std::path::PathBuf;

use crate::compiler::Warning;

/// A 256-bit digest of the compiler input (blake3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceDigest([u8; 32]);

impl SourceDigest {
    /// Digest of `code` compiled for the given render target.
    pub fn of(code: &str, ssr: bool) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[u8::from(ssr)]);
        hasher.update(code.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SourceDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Generated code plus optional source map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Code {
    pub code: String,
    pub map: Option<String>,
}

impl Code {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }

    pub fn with_map(mut self, map: impl Into<String>) -> Self {
        self.map = Some(map.into());
        self
    }
}

/// Result of compiling one source file at one point in time.
///
/// Immutable once stored: the cache hands out `Arc<CompileRecord>` and
/// updates replace the whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRecord {
    pub filename: PathBuf,
    pub ssr: bool,
    pub source_digest: SourceDigest,
    pub js: Code,
    /// `None` when the component has no scoped styles (or CSS is injected).
    pub css: Option<Code>,
    /// Other files the output depends on, sorted and deduplicated.
    pub dependencies: Vec<PathBuf>,
    pub warnings: Vec<Warning>,
}

impl CompileRecord {
    pub fn has_css(&self) -> bool {
        self.css.is_some()
    }
}
