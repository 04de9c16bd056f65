//! Normalizes compiler output into cache records.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{CompileError, CompileInput, Compiler, CssMode, RawOutput};
use crate::cache::{CompileRecord, SourceDigest};
use crate::config::ResolvedOptions;
use crate::{debug, log};

/// Invokes the compiler with resolved options.
pub struct CompilerAdapter<C> {
    compiler: C,
    options: Arc<ResolvedOptions>,
}

impl<C: Compiler> CompilerAdapter<C> {
    pub fn new(compiler: C, options: Arc<ResolvedOptions>) -> Self {
        Self { compiler, options }
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// Compile `code` for `filename`.
    ///
    /// Warnings stay warnings; only a fatal compiler error fails.
    pub async fn compile(
        &self,
        filename: &Path,
        code: &str,
        ssr: bool,
    ) -> Result<CompileRecord, CompileError> {
        let input = CompileInput {
            filename: filename.to_path_buf(),
            code: code.to_string(),
            ssr,
            dev: self.options.compiler.dev,
            css: if self.options.emit_css {
                CssMode::External
            } else {
                CssMode::Injected
            },
            css_hash_prefix: self.options.compiler.css_hash_prefix.clone(),
        };

        debug!("compile"; "{} (ssr: {ssr})", filename.display());
        let output = self
            .compiler
            .compile(input)
            .await
            .map_err(|failure| CompileError::from_failure(filename, failure))?;

        let record = self.to_record(filename, SourceDigest::of(code, ssr), ssr, output);
        if self.options.emit_warnings {
            for warning in &record.warnings {
                log!("warn"; "{}: {}", filename.display(), warning.message);
            }
        }
        Ok(record)
    }

    fn to_record(
        &self,
        filename: &Path,
        source_digest: SourceDigest,
        ssr: bool,
        output: RawOutput,
    ) -> CompileRecord {
        let css = if self.options.emit_css {
            output.css.filter(|css| !css.code.trim().is_empty())
        } else {
            None
        };

        CompileRecord {
            filename: filename.to_path_buf(),
            ssr,
            source_digest,
            js: output.js,
            css,
            dependencies: normalize_dependencies(filename, output.dependencies),
            warnings: output.warnings,
        }
    }
}

/// Absolute, sorted, deduplicated, without the file itself.
fn normalize_dependencies(filename: &Path, deps: Vec<PathBuf>) -> Vec<PathBuf> {
    let base = filename.parent().unwrap_or(Path::new("/"));
    let mut deps: Vec<PathBuf> = deps
        .into_iter()
        .map(|dep| if dep.is_absolute() { dep } else { base.join(dep) })
        .filter(|dep| dep != filename)
        .collect();
    deps.sort();
    deps.dedup();
    deps
}
