//! `svelte` field lookup for bare imports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use super::{ExportViolations, ManifestLookupError, PackageResolver, ResolveError};
use crate::{debug, log};

/// Node builtins never carry a `svelte` field.
const NODE_BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "crypto", "events", "fs", "http", "https", "module",
    "net", "os", "path", "process", "querystring", "stream", "string_decoder", "timers", "tls",
    "url", "util", "vm", "worker_threads", "zlib",
];

/// Common dependencies known to have no `svelte` field; skip the lookup.
const COMMON_DEPS_WITHOUT_SVELTE_FIELD: &[&str] = &[
    "@sveltejs/vite-plugin-svelte",
    "@sveltejs/kit",
    "svelte",
    "vite",
    "vitest",
    "debug",
    "tslib",
];

/// `pkg` or `@scope/pkg`: not relative, absolute, virtual or a URL.
pub fn is_bare_import(importee: &str) -> bool {
    if importee.is_empty()
        || importee.starts_with(['.', '\0', '/'])
        || importee.contains(':')
        || Path::new(importee).is_absolute()
    {
        return false;
    }
    let parts: Vec<&str> = importee.split('/').collect();
    match parts.as_slice() {
        [_] => true,
        [scope, name] => scope.starts_with('@') && scope.len() > 1 && !name.is_empty(),
        _ => false,
    }
}

fn is_node_builtin(importee: &str) -> bool {
    importee.starts_with("node:") || NODE_BUILTINS.contains(&importee)
}

/// Resolves bare imports to the file named by their package's `svelte` field.
pub struct SvelteFieldResolver<R> {
    packages: R,
    violations: Arc<ExportViolations>,
    resolved: DashMap<(String, PathBuf), PathBuf>,
}

impl<R: PackageResolver> SvelteFieldResolver<R> {
    pub fn new(packages: R, violations: Arc<ExportViolations>) -> Self {
        Self {
            packages,
            violations,
            resolved: DashMap::new(),
        }
    }

    pub fn violations(&self) -> &ExportViolations {
        &self.violations
    }

    /// Resolve `importee` imported from `importer`.
    ///
    /// `Ok(None)` means "not handled here". A package that does not export its
    /// manifest is recorded for the end-of-build warning and also yields
    /// `Ok(None)`; any other manifest failure is an error.
    pub fn resolve(
        &self,
        importee: &str,
        importer: Option<&Path>,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let Some(importer) = importer else {
            return Ok(None);
        };
        if !is_bare_import(importee)
            || is_node_builtin(importee)
            || COMMON_DEPS_WITHOUT_SVELTE_FIELD.contains(&importee)
        {
            return Ok(None);
        }

        let key = (
            importee.to_string(),
            importer.parent().unwrap_or(importer).to_path_buf(),
        );
        if let Some(hit) = self.resolved.get(&key) {
            return Ok(Some(hit.clone()));
        }

        match self.packages.resolve_package(importee, importer) {
            Ok(Some(package)) => {
                let entry = package.svelte_entry();
                if let Some(entry) = &entry {
                    debug!("resolve"; "{importee} -> {}", entry.display());
                    self.resolved.insert(key, entry.clone());
                }
                Ok(entry)
            }
            Ok(None) => Ok(None),
            Err(ManifestLookupError::NotExported { package }) => {
                self.violations.add(&package);
                Ok(None)
            }
            Err(ManifestLookupError::Access { package, source }) => {
                Err(ResolveError::ManifestAccess { package, source })
            }
        }
    }

    /// End of a build pass: emit the aggregated export warning, if any.
    pub fn build_end(&self) -> Option<String> {
        let report = self.violations.report()?;
        log!("warn"; "{report}");
        Some(report)
    }
}
