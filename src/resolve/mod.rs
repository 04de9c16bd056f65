//! Resolution of bare imports through the package manifest `svelte` field.
//!
//! Manifest lookup itself is an external collaborator ([`PackageResolver`]).
//! This module decides which imports to look up, reads the `svelte` field,
//! and defers "manifest not exported" failures into [`ExportViolations`].

mod svelte_field;
mod violations;

pub use svelte_field::{SvelteFieldResolver, is_bare_import};
pub use violations::ExportViolations;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A package directory and its parsed `package.json`.
#[derive(Debug, Clone)]
pub struct PackageData {
    pub dir: PathBuf,
    pub manifest: serde_json::Value,
}

impl PackageData {
    /// Entry point named by the `svelte` field, resolved against the package dir.
    pub fn svelte_entry(&self) -> Option<PathBuf> {
        self.manifest
            .get("svelte")
            .and_then(serde_json::Value::as_str)
            .map(|entry| self.dir.join(entry))
    }
}

/// Failure signalled by a [`PackageResolver`].
#[derive(Debug, Error)]
pub enum ManifestLookupError {
    /// The package's `exports` map does not expose `package.json`.
    #[error("package `{package}` does not export `package.json`")]
    NotExported { package: String },

    #[error("cannot access manifest of `{package}`")]
    Access {
        package: String,
        #[source]
        source: std::io::Error,
    },
}

/// Error propagated to the bundler.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot access manifest of `{package}`")]
    ManifestAccess {
        package: String,
        #[source]
        source: std::io::Error,
    },
}

/// Finds the manifest of a package as seen from an importing file.
pub trait PackageResolver: Send + Sync {
    fn resolve_package(
        &self,
        name: &str,
        importer: &Path,
    ) -> Result<Option<PackageData>, ManifestLookupError>;
}
