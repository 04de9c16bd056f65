//! Packages whose manifest could not be inspected.

use std::collections::BTreeSet;

use parking_lot::Mutex;

/// Process-wide set of packages that do not export `package.json`.
///
/// Diagnostic only: accumulated during resolution and reported as a single
/// warning at the end of each build pass.
#[derive(Debug, Default)]
pub struct ExportViolations {
    packages: Mutex<BTreeSet<String>>,
}

impl ExportViolations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a package; `pkg/package.json` is recorded as `pkg`.
    pub fn add(&self, package: &str) {
        let name = package.strip_suffix("/package.json").unwrap_or(package);
        self.packages.lock().insert(name.to_string());
    }

    pub fn len(&self) -> usize {
        self.packages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.lock().is_empty()
    }

    /// One aggregated warning listing every package, or `None` if there are none.
    pub fn report(&self) -> Option<String> {
        let packages = self.packages.lock();
        if packages.is_empty() {
            return None;
        }
        let mut message = String::from(
            "The following packages did not export their `package.json` file so we could not check the \"svelte\" field. \
             If you had difficulties importing svelte components from a package, please ask its author to export `package.json`.",
        );
        for package in packages.iter() {
            message.push_str("\n- ");
            message.push_str(package);
        }
        Some(message)
    }
}
