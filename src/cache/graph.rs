//! Reverse dependency tracking between cache records and their includes.

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};

use super::store::CacheKey;

/// Bidirectional dependency graph.
///
/// Sources are cache keys, so DOM and SSR records of one file keep their own
/// dependency lists.
///
/// # Invariants
/// - Forward and reverse mappings are always consistent
/// - Self-references are excluded
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Forward: record → files its output depends on
    forward: FxHashMap<CacheKey, FxHashSet<PathBuf>>,
    /// Reverse: dependency → records that use it
    reverse: FxHashMap<PathBuf, FxHashSet<CacheKey>>,
}

impl DependencyGraph {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record dependencies for a cache record, replacing any previous set.
    pub fn record(&mut self, source: &CacheKey, deps: &[PathBuf]) {
        self.remove(source);

        let deps: FxHashSet<PathBuf> = deps
            .iter()
            .filter(|p| **p != source.filename)
            .cloned()
            .collect();

        for dep in &deps {
            self.reverse
                .entry(dep.clone())
                .or_default()
                .insert(source.clone());
        }
        self.forward.insert(source.clone(), deps);
    }

    /// Records whose output depends on `file`, sorted by filename then target.
    pub fn dependents(&self, file: &Path) -> Vec<CacheKey> {
        let mut out: Vec<CacheKey> = self
            .reverse
            .get(file)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Forget a record and clean up its reverse mappings.
    pub fn remove(&mut self, source: &CacheKey) {
        let Some(old_deps) = self.forward.remove(source) else {
            return;
        };

        for dep in old_deps {
            if let Some(dependents) = self.reverse.get_mut(&dep) {
                dependents.remove(source);
                if dependents.is_empty() {
                    self.reverse.remove(&dep);
                }
            }
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}
