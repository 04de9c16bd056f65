//! Hot-update reconciliation.
//!
//! Per change event: `Received → Recompiled → Diffed → {Reported, Fatal}`.
//!
//! - **Received**: events not newer than the last one seen for the file are
//!   dropped.
//! - **Recompiled**: the file is read from disk and compiled. A failure is
//!   fatal for this event and leaves the previous record in place.
//! - **Diffed**: the new record is compared with the previous one and then
//!   replaces it unconditionally.
//! - **Reported**: the ordered list of module ids to invalidate.
//!
//! Records that depend on the changed file (e.g. through a preprocessor
//! include) are reconciled the same way after the file itself.
//!
//! Recompiles go through the cache's pending slot, so a transform of the same
//! file arriving meanwhile waits for this compile instead of starting one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::diff::{UpdateKind, affected_ids, classify};
use crate::cache::{CacheKey, CompileCache, CompileRecord, Recomputed};
use crate::compiler::{CompileError, Compiler, CompilerAdapter};
use crate::id::IdParser;
use crate::{debug, log};

#[derive(Debug, Error)]
pub enum HotUpdateError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("failed to read `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of one change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotUpdateOutcome {
    /// Timestamp not newer than the last event for this file.
    Stale,
    /// Nothing cached depends on the file.
    NotLoaded,
    /// Module ids to invalidate, in order. Empty means nothing visible changed.
    Affected(Vec<String>),
}

impl HotUpdateOutcome {
    pub fn affected(&self) -> &[String] {
        match self {
            Self::Affected(ids) => ids,
            Self::Stale | Self::NotLoaded => &[],
        }
    }
}

pub struct HotUpdateReconciler<C> {
    cache: Arc<CompileCache>,
    adapter: Arc<CompilerAdapter<C>>,
    parser: IdParser,
    /// Latest event timestamp per file.
    last_seen: Mutex<FxHashMap<PathBuf, u64>>,
}

impl<C: Compiler> HotUpdateReconciler<C> {
    pub fn new(cache: Arc<CompileCache>, adapter: Arc<CompilerAdapter<C>>, parser: IdParser) -> Self {
        Self {
            cache,
            adapter,
            parser,
            last_seen: Mutex::new(FxHashMap::default()),
        }
    }

    /// Handle a change notification for `file`.
    ///
    /// The file's own DOM record is reconciled first, then every record that
    /// depends on it, in sorted order. Affected ids are deduplicated.
    pub async fn handle_change(
        &self,
        file: &Path,
        timestamp: u64,
    ) -> Result<HotUpdateOutcome, HotUpdateError> {
        if !self.adapter.options().hot {
            return Ok(HotUpdateOutcome::NotLoaded);
        }
        if !self.observe(file, timestamp) {
            debug!("hmr"; "ignoring stale change of {} ({timestamp})", file.display());
            return Ok(HotUpdateOutcome::Stale);
        }

        let loaded = self.cache.peek(&CacheKey::dom(file)).is_some();
        let dependents = self.cache.dependents(file);
        if !loaded {
            self.cache.invalidate_key(&CacheKey::new(file, true));
            if dependents.is_empty() {
                return Ok(HotUpdateOutcome::NotLoaded);
            }
        }

        let mut affected: Vec<String> = Vec::new();
        if loaded {
            extend_unique(&mut affected, self.reconcile(file).await?);
        }
        if !dependents.is_empty() {
            debug!("hmr"; "{} is used by {} record(s)", file.display(), dependents.len());
        }
        for key in dependents {
            // SSR output is not hot-swapped; recompile on the next SSR request.
            if key.ssr {
                self.cache.invalidate_key(&key);
                continue;
            }
            if self.cache.peek(&key).is_some() {
                extend_unique(&mut affected, self.reconcile(&key.filename).await?);
            }
        }
        Ok(HotUpdateOutcome::Affected(affected))
    }

    /// Record `timestamp` for `file`; false when it is not newer.
    fn observe(&self, file: &Path, timestamp: u64) -> bool {
        let mut last_seen = self.last_seen.lock();
        if last_seen.get(file).is_some_and(|&last| timestamp <= last) {
            return false;
        }
        last_seen.insert(file.to_path_buf(), timestamp);
        true
    }

    /// Recompile one cached component and report the ids to invalidate.
    async fn reconcile(&self, filename: &Path) -> Result<Vec<String>, HotUpdateError> {
        let Recomputed { previous, record } = self
            .cache
            .recompute(&CacheKey::dom(filename), || self.recompile(filename))
            .await
            .inspect_err(|err| log!("error"; "{err}"))?;

        let kind = match &previous {
            Some(previous) => classify(previous, &record),
            None => UpdateKind::Full,
        };
        self.cache.invalidate_key(&CacheKey::new(filename, true));

        let request = self.parser.request_for(filename, false);
        match kind {
            UpdateKind::Unchanged => {
                debug!("hmr"; "{} unchanged", request.normalized_filename)
            }
            _ => log!("hmr"; "{} {}", kind.as_str(), request.normalized_filename),
        }
        Ok(affected_ids(
            kind,
            &self.parser.main_id(filename),
            &self.parser.style_id(&request),
        ))
    }

    /// Read `filename` from disk and compile it for the client.
    async fn recompile(&self, filename: &Path) -> Result<CompileRecord, HotUpdateError> {
        let code = tokio::fs::read_to_string(filename)
            .await
            .map_err(|source| HotUpdateError::Io {
                path: filename.to_path_buf(),
                source,
            })?;
        Ok(self.adapter.compile(filename, &code, false).await?)
    }
}

fn extend_unique(affected: &mut Vec<String>, ids: Vec<String>) {
    for id in ids {
        if !affected.contains(&id) {
            affected.push(id);
        }
    }
}
