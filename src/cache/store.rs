//! Compile cache with in-flight deduplication.
//!
//! One slot per [`CacheKey`]: either a finished record or a pending compile.
//! A caller that finds a pending slot awaits the same result instead of
//! starting its own compile. Different keys never wait on each other.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use tokio::sync::watch;

use super::graph::DependencyGraph;
use super::record::{CompileRecord, SourceDigest};
use crate::compiler::CompileError;
use crate::debug;
use crate::id::Request;

/// Cache key: one record per file and render target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub filename: PathBuf,
    pub ssr: bool,
}

impl CacheKey {
    pub fn new(filename: impl Into<PathBuf>, ssr: bool) -> Self {
        Self {
            filename: filename.into(),
            ssr,
        }
    }

    /// Key of the client-side (DOM) record.
    pub fn dom(filename: impl Into<PathBuf>) -> Self {
        Self::new(filename, false)
    }
}

impl From<&Request> for CacheKey {
    fn from(request: &Request) -> Self {
        Self::new(request.filename.clone(), request.ssr)
    }
}

impl From<&CompileRecord> for CacheKey {
    fn from(record: &CompileRecord) -> Self {
        Self::new(record.filename.clone(), record.ssr)
    }
}

/// Outcome of [`CompileCache::recompute`].
#[derive(Debug, Clone)]
pub struct Recomputed {
    /// Record the new one replaced, if the slot held one.
    pub previous: Option<Arc<CompileRecord>>,
    pub record: Arc<CompileRecord>,
}

type Shared = Result<Arc<CompileRecord>, CompileError>;

enum Slot {
    Ready(Arc<CompileRecord>),
    Pending {
        id: u64,
        rx: watch::Receiver<Option<Shared>>,
    },
}

impl Slot {
    fn is_pending(&self, pending_id: u64) -> bool {
        matches!(self, Self::Pending { id, .. } if *id == pending_id)
    }
}

/// Which stored records a caller accepts instead of compiling.
#[derive(Debug, Clone, Copy)]
enum Reuse {
    Any,
    Matching(SourceDigest),
    Never,
}

impl Reuse {
    fn accepts(self, record: &CompileRecord) -> bool {
        match self {
            Self::Any => true,
            Self::Matching(digest) => digest == record.source_digest,
            Self::Never => false,
        }
    }
}

/// The caller owns the pending slot and must compile.
struct Lead {
    id: u64,
    tx: watch::Sender<Option<Shared>>,
    /// Ready record the pending slot displaced.
    previous: Option<Arc<CompileRecord>>,
}

enum Claim {
    Hit(Arc<CompileRecord>),
    Wait(watch::Receiver<Option<Shared>>),
    Lead(Lead),
}

/// Latest compile record per source file.
///
/// Records are immutable once stored; every update replaces the whole
/// record. A failed compile leaves the previous record in place.
pub struct CompileCache {
    slots: DashMap<CacheKey, Slot>,
    graph: RwLock<DependencyGraph>,
    next_id: AtomicU64,
}

impl Default for CompileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CompileCache {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            graph: RwLock::new(DependencyGraph::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Return the cached record, or run `compute` once and store its result.
    ///
    /// Concurrent callers for the same key share one `compute` invocation.
    /// A failing `compute` propagates to every waiting caller and stores
    /// nothing.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, compute: F) -> Shared
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompileRecord, CompileError>>,
    {
        self.get_or_compute_inner(key, Reuse::Any, compute).await
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but a cached record
    /// produced from a different source digest counts as stale.
    pub async fn get_or_compute_fresh<F, Fut>(
        &self,
        key: &CacheKey,
        digest: SourceDigest,
        compute: F,
    ) -> Shared
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompileRecord, CompileError>>,
    {
        self.get_or_compute_inner(key, Reuse::Matching(digest), compute)
            .await
    }

    async fn get_or_compute_inner<F, Fut>(&self, key: &CacheKey, reuse: Reuse, compute: F) -> Shared
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompileRecord, CompileError>>,
    {
        let Lead { id, tx, previous } = loop {
            match self.claim(key, reuse) {
                Claim::Hit(record) => return Ok(record),
                Claim::Lead(lead) => break lead,
                Claim::Wait(rx) => match Self::wait(rx).await {
                    // Joined a compile of other source text: claim again.
                    Some(Ok(record)) if !reuse.accepts(&record) => {}
                    Some(result) => return result,
                    // Leader went away without a result.
                    None => {}
                },
            }
        };

        let mut guard = PendingGuard {
            cache: self,
            key,
            id,
            previous,
            armed: true,
        };
        let result = compute().await.map(Arc::new);
        if let Ok(record) = &result {
            guard.armed = false;
            self.store(key, id, record);
        }
        drop(guard);

        tx.send_replace(Some(result.clone()));
        result
    }

    /// Compile `key` again even if a record is cached, through the same
    /// pending slot as [`get_or_compute`](Self::get_or_compute).
    ///
    /// A compile already in flight finishes first. Callers arriving while
    /// this one runs wait for its result. On failure the previous record is
    /// restored and waiters retry on their own; the error is not shared.
    pub async fn recompute<F, Fut, E>(&self, key: &CacheKey, compute: F) -> Result<Recomputed, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompileRecord, E>>,
    {
        let Lead { id, tx, previous } = loop {
            match self.claim(key, Reuse::Never) {
                Claim::Lead(lead) => break lead,
                Claim::Wait(rx) => {
                    Self::wait(rx).await;
                }
                Claim::Hit(_) => {}
            }
        };

        let mut guard = PendingGuard {
            cache: self,
            key,
            id,
            previous: previous.clone(),
            armed: true,
        };
        let record = Arc::new(compute().await?);
        guard.armed = false;
        self.store(key, id, &record);

        tx.send_replace(Some(Ok(record.clone())));
        Ok(Recomputed { previous, record })
    }

    /// Read without computing.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<CompileRecord>> {
        match self.slots.get(key).as_deref() {
            Some(Slot::Ready(record)) => Some(record.clone()),
            _ => None,
        }
    }

    /// Read without computing, awaiting a compile that is already in flight.
    ///
    /// `None` when nothing is cached or pending for `key`.
    pub async fn settled(&self, key: &CacheKey) -> Option<Shared> {
        loop {
            let rx = match self.slots.get(key).as_deref() {
                Some(Slot::Ready(record)) => return Some(Ok(record.clone())),
                Some(Slot::Pending { rx, .. }) => rx.clone(),
                None => return None,
            };
            // `None`: the leader gave up and restored the slot; look again.
            if let Some(result) = Self::wait(rx).await {
                return Some(result);
            }
        }
    }

    /// Store `record`, replacing whatever the slot held.
    ///
    /// A compile in flight for the same key still delivers to its waiters but
    /// will not overwrite this record.
    pub fn replace(&self, record: CompileRecord) -> Option<Arc<CompileRecord>> {
        let key = CacheKey::from(&record);
        self.graph.write().record(&key, &record.dependencies);
        match self.slots.insert(key, Slot::Ready(Arc::new(record))) {
            Some(Slot::Ready(previous)) => Some(previous),
            _ => None,
        }
    }

    /// Drop every record (both render targets) for `filename`.
    pub fn invalidate(&self, filename: &Path) {
        for ssr in [false, true] {
            self.invalidate_key(&CacheKey::new(filename, ssr));
        }
    }

    /// Drop one record.
    pub fn invalidate_key(&self, key: &CacheKey) {
        self.graph.write().remove(key);
        if self.slots.remove(key).is_some() {
            debug!("cache"; "invalidated {} (ssr: {})", key.filename.display(), key.ssr);
        }
    }

    /// Records whose output depends on `file`, sorted.
    pub fn dependents(&self, file: &Path) -> Vec<CacheKey> {
        self.graph.read().dependents(file)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything (session end).
    pub fn clear(&self) {
        self.slots.clear();
        self.graph.write().clear();
    }

    // -------------------------------------------------------------------------
    // Private
    // -------------------------------------------------------------------------

    /// Atomically decide between hit, join, or lead for `key`.
    fn claim(&self, key: &CacheKey, reuse: Reuse) -> Claim {
        let entry = self.slots.entry(key.clone());
        let previous = match &entry {
            Entry::Occupied(occupied) => match occupied.get() {
                Slot::Ready(record) if reuse.accepts(record) => {
                    return Claim::Hit(record.clone());
                }
                Slot::Pending { rx, .. } => return Claim::Wait(rx.clone()),
                Slot::Ready(record) => {
                    debug!("cache"; "recompiling {} (ssr: {})", key.filename.display(), key.ssr);
                    Some(record.clone())
                }
            },
            Entry::Vacant(_) => None,
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        entry.insert(Slot::Pending { id, rx });
        Claim::Lead(Lead { id, tx, previous })
    }

    async fn wait(mut rx: watch::Receiver<Option<Shared>>) -> Option<Shared> {
        match rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        }
    }

    /// Store a finished record if our pending slot is still current.
    fn store(&self, key: &CacheKey, id: u64, record: &Arc<CompileRecord>) {
        let stored = self.slots.get_mut(key).is_some_and(|mut slot| {
            if slot.is_pending(id) {
                *slot = Slot::Ready(record.clone());
                true
            } else {
                false
            }
        });
        if stored {
            self.graph.write().record(key, &record.dependencies);
        } else {
            debug!("cache"; "discarding superseded compile of {}", key.filename.display());
        }
    }

    /// Put `previous` back into a slot we still hold pending, or free it.
    fn restore(&self, key: &CacheKey, id: u64, previous: Option<Arc<CompileRecord>>) {
        match previous {
            Some(record) => {
                if let Some(mut slot) = self.slots.get_mut(key)
                    && slot.is_pending(id)
                {
                    *slot = Slot::Ready(record);
                }
            }
            None => {
                self.slots.remove_if(key, |_, slot| slot.is_pending(id));
            }
        }
    }
}

/// Restores a pending slot whose leader failed or was dropped.
struct PendingGuard<'a> {
    cache: &'a CompileCache,
    key: &'a CacheKey,
    id: u64,
    previous: Option<Arc<CompileRecord>>,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.restore(self.key, self.id, self.previous.take());
        }
    }
}
