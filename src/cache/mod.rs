//! Compile cache.
//!
//! - `record` - immutable compile records and source digests
//! - `store` - the cache itself, with in-flight deduplication
//! - `graph` - reverse dependency tracking for hot updates
//!
//! The cache is an owned object created per plugin session and shared via
//! `Arc`; there is no global instance.

mod graph;
mod record;
mod store;

pub use graph::DependencyGraph;
pub use record::{Code, CompileRecord, SourceDigest};
pub use store::{CacheKey, CompileCache, Recomputed};
