//! Hot-update reconciliation.
//!
//! - `diff` - pure classification of a recompile (unchanged / css / reload)
//! - `reconcile` - the per-event state machine that recompiles, diffs and
//!   replaces cache records

pub mod diff;
pub mod reconcile;

pub use diff::UpdateKind;
pub use reconcile::{HotUpdateError, HotUpdateOutcome, HotUpdateReconciler};
