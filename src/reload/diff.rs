//! Classify what changed between two compile records.

use crate::cache::CompileRecord;

/// What a recompilation changed, from the bundler's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Same JS, same CSS.
    Unchanged,
    /// Same JS, different CSS: the style module can be swapped in place.
    StyleOnly,
    /// JS changed (or CSS appeared/disappeared, which changes the served JS).
    Full,
}

impl UpdateKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::StyleOnly => "css",
            Self::Full => "reload",
        }
    }
}

/// Compare the previous and new record of one file.
pub fn classify(previous: &CompileRecord, next: &CompileRecord) -> UpdateKind {
    if previous.js.code != next.js.code || previous.has_css() != next.has_css() {
        return UpdateKind::Full;
    }
    fn css(record: &CompileRecord) -> Option<&str> {
        record.css.as_ref().map(|css| css.code.as_str())
    }
    if css(previous) != css(next) {
        UpdateKind::StyleOnly
    } else {
        UpdateKind::Unchanged
    }
}

/// Ordered module ids to invalidate for an update.
///
/// A full reload lists only the main module: its style import re-resolves
/// once the main module reloads.
pub fn affected_ids(kind: UpdateKind, main_id: &str, style_id: &str) -> Vec<String> {
    match kind {
        UpdateKind::Unchanged => Vec::new(),
        UpdateKind::StyleOnly => vec![style_id.to_string()],
        UpdateKind::Full => vec![main_id.to_string()],
    }
}
