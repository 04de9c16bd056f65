//! Structured request derived from one module identifier.

use std::path::PathBuf;

use super::query::{RequestQuery, VirtualKind};

/// A request for one logical output of a source file.
///
/// Without the marker flag this is the *main* request (the component's JS
/// module). With the marker flag and `type=style` it is the *style
/// sub-request*, which only ever reads what the main request compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Absolute path of the source file, query stripped.
    pub filename: PathBuf,
    /// Path relative to the project root (leading `/`), or the absolute path
    /// when the file lives outside the root. Used for display only.
    pub normalized_filename: String,
    pub query: RequestQuery,
    /// Render target of the requesting environment.
    pub ssr: bool,
    /// Set when the request originates from a file-change event.
    pub timestamp: Option<u64>,
}

impl Request {
    pub fn is_main(&self) -> bool {
        !self.query.is_svelte()
    }

    pub fn is_style(&self) -> bool {
        self.query.is_svelte() && self.query.kind() == Some(VirtualKind::Style)
    }

    /// The stylesheet sub-request derived from this request.
    pub fn style_request(&self) -> Self {
        Self {
            query: RequestQuery::style(),
            ..self.clone()
        }
    }

    /// The main request for the same file.
    pub fn main_request(&self) -> Self {
        Self {
            query: RequestQuery::default(),
            ..self.clone()
        }
    }
}
