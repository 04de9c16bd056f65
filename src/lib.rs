//! svelte-bridge - compile cache, request routing and hot-update
//! reconciliation for a Svelte bundler plugin.
//!
//! A component file is compiled once and served as several virtual modules:
//! the JS module and, when the component has styles, a
//! `?svelte&type=style&lang.css` stylesheet. Both read the same cached
//! [`CompileRecord`](cache::CompileRecord). On a file change the
//! reconciler recompiles, diffs against the previous record and reports the
//! module ids the bundler must invalidate.
//!
//! - [`id`] - identifier codec
//! - [`cache`] - compile cache with in-flight deduplication
//! - [`compiler`] - compiler boundary and output normalization
//! - [`router`] - which cached artifact serves a request
//! - [`reload`] - hot-update reconciliation
//! - [`resolve`] - `svelte` manifest field resolution
//! - [`plugin`] - the session facade tying them together

pub mod logger;

pub mod cache;
pub mod compiler;
pub mod config;
pub mod error;
pub mod id;
pub mod plugin;
pub mod reload;
pub mod resolve;
pub mod router;

pub use config::{PluginOptions, ResolvedOptions};
pub use error::{Error, Result};
pub use plugin::SveltePlugin;
