//! Plugin options loaded from TOML.
//!
//! # Example
//!
//! ```toml
//! root = "/home/me/app"          # Identifiers under root are shown relative to it
//! extensions = [".svelte"]       # Files owned by this plugin
//! exclude = ["/vendor/"]         # Regex patterns of owned files to skip
//! emit_css = true                # Extract CSS into a virtual `?svelte&type=style` module
//! hot = true                     # Reconcile hot updates
//! verbose = false                # Print debug logs
//! emit_warnings = true           # Log compiler warnings
//!
//! [compiler]
//! dev = true
//! css_hash_prefix = "svelte"
//! ```
//!
//! [`PluginOptions`] is the raw, serde-facing shape. [`PluginOptions::resolve`]
//! validates it and produces [`ResolvedOptions`], which every component reads.

mod error;

pub use error::ConfigError;

use crate::log;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default extension owned by the plugin.
pub const DEFAULT_EXTENSION: &str = ".svelte";

// ============================================================================
// raw options
// ============================================================================

/// Raw plugin options as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginOptions {
    /// Project root. Empty means the current working directory.
    pub root: PathBuf,

    /// File extensions (with leading dot) compiled by this plugin.
    pub extensions: Vec<String>,

    /// Regex patterns; matching filenames are left to other plugins.
    pub exclude: Vec<String>,

    /// Emit CSS as a separate virtual module instead of injecting it into JS.
    pub emit_css: bool,

    /// Enable hot-update reconciliation.
    pub hot: bool,

    /// Print debug logs.
    pub verbose: bool,

    /// Log compiler warnings as they are produced.
    pub emit_warnings: bool,

    /// Options forwarded to the compiler.
    pub compiler: CompilerSection,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            extensions: vec![DEFAULT_EXTENSION.to_string()],
            exclude: Vec::new(),
            emit_css: true,
            hot: true,
            verbose: false,
            emit_warnings: true,
            compiler: CompilerSection::default(),
        }
    }
}

/// `[compiler]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompilerSection {
    /// Compile in dev mode (runtime checks, readable output).
    pub dev: bool,

    /// Prefix used by the compiler when hashing scoped class names.
    pub css_hash_prefix: Option<String>,
}

impl Default for CompilerSection {
    fn default() -> Self {
        Self {
            dev: true,
            css_hash_prefix: None,
        }
    }
}

impl PluginOptions {
    /// Parse options from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let (options, ignored) = Self::parse_with_ignored(content)?;
        if !ignored.is_empty() {
            log!("warning"; "ignoring unknown option(s): {}", ignored.join(", "));
        }
        Ok(options)
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Ok(Self::from_str(&content)?)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let options = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((options, ignored))
    }

    /// Validate and compile the options.
    pub fn resolve(self) -> Result<ResolvedOptions, ConfigError> {
        if self.extensions.is_empty() {
            return Err(ConfigError::validation(
                "extensions",
                "at least one extension is required",
            ));
        }
        if let Some(bad) = self.extensions.iter().find(|ext| !is_valid_extension(ext)) {
            return Err(ConfigError::validation(
                "extensions",
                format!("`{bad}` must start with `.` and name an extension"),
            ));
        }

        let exclude = self
            .exclude
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| {
                    ConfigError::validation("exclude", format!("`{pattern}`: {err}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let root = if self.root.as_os_str().is_empty() {
            std::env::current_dir()
                .map_err(|err| ConfigError::Io(PathBuf::from("."), err))?
        } else {
            self.root
        };
        if !root.is_absolute() {
            return Err(ConfigError::validation(
                "root",
                format!("`{}` must be an absolute path", root.display()),
            ));
        }

        crate::logger::set_verbose(self.verbose);

        Ok(ResolvedOptions {
            root,
            extensions: self.extensions,
            exclude,
            emit_css: self.emit_css,
            hot: self.hot,
            emit_warnings: self.emit_warnings,
            compiler: self.compiler,
        })
    }
}

fn is_valid_extension(ext: &str) -> bool {
    ext.len() > 1 && ext.starts_with('.') && !ext[1..].contains(['/', '\\', '?'])
}

// ============================================================================
// resolved options
// ============================================================================

/// Validated options shared by every component.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    pub exclude: Vec<Regex>,
    pub emit_css: bool,
    pub hot: bool,
    pub emit_warnings: bool,
    pub compiler: CompilerSection,
}

impl ResolvedOptions {
    /// Options with defaults, rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: vec![DEFAULT_EXTENSION.to_string()],
            exclude: Vec::new(),
            emit_css: true,
            hot: true,
            emit_warnings: true,
            compiler: CompilerSection::default(),
        }
    }

    /// Whether `filename` is a source file this plugin compiles.
    pub fn owns(&self, filename: &str) -> bool {
        self.extensions.iter().any(|ext| filename.ends_with(ext.as_str()))
            && !self.exclude.iter().any(|re| re.is_match(filename))
    }
}

// ============================================================================
// tests
// ============================================================================
