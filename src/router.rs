//! Request routing: which cached artifact serves a request.
//!
//! Main requests compile through the cache and receive JS. Style
//! sub-requests only read what their main request already compiled; a style
//! request with nothing cached is a pipeline-ordering bug and fails loudly.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::{CacheKey, Code, CompileCache, CompileRecord, SourceDigest};
use crate::compiler::{CompileError, Compiler, CompilerAdapter};
use crate::debug;
use crate::id::{IdParser, Request, VirtualKind};

/// Errors surfaced to the bundler while serving a request.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A style sub-request arrived before its main request was compiled.
    #[error("no compiled output for `{}`: style requested before the component was compiled", filename.display())]
    ProtocolViolation { filename: PathBuf },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("failed to read `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How a parsed request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Compile (or reuse) and serve JS.
    Main,
    /// Serve CSS from the record of the main request.
    Style,
    /// Marker flag without a known artifact type: not served here.
    Unhandled,
}

impl Route {
    pub fn of(request: &Request) -> Self {
        match (request.query.is_svelte(), request.query.kind()) {
            (false, _) => Self::Main,
            (true, Some(VirtualKind::Style)) => Self::Style,
            (true, None) => Self::Unhandled,
        }
    }
}

pub struct RequestRouter<C> {
    cache: Arc<CompileCache>,
    adapter: Arc<CompilerAdapter<C>>,
    parser: IdParser,
}

impl<C: Compiler> RequestRouter<C> {
    pub fn new(cache: Arc<CompileCache>, adapter: Arc<CompilerAdapter<C>>, parser: IdParser) -> Self {
        Self {
            cache,
            adapter,
            parser,
        }
    }

    /// Content for `request`, or `None` when there is nothing to serve.
    ///
    /// `code` is the source text for main requests; when absent the file is
    /// read from disk. Style requests ignore it.
    pub async fn resolve_content(
        &self,
        request: &Request,
        code: Option<&str>,
    ) -> Result<Option<Code>, RouteError> {
        match Route::of(request) {
            Route::Main => {
                let code = match code {
                    Some(code) => code.to_string(),
                    None => read_source(&request.filename).await?,
                };
                self.serve_main(request, &code).await.map(Some)
            }
            Route::Style => self.serve_style(request).await,
            Route::Unhandled => Ok(None),
        }
    }

    /// Identifier of the style module derived from a compiled main request,
    /// or `None` when the component has no CSS.
    pub fn style_id_for(&self, request: &Request) -> Option<String> {
        self.cache
            .peek(&CacheKey::from(request))
            .filter(|record| record.has_css())
            .map(|_| self.parser.style_id(request))
    }

    /// Resolve an identifier that already names one of our virtual modules.
    ///
    /// Returns the canonical id; no filesystem resolution is attempted.
    pub fn resolve_virtual_id(&self, id: &str, ssr: bool) -> Option<String> {
        let request = self.parser.parse(id, ssr, None)?;
        (Route::of(&request) == Route::Style).then(|| self.parser.serialize(&request))
    }

    async fn serve_main(&self, request: &Request, code: &str) -> Result<Code, RouteError> {
        let key = CacheKey::from(request);
        let digest = SourceDigest::of(code, request.ssr);
        let record = self
            .cache
            .get_or_compute_fresh(&key, digest, || {
                self.adapter.compile(&request.filename, code, request.ssr)
            })
            .await?;
        Ok(self.main_code(request, &record))
    }

    /// CSS of the main request's record, waiting for it if still compiling.
    async fn serve_style(&self, request: &Request) -> Result<Option<Code>, RouteError> {
        let record = self
            .cache
            .settled(&CacheKey::from(request))
            .await
            .ok_or_else(|| RouteError::ProtocolViolation {
                filename: request.filename.clone(),
            })??;
        if record.css.is_none() {
            debug!("router"; "{} has no css", request.normalized_filename);
        }
        Ok(record.css.clone())
    }

    /// Compiled JS, importing the style module when CSS is emitted separately.
    fn main_code(&self, request: &Request, record: &CompileRecord) -> Code {
        let mut js = record.js.clone();
        if record.has_css() && self.adapter.options().emit_css {
            let style_id = self.parser.style_id(request);
            js.code.push_str(&format!("\nimport {style_id:?};\n"));
        }
        js
    }
}

async fn read_source(path: &std::path::Path) -> Result<String, RouteError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RouteError::Io {
            path: path.to_path_buf(),
            source,
        })
}
