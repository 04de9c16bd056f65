//! Plugin session: the hooks a bundler calls.
//!
//! One [`SveltePlugin`] per build or dev-server session. It owns the compile
//! cache and wires the router, reconciler and resolver to it.

use std::path::Path;
use std::sync::Arc;

use crate::cache::{Code, CompileCache};
use crate::compiler::{Compiler, CompilerAdapter};
use crate::config::{PluginOptions, ResolvedOptions};
use crate::error::Result;
use crate::id::IdParser;
use crate::reload::{HotUpdateOutcome, HotUpdateReconciler};
use crate::resolve::{ExportViolations, PackageResolver, SvelteFieldResolver};
use crate::router::{RequestRouter, Route};
use crate::{debug, log};

pub struct SveltePlugin<C, R> {
    options: Arc<ResolvedOptions>,
    parser: IdParser,
    cache: Arc<CompileCache>,
    router: RequestRouter<C>,
    reconciler: HotUpdateReconciler<C>,
    resolver: SvelteFieldResolver<R>,
}

impl<C: Compiler, R: PackageResolver> SveltePlugin<C, R> {
    pub fn new(options: ResolvedOptions, compiler: C, packages: R) -> Self {
        let options = Arc::new(options);
        let parser = IdParser::new(options.clone());
        let cache = Arc::new(CompileCache::new());
        let adapter = Arc::new(CompilerAdapter::new(compiler, options.clone()));

        debug!("plugin"; "session started at {}", options.root.display());
        Self {
            router: RequestRouter::new(cache.clone(), adapter.clone(), parser.clone()),
            reconciler: HotUpdateReconciler::new(cache.clone(), adapter, parser.clone()),
            resolver: SvelteFieldResolver::new(packages, Arc::new(ExportViolations::new())),
            options,
            parser,
            cache,
        }
    }

    /// Validate raw options and start a session.
    pub fn from_options(options: PluginOptions, compiler: C, packages: R) -> Result<Self> {
        Ok(Self::new(options.resolve()?, compiler, packages))
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    pub fn cache(&self) -> &CompileCache {
        &self.cache
    }

    /// Resolve an import.
    ///
    /// Our virtual style ids resolve to themselves; bare imports may resolve
    /// through their package's `svelte` field. `None` defers to the bundler.
    pub fn resolve_id(
        &self,
        id: &str,
        importer: Option<&Path>,
        ssr: bool,
    ) -> Result<Option<String>> {
        if let Some(virtual_id) = self.router.resolve_virtual_id(id, ssr) {
            return Ok(Some(virtual_id));
        }
        let resolved = self.resolver.resolve(id, importer)?;
        Ok(resolved.map(|path| path.to_string_lossy().into_owned()))
    }

    /// Load a virtual style module. Component sources are left to the bundler.
    pub async fn load(&self, id: &str, ssr: bool) -> Result<Option<Code>> {
        let Some(request) = self.parser.parse(id, ssr, None) else {
            return Ok(None);
        };
        if Route::of(&request) != Route::Style {
            return Ok(None);
        }
        Ok(self.router.resolve_content(&request, None).await?)
    }

    /// Compile a component source to JS.
    pub async fn transform(&self, code: &str, id: &str, ssr: bool) -> Result<Option<Code>> {
        let Some(request) = self.parser.parse(id, ssr, None) else {
            return Ok(None);
        };
        if Route::of(&request) != Route::Main {
            return Ok(None);
        }
        Ok(self.router.resolve_content(&request, Some(code)).await?)
    }

    /// Reconcile a file change; see [`HotUpdateReconciler::handle_change`].
    pub async fn handle_hot_update(&self, file: &Path, timestamp: u64) -> Result<HotUpdateOutcome> {
        Ok(self.reconciler.handle_change(file, timestamp).await?)
    }

    /// End of a build pass. Returns the aggregated export warning, if any.
    pub fn build_end(&self) -> Option<String> {
        self.resolver.build_end()
    }

    /// End of the session: drop every cached record.
    pub fn close(&self) {
        log!("plugin"; "closing, {} record(s) dropped", self.cache.len());
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use crate::compiler::mock::MockCompiler;
    use crate::error::Error;
    use crate::resolve::{ManifestLookupError, PackageData};
    use crate::router::RouteError;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Every package hides its manifest except `svelte-*` ones.
    struct Packages;

    impl PackageResolver for Packages {
        fn resolve_package(
            &self,
            name: &str,
            _importer: &Path,
        ) -> std::result::Result<Option<PackageData>, ManifestLookupError> {
            if !name.starts_with("svelte-") {
                return Err(ManifestLookupError::NotExported {
                    package: format!("{name}/package.json"),
                });
            }
            Ok(Some(PackageData {
                dir: PathBuf::from("/app/node_modules").join(name),
                manifest: serde_json::json!({ "svelte": "src/index.svelte" }),
            }))
        }
    }

    type Plugin = SveltePlugin<Arc<MockCompiler>, Packages>;

    fn plugin(root: &Path, compiler: MockCompiler) -> (Plugin, Arc<MockCompiler>) {
        let mut options = ResolvedOptions::with_root(root);
        options.emit_warnings = false;
        let compiler = Arc::new(compiler);
        (SveltePlugin::new(options, compiler.clone(), Packages), compiler)
    }

    const SOURCE: &str = "<script>let n = 0;</script><p>hi</p><style>p { margin: 0; }</style>";

    #[tokio::test]
    async fn test_transform_then_load_style() {
        let (plugin, compiler) = plugin(Path::new("/app"), MockCompiler::new());

        let js = plugin
            .transform(SOURCE, "/app/A.svelte", false)
            .await
            .unwrap()
            .unwrap();
        let style_id = "/app/A.svelte?svelte&type=style&lang.css";
        assert!(js.code.contains(style_id));

        let resolved = plugin.resolve_id(style_id, None, false).unwrap();
        assert_eq!(resolved.as_deref(), Some(style_id));

        let css = plugin.load(style_id, false).await.unwrap().unwrap();
        assert_eq!(css.code, "p { margin: 0; }");
        assert_eq!(compiler.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_main_and_style_compile_once() {
        let (plugin, compiler) = plugin(Path::new("/app"), MockCompiler::with_yields(5));
        let style_id = "/app/A.svelte?svelte&type=style&lang.css";

        let (js, css) = tokio::join!(
            plugin.transform(SOURCE, "/app/A.svelte", false),
            plugin.load(style_id, false),
        );
        assert!(js.unwrap().is_some());
        assert_eq!(css.unwrap().unwrap().code, "p { margin: 0; }");
        assert_eq!(compiler.calls(), 1);
    }

    #[tokio::test]
    async fn test_style_before_main_is_protocol_violation() {
        let (plugin, compiler) = plugin(Path::new("/app"), MockCompiler::new());
        let err = plugin
            .load("/app/A.svelte?svelte&type=style&lang.css", false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Route(RouteError::ProtocolViolation { .. })
        ));
        assert_eq!(compiler.calls(), 0);
    }

    #[tokio::test]
    async fn test_foreign_ids_are_ignored() {
        let (plugin, _) = plugin(Path::new("/app"), MockCompiler::new());
        assert!(plugin.transform("x", "/app/main.ts", false).await.unwrap().is_none());
        assert!(plugin.load("/app/A.svelte", false).await.unwrap().is_none());
        assert!(
            plugin
                .transform("x", "/app/A.svelte?svelte&type=style&lang.css", false)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_render_targets_are_cached_separately() {
        let (plugin, compiler) = plugin(Path::new("/app"), MockCompiler::new());
        let dom = plugin.transform(SOURCE, "/app/A.svelte", false).await.unwrap().unwrap();
        let ssr = plugin.transform(SOURCE, "/app/A.svelte", true).await.unwrap().unwrap();
        assert_ne!(dom.code, ssr.code);
        assert_eq!(compiler.calls(), 2);
        assert!(plugin.cache().peek(&CacheKey::new("/app/A.svelte", true)).is_some());
    }

    #[tokio::test]
    async fn test_hot_update_and_close() {
        let dir = TempDir::new().unwrap();
        let (plugin, _) = plugin(dir.path(), MockCompiler::new());
        let path = dir.path().join("A.svelte");
        fs::write(&path, SOURCE).unwrap();
        let id = path.to_string_lossy().into_owned();

        plugin.transform(SOURCE, &id, false).await.unwrap();
        fs::write(&path, SOURCE.replace("margin: 0", "margin: 1px")).unwrap();
        let outcome = plugin.handle_hot_update(&path, 1).await.unwrap();
        assert_eq!(
            outcome.affected(),
            [format!("{id}?svelte&type=style&lang.css")]
        );

        plugin.close();
        assert!(plugin.cache().is_empty());
        assert_eq!(
            plugin.handle_hot_update(&path, 2).await.unwrap(),
            HotUpdateOutcome::NotLoaded
        );
    }

    #[test]
    fn test_resolve_and_build_end() {
        let (plugin, _) = plugin(Path::new("/app"), MockCompiler::new());
        let importer = Some(Path::new("/app/src/App.svelte"));

        let resolved = plugin.resolve_id("svelte-ui", importer, false).unwrap();
        assert_eq!(
            resolved.as_deref(),
            Some("/app/node_modules/svelte-ui/src/index.svelte")
        );
        assert!(plugin.build_end().is_none());

        for name in ["lib-a", "lib-b"] {
            assert!(plugin.resolve_id(name, importer, false).unwrap().is_none());
        }
        let report = plugin.build_end().unwrap();
        assert!(report.contains("- lib-a") && report.contains("- lib-b"));
    }

    #[test]
    fn test_from_options_rejects_invalid() {
        let options = PluginOptions {
            extensions: Vec::new(),
            ..PluginOptions::default()
        };
        let result: Result<Plugin> =
            SveltePlugin::from_options(options, Arc::new(MockCompiler::new()), Packages);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
