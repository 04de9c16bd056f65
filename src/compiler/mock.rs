//! Deterministic stand-in compiler for tests.
//!
//! Understands a tiny component format:
//! - `<script>…</script>` becomes the module body
//! - `<style>…</style>` becomes the CSS; `@import "x";` lines are dependencies
//! - `<!-- … -->` comments are elided
//! - remaining markup becomes the template string
//! - `WARN <msg>` lines in the script produce warnings
//! - `SYNTAX_ERROR` anywhere is a fatal error at its position

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{CompileInput, Compiler, CompilerFailure, CssMode, RawOutput, Warning};
use crate::cache::Code;

#[derive(Debug, Default)]
pub(crate) struct MockCompiler {
    calls: AtomicUsize,
    yields: AtomicUsize,
}

impl MockCompiler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler `n` times per compile, so concurrent callers
    /// observe the compile as in flight.
    pub(crate) fn with_yields(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            yields: AtomicUsize::new(n),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Compiler for MockCompiler {
    async fn compile(&self, input: CompileInput) -> Result<RawOutput, CompilerFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for _ in 0..self.yields.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        compile_source(&input)
    }
}

fn compile_source(input: &CompileInput) -> Result<RawOutput, CompilerFailure> {
    if let Some(offset) = input.code.find("SYNTAX_ERROR") {
        let before = &input.code[..offset];
        let line = before.matches('\n').count() as u32 + 1;
        let column = before.rsplit('\n').next().map_or(0, str::len) as u32;
        return Err(CompilerFailure::new("unexpected token").at(line, column));
    }

    let source = strip_comments(&input.code);
    let (script, rest) = take_block(&source, "script");
    let (style, markup) = take_block(&rest, "style");

    let warnings = script
        .lines()
        .filter_map(|line| line.trim().strip_prefix("WARN "))
        .map(Warning::new)
        .collect();

    let dependencies = style
        .lines()
        .filter_map(|line| line.trim().strip_prefix("@import \""))
        .filter_map(|rest| rest.split('"').next())
        .map(PathBuf::from)
        .collect();

    let mut js = format!(
        "// {}\nconst template = {:?};\n{}\nexport default template;\n",
        if input.ssr { "ssr" } else { "dom" },
        markup.trim(),
        script.trim()
    );
    let css = match input.css {
        CssMode::External => Some(Code::new(style.trim())),
        CssMode::Injected => {
            if !style.trim().is_empty() {
                js.push_str(&format!("inject_css({:?});\n", style.trim()));
            }
            None
        }
    };

    Ok(RawOutput {
        js: Code::new(js),
        css,
        warnings,
        dependencies,
    })
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        rest = match rest[start..].find("-->") {
            Some(end) => &rest[start + end + 3..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

/// Extract the body of `<tag>…</tag>`, returning `(body, source without block)`.
fn take_block(source: &str, tag: &str) -> (String, String) {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let Some(start) = source.find(&open) else {
        return (String::new(), source.to_string());
    };
    let body_start = start + open.len();
    let Some(len) = source[body_start..].find(&close) else {
        return (String::new(), source.to_string());
    };
    let body = source[body_start..body_start + len].to_string();
    let rest = format!("{}{}", &source[..start], &source[body_start + len + close.len()..]);
    (body, rest)
}
