//! Identifier parsing and serialization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use super::query::RequestQuery;
use super::request::Request;
use crate::config::ResolvedOptions;
use crate::debug;

/// Prefix the bundler uses for files served from outside the project root.
const FS_PREFIX: &str = "/@fs/";

/// Filename bytes that cannot appear literally in an identifier.
const FILENAME_ESCAPES: &AsciiSet = &CONTROLS.add(b'?').add(b'%');

/// Split an identifier into `(filename, raw query)` at the first `?`.
pub fn split_id(id: &str) -> (&str, Option<&str>) {
    match id.split_once('?') {
        Some((filename, query)) => (filename, Some(query)),
        None => (id, None),
    }
}

/// Parses identifiers into [`Request`]s for the files this plugin owns.
#[derive(Debug, Clone)]
pub struct IdParser {
    options: Arc<ResolvedOptions>,
}

impl IdParser {
    pub fn new(options: Arc<ResolvedOptions>) -> Self {
        Self { options }
    }

    /// Parse an identifier.
    ///
    /// Returns `None` when the identifier is not ours: unowned extension
    /// without the marker flag, asset-style queries (`raw`, `url`), or a
    /// malformed query (it may belong to another plugin).
    pub fn parse(&self, id: &str, ssr: bool, timestamp: Option<u64>) -> Option<Request> {
        let (raw_filename, raw_query) = split_id(id);
        if raw_filename.is_empty() || raw_filename.starts_with('\0') {
            return None;
        }

        let query = match raw_query.map(RequestQuery::parse).transpose() {
            Ok(query) => query.unwrap_or_default(),
            Err(err) => {
                debug!("id"; "not ours: `{id}` ({err})");
                return None;
            }
        };
        if query.is_asset() {
            return None;
        }

        let filename = self.to_filename(raw_filename);
        let filename_str = filename.to_string_lossy();
        if !query.is_svelte() && !self.options.owns(&filename_str) {
            return None;
        }

        let normalized_filename = self.normalize(&filename);
        Some(Request {
            filename,
            normalized_filename,
            query,
            ssr,
            timestamp,
        })
    }

    /// Serialize a request back into an identifier.
    ///
    /// `parse(serialize(r))` yields `r` for every `r` produced by `parse`.
    pub fn serialize(&self, request: &Request) -> String {
        let filename = self.filename_id(&request.filename);
        if request.query.is_empty() {
            filename
        } else {
            format!("{filename}?{}", request.query)
        }
    }

    /// Identifier of the stylesheet module derived from `request`.
    pub fn style_id(&self, request: &Request) -> String {
        self.serialize(&request.style_request())
    }

    /// Main request for a file already known to be ours.
    pub fn request_for(&self, filename: &Path, ssr: bool) -> Request {
        Request {
            filename: filename.to_path_buf(),
            normalized_filename: self.normalize(filename),
            query: RequestQuery::default(),
            ssr,
            timestamp: None,
        }
    }

    /// Identifier the bundler uses for the main module of `filename`.
    pub fn main_id(&self, filename: &Path) -> String {
        self.filename_id(filename)
    }

    /// Filename part of an identifier. Paths holding `?` or `%` go through
    /// the escaped `/@fs/` form so they parse back to the same path.
    fn filename_id(&self, filename: &Path) -> String {
        let filename = filename.to_string_lossy();
        match filename.strip_prefix('/') {
            Some(rest) if rest.contains(['?', '%']) => {
                format!("{FS_PREFIX}{}", utf8_percent_encode(rest, FILENAME_ESCAPES))
            }
            _ => filename.into_owned(),
        }
    }

    /// Map the filename part of an identifier to an absolute path.
    fn to_filename(&self, raw: &str) -> PathBuf {
        if let Some(rest) = raw.strip_prefix(FS_PREFIX) {
            // `/@fs/` ids are URL-space: keep the leading `/` of the real path.
            let decoded = percent_decode_str(rest).decode_utf8_lossy();
            return PathBuf::from(format!("/{decoded}"));
        }
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.options.root.join(path)
        }
    }

    fn normalize(&self, filename: &Path) -> String {
        match filename.strip_prefix(&self.options.root) {
            Ok(relative) => format!("/{}", relative.to_string_lossy()),
            Err(_) => filename.to_string_lossy().into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{QueryFlag, VirtualKind};

    fn parser() -> IdParser {
        IdParser::new(Arc::new(ResolvedOptions::with_root("/app")))
    }

    #[test]
    fn test_split_id() {
        assert_eq!(split_id("/a.svelte"), ("/a.svelte", None));
        assert_eq!(split_id("/a.svelte?x&y"), ("/a.svelte", Some("x&y")));
        assert_eq!(split_id("/a.svelte?x?y"), ("/a.svelte", Some("x?y")));
    }

    #[test]
    fn test_parse_main_request() {
        let request = parser().parse("/app/src/App.svelte", false, None).unwrap();
        assert!(request.is_main());
        assert!(!request.is_style());
        assert_eq!(request.filename, PathBuf::from("/app/src/App.svelte"));
        assert_eq!(request.normalized_filename, "/src/App.svelte");
    }

    #[test]
    fn test_parse_ignores_bundler_flags() {
        let request = parser()
            .parse("/app/src/App.svelte?t=1700000000&v=abc", false, Some(7))
            .unwrap();
        assert!(request.is_main());
        assert!(request.query.is_empty());
        assert_eq!(request.timestamp, Some(7));
    }

    #[test]
    fn test_parse_style_request() {
        let request = parser()
            .parse("/app/src/App.svelte?svelte&type=style&lang.css", true, None)
            .unwrap();
        assert!(request.is_style());
        assert!(request.ssr);
        assert_eq!(request.query.kind(), Some(VirtualKind::Style));
    }

    #[test]
    fn test_parse_not_ours() {
        let parser = parser();
        assert!(parser.parse("/app/src/main.ts", false, None).is_none());
        assert!(parser.parse("/app/src/App.svelte?raw", false, None).is_none());
        assert!(parser.parse("/app/src/App.svelte?url", false, None).is_none());
        assert!(parser.parse("\0virtual:thing", false, None).is_none());
        assert!(
            parser
                .parse("/app/src/App.svelte?svelte&type=bogus", false, None)
                .is_none()
        );
    }

    #[test]
    fn test_marker_flag_claims_any_extension() {
        let request = parser().parse("/app/src/x.js?svelte", false, None).unwrap();
        assert!(request.query.has(QueryFlag::Svelte));
        assert!(!request.is_style());
    }

    #[test]
    fn test_parse_fs_prefix() {
        let request = parser()
            .parse("/@fs/home/me/lib/Button%20Big.svelte", false, None)
            .unwrap();
        assert_eq!(request.filename, PathBuf::from("/home/me/lib/Button Big.svelte"));
        assert_eq!(request.normalized_filename, "/home/me/lib/Button Big.svelte");
    }

    #[test]
    fn test_parse_relative_joins_root() {
        let request = parser().parse("src/App.svelte", false, None).unwrap();
        assert_eq!(request.filename, PathBuf::from("/app/src/App.svelte"));
    }

    #[test]
    fn test_exclude_is_respected() {
        let mut options = ResolvedOptions::with_root("/app");
        options.exclude = vec![regex::Regex::new("/node_modules/").unwrap()];
        let parser = IdParser::new(Arc::new(options));
        assert!(
            parser
                .parse("/app/node_modules/lib/A.svelte", false, None)
                .is_none()
        );
    }

    #[test]
    fn test_round_trip() {
        let parser = parser();
        let ids = [
            "/app/src/App.svelte",
            "/app/src/App.svelte?t=123",
            "/app/src/App.svelte?svelte&type=style&lang.css",
            "/app/src/App.svelte?lang.css&svelte&type=style",
            "/app/src/App.svelte?svelte&type=style&direct&v=9",
            "/@fs/opt/lib/Card.svelte?svelte&type=style",
            "/@fs/opt/a%3Fb.svelte",
            "/@fs/opt/a%3Fb.svelte?svelte&type=style&lang.css",
            "/@fs/opt/100%25.svelte",
        ];
        for id in ids {
            for ssr in [false, true] {
                let request = parser.parse(id, ssr, Some(42)).unwrap();
                let again = parser
                    .parse(&parser.serialize(&request), ssr, Some(42))
                    .unwrap();
                assert_eq!(again, request, "round trip of {id}");
            }
        }
    }

    #[test]
    fn test_serialize_escapes_query_marker_in_filename() {
        let parser = parser();
        let request = parser.parse("/@fs/opt/a%3Fb.svelte", false, None).unwrap();
        assert_eq!(request.filename, PathBuf::from("/opt/a?b.svelte"));
        assert_eq!(parser.serialize(&request), "/@fs/opt/a%3Fb.svelte");
        assert_eq!(
            parser.style_id(&request),
            "/@fs/opt/a%3Fb.svelte?svelte&type=style&lang.css"
        );
    }

    #[test]
    fn test_style_id() {
        let parser = parser();
        let main = parser.parse("/app/src/App.svelte?t=1", false, None).unwrap();
        assert_eq!(
            parser.style_id(&main),
            "/app/src/App.svelte?svelte&type=style&lang.css"
        );
        assert_eq!(parser.main_id(&main.filename), "/app/src/App.svelte");
    }
}
