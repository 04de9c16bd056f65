//! Query flags recognized on module identifiers.
//!
//! Bundler-added flags (`t=…`, `v=…`, `import`) are not part of identity and
//! are dropped on parse.

use std::fmt;

use thiserror::Error;
use url::form_urlencoded;

/// Malformed query on an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown virtual module type `{0}`")]
    UnknownType(String),

    #[error("flag `{0}` does not take a value")]
    UnexpectedValue(&'static str),

    #[error("flag `{0}` given more than once")]
    Duplicate(&'static str),
}

/// Logical sub-artifact named by the `type` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualKind {
    Style,
}

impl VirtualKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Style => "style",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "style" => Some(Self::Style),
            _ => None,
        }
    }
}

/// A single recognized query flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryFlag {
    /// `svelte`: identifier was generated by this plugin.
    Svelte,
    /// `type=<kind>`
    Type(VirtualKind),
    /// `lang.css`: lets CSS tooling pick up the virtual module.
    LangCss,
    /// `raw`: served verbatim by another plugin.
    Raw,
    /// `url`: served as an asset URL by another plugin.
    Url,
    /// `direct`: CSS requested directly (not through a JS import).
    Direct,
    /// `sourcemap`
    Sourcemap,
}

impl QueryFlag {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Svelte => "svelte",
            Self::Type(_) => "type",
            Self::LangCss => "lang.css",
            Self::Raw => "raw",
            Self::Url => "url",
            Self::Direct => "direct",
            Self::Sourcemap => "sourcemap",
        }
    }

    const fn value(self) -> Option<&'static str> {
        match self {
            Self::Type(kind) => Some(kind.as_str()),
            _ => None,
        }
    }

    /// Decode one `key=value` pair. `Ok(None)` for flags we don't track.
    fn decode(key: &str, value: &str) -> Result<Option<Self>, ParseError> {
        let flag = match key {
            "type" => {
                return VirtualKind::parse(value)
                    .map(|kind| Some(Self::Type(kind)))
                    .ok_or_else(|| ParseError::UnknownType(value.to_string()));
            }
            "svelte" => Self::Svelte,
            "lang.css" => Self::LangCss,
            "raw" => Self::Raw,
            "url" => Self::Url,
            "direct" => Self::Direct,
            "sourcemap" => Self::Sourcemap,
            _ => return Ok(None),
        };
        // Present-without-value means `true`.
        match value {
            "" | "true" => Ok(Some(flag)),
            _ => Err(ParseError::UnexpectedValue(flag.key())),
        }
    }
}

impl fmt::Display for QueryFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{}={}", self.key(), value),
            None => f.write_str(self.key()),
        }
    }
}

/// Ordered set of recognized flags decoded from an identifier's query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RequestQuery {
    flags: Vec<QueryFlag>,
}

impl RequestQuery {
    /// Decode a raw query string (without the leading `?`).
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let mut query = Self::default();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            if let Some(flag) = QueryFlag::decode(&key, &value)? {
                query.push(flag)?;
            }
        }
        Ok(query)
    }

    /// Query of the derived stylesheet module: `svelte&type=style&lang.css`.
    pub fn style() -> Self {
        Self {
            flags: vec![
                QueryFlag::Svelte,
                QueryFlag::Type(VirtualKind::Style),
                QueryFlag::LangCss,
            ],
        }
    }

    fn push(&mut self, flag: QueryFlag) -> Result<(), ParseError> {
        if self.flags.iter().any(|f| f.key() == flag.key()) {
            return Err(ParseError::Duplicate(flag.key()));
        }
        self.flags.push(flag);
        Ok(())
    }

    pub fn flags(&self) -> &[QueryFlag] {
        &self.flags
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn has(&self, flag: QueryFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Marker flag present: the identifier was generated by this plugin.
    pub fn is_svelte(&self) -> bool {
        self.has(QueryFlag::Svelte)
    }

    pub fn kind(&self) -> Option<VirtualKind> {
        self.flags.iter().find_map(|flag| match flag {
            QueryFlag::Type(kind) => Some(*kind),
            _ => None,
        })
    }

    /// Asset-style requests handled by other plugins.
    pub fn is_asset(&self) -> bool {
        self.has(QueryFlag::Raw) || self.has(QueryFlag::Url)
    }
}

impl fmt::Display for RequestQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.flags.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_style_query() {
        let query = RequestQuery::parse("svelte&type=style&lang.css").unwrap();
        assert!(query.is_svelte());
        assert_eq!(query.kind(), Some(VirtualKind::Style));
        assert!(query.has(QueryFlag::LangCss));
        assert_eq!(query, RequestQuery::style());
    }

    #[test]
    fn test_boolean_flag_values() {
        assert!(RequestQuery::parse("svelte=").unwrap().is_svelte());
        assert!(RequestQuery::parse("svelte=true").unwrap().is_svelte());
        assert_eq!(
            RequestQuery::parse("svelte=nope"),
            Err(ParseError::UnexpectedValue("svelte"))
        );
    }

    #[test]
    fn test_unknown_flags_are_dropped() {
        let query = RequestQuery::parse("t=1699999&v=abc123&import").unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert_eq!(
            RequestQuery::parse("svelte&type=script"),
            Err(ParseError::UnknownType("script".into()))
        );
    }

    #[test]
    fn test_duplicate_flag_is_an_error() {
        assert_eq!(
            RequestQuery::parse("svelte&svelte"),
            Err(ParseError::Duplicate("svelte"))
        );
    }

    #[test]
    fn test_asset_flags() {
        assert!(RequestQuery::parse("raw").unwrap().is_asset());
        assert!(RequestQuery::parse("url").unwrap().is_asset());
        assert!(!RequestQuery::parse("direct").unwrap().is_asset());
    }

    #[test]
    fn test_display_preserves_order() {
        let query = RequestQuery::parse("lang.css&type=style&svelte").unwrap();
        assert_eq!(query.to_string(), "lang.css&type=style&svelte");
        assert_eq!(RequestQuery::style().to_string(), "svelte&type=style&lang.css");
    }
}
