//! Module identifiers: `filename[?query]` to [`Request`] and back.
//!
//! - `query` - closed set of recognized query flags
//! - `request` - the structured request
//! - `parser` - `IdParser` (parse / serialize)
//!
//! Parsing is purely lexical: no filesystem access, no cache access.

mod parser;
mod query;
mod request;

pub use parser::{IdParser, split_id};
pub use query::{ParseError, QueryFlag, RequestQuery, VirtualKind};
pub use request::Request;
