//! Crate-level error returned by the plugin hooks.

use thiserror::Error;

use crate::config::ConfigError;
use crate::reload::HotUpdateError;
use crate::resolve::ResolveError;
use crate::router::RouteError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    HotUpdate(#[from] HotUpdateError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

pub type Result<T> = std::result::Result<T, Error>;
