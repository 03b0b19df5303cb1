use std::path::PathBuf;

use thiserror::Error;

/// Failures the query service and loaders report to callers.
///
/// Loaders return this inside `anyhow::Error`, so a caller can
/// `downcast_ref::<Error>()` to tell an upstream failure from a local one.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream fetch failed with status {status}: {body}")]
    UpstreamFetch { status: u16, body: String },

    #[error("Database unavailable at {path:?}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
