use thiserror::Error;

/// Errors surfaced by the search engine.
///
/// `Config` is fatal at startup (the binary exits non-zero); every other
/// variant is per-request and never terminates the process. Zero hits are
/// not an error: operations return an empty result set instead.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Missing or mismatched model-bundle files at load time.
    #[error("config error: {0}")]
    Config(String),

    /// Malformed request input: bad query, unknown category, inverted year range.
    #[error("invalid input: {0}")]
    Input(String),

    /// The per-query deadline expired during fan-out. Partial results are discarded.
    #[error("search timed out after {0} ms")]
    Timeout(u128),

    /// I/O or decode failure while reading a shard.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    pub fn config(msg: impl Into<String>) -> Self {
        SearchError::Config(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        SearchError::Input(msg.into())
    }
}

impl From<std::io::Error> for SearchError {
    fn from(err: std::io::Error) -> Self {
        SearchError::Internal(err.into())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Internal(err.into())
    }
}
