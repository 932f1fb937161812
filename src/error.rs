use thiserror::Error;

use crate::core::domain::DomainError;
use crate::core::exchange::ExchangeError;
use crate::core::store::StoreError;

/// Top-level error taxonomy, classified by retryability: `Config`/
/// `Domain` are precondition/validation failures the caller should not
/// retry; `Exchange`/`Store` carry their own transient-vs-permanent
/// distinction; `Io`/`Json`/`Toml` are ambient plumbing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("execution error: {0}")]
    Execution(String),
}

impl Error {
    /// Whether a caller should back off and retry, per the §7
    /// taxonomy. Validation/precondition/catastrophic errors are not
    /// retryable; transient I/O is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Exchange(ExchangeError::Transport(_) | ExchangeError::Timeout) => true,
            Error::Store(StoreError::Backend(_)) => true,
            Error::Http(_) | Error::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
