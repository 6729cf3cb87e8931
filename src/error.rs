//! Error types shared by the store, the instrumented cache and the fetch cache.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures reported by a [`Store`](crate::store::Store) backend.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("lock poisoned: {0}")]
  LockPoisoned(String),

  #[error("operation against a key holding the wrong kind of value: {key}")]
  WrongType { key: String },

  #[error("value at {key} is not an integer")]
  NotAnInteger { key: String },

  #[error("failed to open store at {path}: {message}")]
  Open { path: String, message: String },
}

/// Failures reported by a [`Fetcher`](crate::fetch::Fetcher).
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("server responded with status {0}")]
  Status(u16),

  #[error("invalid url: {0}")]
  InvalidUrl(#[from] url::ParseError),

  #[error("{0}")]
  Other(String),
}

impl FetchError {
  pub fn other(message: impl Into<String>) -> Self {
    Self::Other(message.into())
  }
}

/// Unified error for every component operation.
#[derive(Debug, Error)]
pub enum Error {
  #[error("storage error: {0}")]
  Storage(#[from] StorageError),

  #[error("no value stored under {0}")]
  NotFound(String),

  #[error("failed to decode value stored under {key}: {message}")]
  Decode { key: String, message: String },

  #[error("operation {0} has never been called")]
  UnknownOperation(String),

  #[error("failed to fetch {resource}: {source}")]
  Fetch {
    resource: String,
    #[source]
    source: FetchError,
  },

  #[error("invalid value: {0}")]
  InvalidValue(String),
}

impl Error {
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound(_))
  }
}
