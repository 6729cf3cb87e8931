//! Core traits and types for the fetch cache.

use async_trait::async_trait;

use crate::error::FetchError;

/// External collaborator that produces the content of a resource.
#[async_trait]
pub trait Fetcher: Send + Sync {
  async fn fetch(&self, resource: &str) -> Result<Vec<u8>, FetchError>;
}

/// How concurrent misses for the same resource are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchPolicy {
  /// Every miss fetches; concurrent misses may fetch and count more than once.
  #[default]
  Concurrent,
  /// At most one fetch in flight per resource; waiters re-check the cache.
  SingleFlight,
}

/// Result from a fetch cache lookup, including where the data came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult<T> {
  /// The actual data
  pub content: T,
  /// Where the data came from
  pub source: FetchSource,
}

impl<T> FetchResult<T> {
  /// Create a new result from fresh network data.
  pub fn from_network(content: T) -> Self {
    Self {
      content,
      source: FetchSource::Network,
    }
  }

  /// Create a new result from cached data.
  pub fn from_cache(content: T) -> Self {
    Self {
      content,
      source: FetchSource::Cache,
    }
  }
}

/// Indicates where fetched content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
  /// Fetched by the collaborator on this call
  Network,
  /// Served from an unexpired cache entry
  Cache,
}

impl FetchSource {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Network => "network",
      Self::Cache => "cache",
    }
  }
}
