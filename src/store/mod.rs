//! Key-value store backends.
//!
//! The instrumented cache and the fetch cache only talk to a [`Store`]. Two
//! backends ship with the crate:
//! - [`MemoryStore`]: process-local, used by tests and short sessions
//! - [`SqliteStore`]: file-backed, so history outlives the process

mod memory;
mod sqlite;

use std::ops::Range;
use std::time::Duration;

use crate::error::StorageError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[cfg(test)]
pub(crate) use memory::ReadOnlyValues;

/// Capability set the caching layers require from a backend.
///
/// Implementations must make `increment` atomic per key and `append_to_list`
/// order-preserving under concurrent appends. Expired values are treated as
/// absent by every operation.
pub trait Store: Send + Sync {
  /// Read a plain value. Returns `None` for missing or expired keys.
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

  /// Write a plain value, replacing whatever the key held before.
  fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StorageError>;

  /// Increment the integer stored at `key`, treating an absent key as 0.
  fn increment(&self, key: &str) -> Result<i64, StorageError>;

  /// Append an element to the list stored at `key`, creating it if needed.
  fn append_to_list(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

  /// Read list elements between `start` and `end`, both inclusive.
  ///
  /// Negative indices count from the end, so `(0, -1)` is the whole list.
  fn range_of_list(&self, key: &str, start: i64, end: i64) -> Result<Vec<Vec<u8>>, StorageError>;

  /// Remove every key.
  fn flush_all(&self) -> Result<(), StorageError>;

  /// Backend name for logging.
  fn name(&self) -> &'static str;
}

/// Resolve an inclusive, possibly negative index pair against a list length.
pub(crate) fn resolve_range(len: usize, start: i64, end: i64) -> Option<Range<usize>> {
  let len = len as i64;
  let start = if start < 0 { (len + start).max(0) } else { start };
  let end = if end < 0 { len + end } else { end.min(len - 1) };

  if len == 0 || start > end || start >= len {
    return None;
  }

  Some(start as usize..end as usize + 1)
}
