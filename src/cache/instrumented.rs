//! Store/retrieve cache with call counting and history.

use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info};

use super::history::{HistoryKeys, Recorder};
use super::key::CacheKey;
use super::report::{replay, Replay};
use crate::decode;
use crate::error::{Error, Result, StorageError};
use crate::store::Store;
use crate::value::{quote, tuple_literal, StoredValue};

/// Operation name under which `store` calls are counted and recorded.
pub const STORE_OPERATION: &str = "store";

/// Operation name under which `get` calls are counted and recorded.
pub const GET_OPERATION: &str = "get";

/// Cache that records every `store` and `get` call it serves.
///
/// Constructing one flushes the whole backing store, so a store must not be
/// shared between overlapping sessions.
pub struct InstrumentedCache<S: Store + ?Sized> {
  store: Arc<S>,
  recorder: Recorder<S>,
}

impl<S: Store + ?Sized> InstrumentedCache<S> {
  /// Start a new session over `store`, clearing everything it holds.
  pub fn new(store: Arc<S>) -> Result<Self> {
    store.flush_all()?;
    info!(backend = store.name(), "flushed store for new cache session");

    Ok(Self {
      recorder: Recorder::new(Arc::clone(&store)),
      store,
    })
  }

  /// Persist `value` under a fresh key and return the key.
  pub fn store(&self, value: impl Into<StoredValue>) -> Result<CacheKey> {
    let value = value.into();
    let args = tuple_literal([value.literal()]);

    self.recorder.record(
      STORE_OPERATION,
      &args,
      || {
        let key = CacheKey::generate();
        let text = value.to_text()?;
        self.store.set(&key.to_string(), text.as_bytes(), None)?;
        debug!(%key, "stored value");
        Ok(key)
      },
      |key| key.to_string(),
    )
  }

  /// Raw bytes stored under `key`.
  ///
  /// Returns [`Error::NotFound`] when nothing is stored there.
  pub fn get(&self, key: &CacheKey) -> Result<Vec<u8>> {
    self.recorded_get(key, Ok, |raw| {
      String::from_utf8_lossy(raw).into_owned()
    })
  }

  /// Value stored under `key`, decoded with `decode`.
  ///
  /// A decode failure is reported as [`Error::Decode`], distinct from
  /// [`Error::NotFound`].
  pub fn get_with<T, E, F>(&self, key: &CacheKey, decode: F) -> Result<T>
  where
    T: Display,
    E: Display,
    F: FnOnce(&[u8]) -> std::result::Result<T, E>,
  {
    self.recorded_get(
      key,
      |raw| {
        decode(&raw).map_err(|e| Error::Decode {
          key: key.to_string(),
          message: e.to_string(),
        })
      },
      |value| value.to_string(),
    )
  }

  pub fn get_str(&self, key: &CacheKey) -> Result<String> {
    self.get_with(key, decode::utf8)
  }

  pub fn get_int(&self, key: &CacheKey) -> Result<i64> {
    self.get_with(key, decode::int)
  }

  pub fn get_float(&self, key: &CacheKey) -> Result<f64> {
    self.get_with(key, decode::float)
  }

  fn recorded_get<T, D, O>(&self, key: &CacheKey, decode: D, render: O) -> Result<T>
  where
    D: FnOnce(Vec<u8>) -> Result<T>,
    O: FnOnce(&T) -> String,
  {
    let key_text = key.to_string();
    let args = tuple_literal([quote(key_text.chars())]);

    self.recorder.record(
      GET_OPERATION,
      &args,
      || {
        let raw = self
          .store
          .get(&key_text)?
          .ok_or_else(|| Error::NotFound(key_text.clone()))?;
        decode(raw)
      },
      render,
    )
  }

  /// Number of times `operation` has been called, 0 if never.
  pub fn call_count(&self, operation: &str) -> Result<u64> {
    let keys = HistoryKeys::for_operation(operation);
    match self.store.get(&keys.counter)? {
      Some(raw) => decode::int(&raw)
        .ok()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| StorageError::NotAnInteger { key: keys.counter }.into()),
      None => Ok(0),
    }
  }

  /// Replay the recorded history of `operation`.
  pub fn replay(&self, operation: &str) -> Result<Replay> {
    replay(self.store.as_ref(), operation)
  }

  pub fn store_handle(&self) -> &Arc<S> {
    &self.store
  }
}
