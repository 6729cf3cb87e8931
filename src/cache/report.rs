//! Read-only report of an operation's recorded calls.

use serde::Serialize;
use std::fmt;
use tracing::warn;

use super::history::{CallRecord, HistoryKeys};
use crate::decode;
use crate::error::{Error, Result, StorageError};
use crate::store::Store;

/// Call count and ordered call history of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replay {
  pub operation: String,
  pub count: u64,
  pub calls: Vec<CallRecord>,
}

impl Replay {
  /// `"{op} was called N time(s)"`
  pub fn summary(&self) -> String {
    let plural = if self.count == 1 { "" } else { "s" };
    format!(
      "{} was called {} time{}",
      self.operation, self.count, plural
    )
  }

  /// One `"{op}(*{args}) -> {result}"` line per call, in call order.
  pub fn lines(&self) -> Vec<String> {
    self
      .calls
      .iter()
      .map(|call| call.render(&self.operation))
      .collect()
  }
}

impl fmt::Display for Replay {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.summary())?;
    for line in self.lines() {
      write!(f, "\n{}", line)?;
    }
    Ok(())
  }
}

/// Build the replay of `operation` from `store` without modifying it.
///
/// Fails with [`Error::UnknownOperation`] if the operation was never called.
pub fn replay<S: Store + ?Sized>(store: &S, operation: &str) -> Result<Replay> {
  let keys = HistoryKeys::for_operation(operation);

  let raw_count = store
    .get(&keys.counter)?
    .ok_or_else(|| Error::UnknownOperation(operation.to_string()))?;
  let count = decode::int(&raw_count)
    .ok()
    .and_then(|n| u64::try_from(n).ok())
    .ok_or_else(|| StorageError::NotAnInteger {
      key: keys.counter.clone(),
    })?;

  let inputs = store.range_of_list(&keys.inputs, 0, -1)?;
  let outputs = store.range_of_list(&keys.outputs, 0, -1)?;

  if inputs.len() != outputs.len() {
    warn!(
      operation,
      inputs = inputs.len(),
      outputs = outputs.len(),
      "call history lists differ in length, pairing the common prefix"
    );
  }

  let calls = inputs
    .iter()
    .zip(outputs.iter())
    .map(|(args, output)| CallRecord {
      args: String::from_utf8_lossy(args).into_owned(),
      output: String::from_utf8_lossy(output).into_owned(),
    })
    .collect();

  Ok(Replay {
    operation: operation.to_string(),
    count,
    calls,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{InstrumentedCache, STORE_OPERATION};
  use crate::store::MemoryStore;
  use std::sync::Arc;

  #[test]
  fn test_unknown_operation() {
    let store = MemoryStore::new();
    assert!(matches!(
      replay(&store, "store"),
      Err(Error::UnknownOperation(op)) if op == "store"
    ));
  }

  #[test]
  fn test_singular_summary() {
    let cache = InstrumentedCache::new(Arc::new(MemoryStore::new())).unwrap();
    let key = cache.store("only").unwrap();

    let report = cache.replay(STORE_OPERATION).unwrap();
    assert_eq!(report.summary(), "store was called 1 time");
    assert_eq!(
      report.lines(),
      vec![format!("store(*('only',)) -> {}", key)]
    );
  }

  #[test]
  fn test_line_count_matches_counter() {
    let cache = InstrumentedCache::new(Arc::new(MemoryStore::new())).unwrap();
    for i in 0..3 {
      cache.store(i).unwrap();
    }

    let report = cache.replay(STORE_OPERATION).unwrap();
    assert_eq!(report.count, 3);
    assert_eq!(report.lines().len(), 3);
    assert_eq!(report.summary(), "store was called 3 times");
  }

  #[test]
  fn test_replay_does_not_mutate() {
    let store = Arc::new(MemoryStore::new());
    let cache = InstrumentedCache::new(store.clone()).unwrap();
    cache.store("a").unwrap();

    let first = replay(store.as_ref(), STORE_OPERATION).unwrap();
    let second = replay(store.as_ref(), STORE_OPERATION).unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.call_count(STORE_OPERATION).unwrap(), 1);
  }

  #[test]
  fn test_drifted_history_pairs_common_prefix() {
    let store = MemoryStore::new();
    store.increment("op").unwrap();
    store.increment("op").unwrap();
    store.append_to_list("op:inputs", b"(1,)").unwrap();
    store.append_to_list("op:inputs", b"(2,)").unwrap();
    store.append_to_list("op:outputs", b"one").unwrap();

    let report = replay(&store, "op").unwrap();
    assert_eq!(report.count, 2);
    assert_eq!(report.lines(), vec!["op(*(1,)) -> one"]);
  }

  #[test]
  fn test_end_to_end_scenario() {
    let cache = InstrumentedCache::new(Arc::new(MemoryStore::new())).unwrap();

    let k1 = cache.store("foo").unwrap();
    assert_eq!(cache.get(&k1).unwrap(), b"foo".to_vec());

    let k2 = cache.store(123).unwrap();
    assert_eq!(cache.get_int(&k2).unwrap(), 123);

    let report = cache.replay(STORE_OPERATION).unwrap();
    assert_eq!(
      report.to_string(),
      format!(
        "store was called 2 times\nstore(*('foo',)) -> {}\nstore(*(123,)) -> {}",
        k1, k2
      )
    );
  }

  #[test]
  fn test_serializes_to_json() {
    let cache = InstrumentedCache::new(Arc::new(MemoryStore::new())).unwrap();
    let key = cache.store(1.5).unwrap();

    let json = serde_json::to_value(cache.replay(STORE_OPERATION).unwrap()).unwrap();
    assert_eq!(json["operation"], "store");
    assert_eq!(json["count"], 1);
    assert_eq!(json["calls"][0]["args"], "(1.5,)");
    assert_eq!(json["calls"][0]["output"], key.to_string());
  }
}
