//! In-process store backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{resolve_range, Store};
use crate::error::StorageError;

enum Slot {
  Value {
    data: Vec<u8>,
    expires_at: Option<Instant>,
  },
  List(Vec<Vec<u8>>),
}

impl Slot {
  fn is_expired(&self, now: Instant) -> bool {
    match self {
      Slot::Value {
        expires_at: Some(at),
        ..
      } => now >= *at,
      _ => false,
    }
  }
}

/// Store backed by a `HashMap` behind a single mutex.
///
/// Every operation holds the lock for its whole duration.
#[derive(Default)]
pub struct MemoryStore {
  slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Slot>>, StorageError> {
    self
      .slots
      .lock()
      .map_err(|e| StorageError::LockPoisoned(e.to_string()))
  }

  /// Drop `key` if it holds an expired value.
  fn purge_expired(slots: &mut HashMap<String, Slot>, key: &str) {
    let now = Instant::now();
    if slots.get(key).is_some_and(|slot| slot.is_expired(now)) {
      slots.remove(key);
    }
  }
}

impl Store for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
    let mut slots = self.lock()?;
    Self::purge_expired(&mut slots, key);

    match slots.get(key) {
      Some(Slot::Value { data, .. }) => Ok(Some(data.clone())),
      Some(Slot::List(_)) => Err(StorageError::WrongType { key: key.into() }),
      None => Ok(None),
    }
  }

  fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StorageError> {
    let mut slots = self.lock()?;
    slots.insert(
      key.to_string(),
      Slot::Value {
        data: value.to_vec(),
        // A TTL past the clock's range never expires
        expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
      },
    );
    Ok(())
  }

  fn increment(&self, key: &str) -> Result<i64, StorageError> {
    let mut slots = self.lock()?;
    Self::purge_expired(&mut slots, key);

    let slot = slots.entry(key.to_string()).or_insert_with(|| Slot::Value {
      data: b"0".to_vec(),
      expires_at: None,
    });

    let Slot::Value { data, .. } = slot else {
      return Err(StorageError::WrongType { key: key.into() });
    };

    let current: i64 = std::str::from_utf8(data)
      .ok()
      .and_then(|s| s.parse().ok())
      .ok_or_else(|| StorageError::NotAnInteger { key: key.into() })?;
    let next = current
      .checked_add(1)
      .ok_or_else(|| StorageError::NotAnInteger { key: key.into() })?;

    *data = next.to_string().into_bytes();
    Ok(next)
  }

  fn append_to_list(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
    let mut slots = self.lock()?;
    Self::purge_expired(&mut slots, key);

    match slots
      .entry(key.to_string())
      .or_insert_with(|| Slot::List(Vec::new()))
    {
      Slot::List(items) => {
        items.push(value.to_vec());
        Ok(())
      }
      Slot::Value { .. } => Err(StorageError::WrongType { key: key.into() }),
    }
  }

  fn range_of_list(&self, key: &str, start: i64, end: i64) -> Result<Vec<Vec<u8>>, StorageError> {
    let mut slots = self.lock()?;
    Self::purge_expired(&mut slots, key);

    match slots.get(key) {
      Some(Slot::List(items)) => Ok(
        resolve_range(items.len(), start, end)
          .map(|range| items[range].to_vec())
          .unwrap_or_default(),
      ),
      Some(Slot::Value { .. }) => Err(StorageError::WrongType { key: key.into() }),
      None => Ok(Vec::new()),
    }
  }

  fn flush_all(&self) -> Result<(), StorageError> {
    self.lock()?.clear();
    Ok(())
  }

  fn name(&self) -> &'static str {
    "memory"
  }
}

/// Memory store whose `set` always fails; counters and lists keep working.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct ReadOnlyValues {
  inner: MemoryStore,
}

#[cfg(test)]
impl Store for ReadOnlyValues {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
    self.inner.get(key)
  }

  fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> Result<(), StorageError> {
    Err(StorageError::Open {
      path: "memory".into(),
      message: "store is read-only".into(),
    })
  }

  fn increment(&self, key: &str) -> Result<i64, StorageError> {
    self.inner.increment(key)
  }

  fn append_to_list(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
    self.inner.append_to_list(key, value)
  }

  fn range_of_list(&self, key: &str, start: i64, end: i64) -> Result<Vec<Vec<u8>>, StorageError> {
    self.inner.range_of_list(key, start, end)
  }

  fn flush_all(&self) -> Result<(), StorageError> {
    self.inner.flush_all()
  }

  fn name(&self) -> &'static str {
    "read-only memory"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_get_missing_key() {
    let store = MemoryStore::new();
    assert_eq!(store.get("nope").unwrap(), None);
  }

  #[test]
  fn test_set_then_get() {
    let store = MemoryStore::new();
    store.set("k", b"v", None).unwrap();
    assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
  }

  #[test]
  fn test_value_expires() {
    let store = MemoryStore::new();
    store.set("k", b"v", Some(Duration::from_millis(20))).unwrap();
    assert!(store.get("k").unwrap().is_some());

    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(store.get("k").unwrap(), None);
  }

  #[test]
  fn test_huge_ttl_never_expires() {
    let store = MemoryStore::new();
    store.set("k", b"v", Some(Duration::MAX)).unwrap();
    store
      .set("j", b"w", Some(Duration::from_secs(u64::MAX)))
      .unwrap();

    assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(store.get("j").unwrap(), Some(b"w".to_vec()));
  }

  #[test]
  fn test_expired_value_reads_as_empty_list() {
    let store = MemoryStore::new();
    store.set("k", b"v", Some(Duration::from_millis(10))).unwrap();
    assert!(matches!(
      store.range_of_list("k", 0, -1),
      Err(StorageError::WrongType { .. })
    ));

    std::thread::sleep(Duration::from_millis(30));
    assert!(store.range_of_list("k", 0, -1).unwrap().is_empty());
  }

  #[test]
  fn test_increment_creates_and_counts() {
    let store = MemoryStore::new();
    assert_eq!(store.increment("c").unwrap(), 1);
    assert_eq!(store.increment("c").unwrap(), 2);
    assert_eq!(store.get("c").unwrap(), Some(b"2".to_vec()));
  }

  #[test]
  fn test_increment_non_integer_fails() {
    let store = MemoryStore::new();
    store.set("c", b"abc", None).unwrap();
    assert!(matches!(
      store.increment("c"),
      Err(StorageError::NotAnInteger { .. })
    ));
  }

  #[test]
  fn test_list_append_and_range() {
    let store = MemoryStore::new();
    for item in ["a", "b", "c"] {
      store.append_to_list("l", item.as_bytes()).unwrap();
    }

    let all = store.range_of_list("l", 0, -1).unwrap();
    assert_eq!(all, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    assert_eq!(store.range_of_list("l", 1, 1).unwrap(), vec![b"b".to_vec()]);
    assert!(store.range_of_list("missing", 0, -1).unwrap().is_empty());
  }

  #[test]
  fn test_wrong_type() {
    let store = MemoryStore::new();
    store.append_to_list("l", b"a").unwrap();
    assert!(matches!(store.get("l"), Err(StorageError::WrongType { .. })));
    assert!(matches!(
      store.increment("l"),
      Err(StorageError::WrongType { .. })
    ));

    store.set("v", b"1", None).unwrap();
    assert!(matches!(
      store.append_to_list("v", b"x"),
      Err(StorageError::WrongType { .. })
    ));
  }

  #[test]
  fn test_flush_all() {
    let store = MemoryStore::new();
    store.set("k", b"v", None).unwrap();
    store.append_to_list("l", b"a").unwrap();
    store.flush_all().unwrap();

    assert_eq!(store.get("k").unwrap(), None);
    assert!(store.range_of_list("l", 0, -1).unwrap().is_empty());
  }

  #[test]
  fn test_concurrent_increments() {
    let store = std::sync::Arc::new(MemoryStore::new());
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let store = store.clone();
        std::thread::spawn(move || {
          for _ in 0..100 {
            store.increment("c").unwrap();
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }
    assert_eq!(store.get("c").unwrap(), Some(b"800".to_vec()));
  }
}
