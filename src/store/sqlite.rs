//! SQLite-backed store.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{resolve_range, Store};
use crate::error::StorageError;

/// Store persisted in a SQLite database.
///
/// Plain values and lists live in separate tables. Expiry is stored as a unix
/// millisecond timestamp and checked on every read.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open (or create) the store at `path`.
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent).map_err(|e| StorageError::Open {
        path: path.display().to_string(),
        message: e.to_string(),
      })?;
    }

    let conn = Connection::open(path).map_err(|e| StorageError::Open {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  /// Get the default database path.
  pub fn default_path() -> Option<PathBuf> {
    let data_dir = dirs::data_dir().or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))?;
    Some(data_dir.join("replaykv").join("store.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self, StorageError> {
    conn.execute_batch(STORE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::LockPoisoned(e.to_string()))
  }

  /// Delete `key` from the value table if it has expired.
  fn purge_expired(tx: &Transaction<'_>, key: &str) -> Result<(), StorageError> {
    tx.execute(
      "DELETE FROM kv WHERE key = ? AND expires_at IS NOT NULL AND expires_at <= ?",
      params![key, now_millis()],
    )?;
    Ok(())
  }

  fn is_list(tx: &Transaction<'_>, key: &str) -> Result<bool, StorageError> {
    let found: Option<i64> = tx
      .query_row(
        "SELECT 1 FROM list_items WHERE key = ? LIMIT 1",
        params![key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(found.is_some())
  }

  fn is_value(tx: &Transaction<'_>, key: &str) -> Result<bool, StorageError> {
    let found: Option<i64> = tx
      .query_row("SELECT 1 FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .optional()?;
    Ok(found.is_some())
  }
}

/// Schema for store tables.
const STORE_SCHEMA: &str = r#"
-- Plain values (counters, stored values, cached fetch results)
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    expires_at INTEGER
);

-- Append-only lists (call history), ordered by position
CREATE TABLE IF NOT EXISTS list_items (
    key TEXT NOT NULL,
    position INTEGER NOT NULL,
    value BLOB NOT NULL,
    PRIMARY KEY (key, position)
);
"#;

fn now_millis() -> i64 {
  Utc::now().timestamp_millis()
}

/// Expiry timestamp for `ttl` from now, `None` when it overflows (never expires).
fn expiry_millis(ttl: Duration) -> Option<i64> {
  i64::try_from(ttl.as_millis())
    .ok()
    .and_then(|ms| now_millis().checked_add(ms))
}

impl Store for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    Self::purge_expired(&tx, key)?;

    let value: Option<Vec<u8>> = tx
      .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .optional()?;

    if value.is_none() && Self::is_list(&tx, key)? {
      return Err(StorageError::WrongType { key: key.into() });
    }

    tx.commit()?;
    Ok(value)
  }

  fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StorageError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    let expires_at = ttl.and_then(expiry_millis);

    // A plain write replaces a list stored under the same key
    tx.execute("DELETE FROM list_items WHERE key = ?", params![key])?;
    tx.execute(
      "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?, ?, ?)",
      params![key, value, expires_at],
    )?;

    tx.commit()?;
    Ok(())
  }

  fn increment(&self, key: &str) -> Result<i64, StorageError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    Self::purge_expired(&tx, key)?;

    if Self::is_list(&tx, key)? {
      return Err(StorageError::WrongType { key: key.into() });
    }

    let current: Option<(Vec<u8>, Option<i64>)> = tx
      .query_row(
        "SELECT value, expires_at FROM kv WHERE key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    let (current, expires_at) = match current {
      Some((data, expires_at)) => {
        let n = std::str::from_utf8(&data)
          .ok()
          .and_then(|s| s.parse::<i64>().ok())
          .ok_or_else(|| StorageError::NotAnInteger { key: key.into() })?;
        (n, expires_at)
      }
      None => (0, None),
    };

    let next = current
      .checked_add(1)
      .ok_or_else(|| StorageError::NotAnInteger { key: key.into() })?;

    tx.execute(
      "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?, ?, ?)",
      params![key, next.to_string().into_bytes(), expires_at],
    )?;

    tx.commit()?;
    Ok(next)
  }

  fn append_to_list(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    Self::purge_expired(&tx, key)?;

    if Self::is_value(&tx, key)? {
      return Err(StorageError::WrongType { key: key.into() });
    }

    tx.execute(
      "INSERT INTO list_items (key, position, value)
       SELECT ?1, COALESCE(MAX(position) + 1, 0), ?2 FROM list_items WHERE key = ?1",
      params![key, value],
    )?;

    tx.commit()?;
    Ok(())
  }

  fn range_of_list(&self, key: &str, start: i64, end: i64) -> Result<Vec<Vec<u8>>, StorageError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    Self::purge_expired(&tx, key)?;

    if Self::is_value(&tx, key)? {
      return Err(StorageError::WrongType { key: key.into() });
    }

    let len: i64 = tx.query_row(
      "SELECT COUNT(*) FROM list_items WHERE key = ?",
      params![key],
      |row| row.get(0),
    )?;

    let Some(range) = resolve_range(len as usize, start, end) else {
      return Ok(Vec::new());
    };

    let items = {
      let mut stmt = tx.prepare(
        "SELECT value FROM list_items WHERE key = ?
         ORDER BY position LIMIT ? OFFSET ?",
      )?;

      let rows = stmt.query_map(
        params![key, range.len() as i64, range.start as i64],
        |row| row.get::<_, Vec<u8>>(0),
      )?;
      rows.collect::<Result<Vec<_>, _>>()?
    };

    tx.commit()?;
    Ok(items)
  }

  fn flush_all(&self) -> Result<(), StorageError> {
    let conn = self.lock()?;
    conn.execute_batch("DELETE FROM kv; DELETE FROM list_items;")?;
    Ok(())
  }

  fn name(&self) -> &'static str {
    "sqlite"
  }
}
