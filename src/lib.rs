//! Instrumented key-value caching.
//!
//! - [`cache::InstrumentedCache`] counts and records every `store`/`get` call
//! - [`cache::replay`] renders an operation's recorded history
//! - [`fetch::FetchCache`] serves an expensive fetch from the store for a TTL
//!   window and counts real fetches per resource
//!
//! Both sit on a [`store::Store`] handle passed in at construction.

pub mod cache;
pub mod config;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod store;
pub mod value;

pub use cache::{replay, CacheKey, InstrumentedCache, Replay};
pub use error::{Error, FetchError, Result, StorageError};
pub use fetch::{FetchCache, FetchPolicy, Fetcher, HttpFetcher};
pub use store::{MemoryStore, SqliteStore, Store};
pub use value::StoredValue;
