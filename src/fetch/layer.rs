//! TTL cache in front of a [`Fetcher`], with a per-resource access counter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::traits::{FetchPolicy, FetchResult, Fetcher};
use crate::decode;
use crate::error::{Error, Result, StorageError};
use crate::store::Store;

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Cache layer that serves fetched content for a fixed window.
///
/// Content is written under `cached:{resource}` with the layer's TTL. Every
/// miss that completes a real fetch increments `count:{resource}`; cache hits
/// and failed fetches do not.
pub struct FetchCache<S: Store + ?Sized, F: Fetcher> {
  store: Arc<S>,
  fetcher: F,
  /// How long fetched content is served without refetching
  ttl: Duration,
  policy: FetchPolicy,
  in_flight: Mutex<HashMap<String, Gate>>,
}

/// Default window during which fetched content is served from cache.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

impl<S: Store + ?Sized, F: Fetcher> FetchCache<S, F> {
  /// Create a new fetch cache with the default TTL and concurrent policy.
  pub fn new(store: Arc<S>, fetcher: F) -> Self {
    Self {
      store,
      fetcher,
      ttl: DEFAULT_TTL,
      policy: FetchPolicy::default(),
      in_flight: Mutex::new(HashMap::new()),
    }
  }

  /// Set how long fetched content stays valid.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn cache_key(resource: &str) -> String {
    format!("cached:{}", resource)
  }

  pub fn count_key(resource: &str) -> String {
    format!("count:{}", resource)
  }

  /// Content of `resource`, from cache when fresh, otherwise fetched.
  pub async fn get(&self, resource: &str) -> Result<Vec<u8>> {
    self.get_detailed(resource).await.map(|r| r.content)
  }

  /// Content of `resource` as text, replacing invalid UTF-8.
  pub async fn get_text(&self, resource: &str) -> Result<String> {
    self
      .get(resource)
      .await
      .map(|content| String::from_utf8_lossy(&content).into_owned())
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Check cache - if present and unexpired, return immediately
  /// 2. On miss, fetch; a failed fetch leaves the cache untouched
  /// 3. Write content with the TTL and count the access
  pub async fn get_detailed(&self, resource: &str) -> Result<FetchResult<Vec<u8>>> {
    if let Some(content) = self.cached(resource)? {
      debug!(resource, "fetch cache hit");
      return Ok(FetchResult::from_cache(content));
    }

    match self.policy {
      FetchPolicy::Concurrent => self
        .fetch_and_cache(resource)
        .await
        .map(FetchResult::from_network),
      FetchPolicy::SingleFlight => {
        let gate = GateHandle::acquire(&self.in_flight, resource);
        let result = self.fetch_once(resource, gate.lock()).await;
        result
      }
    }
  }

  /// Number of real fetches performed for `resource`.
  pub fn access_count(&self, resource: &str) -> Result<u64> {
    let key = Self::count_key(resource);
    match self.store.get(&key)? {
      Some(raw) => decode::int(&raw)
        .ok()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| StorageError::NotAnInteger { key }.into()),
      None => Ok(0),
    }
  }

  fn cached(&self, resource: &str) -> Result<Option<Vec<u8>>> {
    Ok(self.store.get(&Self::cache_key(resource))?)
  }

  async fn fetch_and_cache(&self, resource: &str) -> Result<Vec<u8>> {
    debug!(resource, "fetch cache miss, fetching");

    let content = self
      .fetcher
      .fetch(resource)
      .await
      .map_err(|source| Error::Fetch {
        resource: resource.to_string(),
        source,
      })?;

    self
      .store
      .set(&Self::cache_key(resource), &content, Some(self.ttl))?;
    let count = self.store.increment(&Self::count_key(resource))?;
    debug!(resource, count, bytes = content.len(), "cached fetched content");

    Ok(content)
  }

  /// Fetch under the resource's gate so only one caller fetches at a time.
  async fn fetch_once(
    &self,
    resource: &str,
    gate: &tokio::sync::Mutex<()>,
  ) -> Result<FetchResult<Vec<u8>>> {
    let _guard = gate.lock().await;

    // Another caller may have filled the cache while we waited
    if let Some(content) = self.cached(resource)? {
      debug!(resource, "fetch cache filled while waiting");
      return Ok(FetchResult::from_cache(content));
    }

    self
      .fetch_and_cache(resource)
      .await
      .map(FetchResult::from_network)
  }

}

/// A caller's share of a resource's gate.
///
/// Dropping it, also when the caller's future is cancelled, removes the gate
/// from the map once no other caller holds it.
struct GateHandle<'a> {
  gates: &'a Mutex<HashMap<String, Gate>>,
  resource: &'a str,
  gate: Gate,
}

impl<'a> GateHandle<'a> {
  fn acquire(gates: &'a Mutex<HashMap<String, Gate>>, resource: &'a str) -> Self {
    let gate = Arc::clone(
      gates
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .entry(resource.to_string())
        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
    );

    Self {
      gates,
      resource,
      gate,
    }
  }

  fn lock(&self) -> &tokio::sync::Mutex<()> {
    &self.gate
  }
}

impl Drop for GateHandle<'_> {
  fn drop(&mut self) {
    let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());

    // Handles are cloned and dropped under the map lock, so 2 means only the
    // map and this handle are left
    if Arc::strong_count(&self.gate) == 2 {
      gates.remove(self.resource);
    }
  }
}
