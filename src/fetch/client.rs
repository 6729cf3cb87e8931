use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::traits::Fetcher;
use crate::config::FetchConfig;
use crate::error::FetchError;

/// HTTP GET fetcher backed by `reqwest`.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self, FetchError> {
    Self::from_config(&FetchConfig::default())
  }

  /// Build a client honoring the configured timeout and user agent.
  pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
    let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
    if let Some(secs) = config.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }

    Ok(Self {
      client: builder.build()?,
    })
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  /// GET `resource` and return the body. Non-2xx responses are errors.
  async fn fetch(&self, resource: &str) -> Result<Vec<u8>, FetchError> {
    let url = Url::parse(resource)?;

    let response = self.client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status(status.as_u16()));
    }

    Ok(response.bytes().await?.to_vec())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fetch::FetchCache;
  use crate::store::MemoryStore;
  use std::sync::Arc;

  #[tokio::test]
  async fn test_fetches_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/page")
      .with_status(200)
      .with_body("hello")
      .create_async()
      .await;

    let fetcher = HttpFetcher::new().unwrap();
    let body = fetcher
      .fetch(&format!("{}/page", server.url()))
      .await
      .unwrap();

    assert_eq!(body, b"hello".to_vec());
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_error_status() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/missing")
      .with_status(404)
      .create_async()
      .await;

    let fetcher = HttpFetcher::new().unwrap();
    let err = fetcher
      .fetch(&format!("{}/missing", server.url()))
      .await
      .unwrap_err();

    assert!(matches!(err, FetchError::Status(404)));
  }

  #[tokio::test]
  async fn test_invalid_url() {
    let fetcher = HttpFetcher::new().unwrap();
    let err = fetcher.fetch("not a url").await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl(_)));
  }

  #[tokio::test]
  async fn test_cached_page_is_requested_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/")
      .with_body("<html>hi</html>")
      .expect(1)
      .create_async()
      .await;

    let url = format!("{}/", server.url());
    let cache = FetchCache::new(Arc::new(MemoryStore::new()), HttpFetcher::new().unwrap());

    for _ in 0..3 {
      assert_eq!(cache.get_text(&url).await.unwrap(), "<html>hi</html>");
    }

    assert_eq!(cache.access_count(&url).unwrap(), 1);
    mock.assert_async().await;
  }
}
