//! Fetch cache: serve an expensive fetch from the store for a fixed window and
//! count how often each resource really had to be fetched.

mod client;
mod layer;
mod traits;

pub use client::HttpFetcher;
pub use layer::{FetchCache, DEFAULT_TTL};
pub use traits::{FetchPolicy, FetchResult, FetchSource, Fetcher};
