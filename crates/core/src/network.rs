//! The network seam.
//!
//! The worker never talks HTTP directly; it asks a `Network` implementation
//! for a response. `shellcache-client` provides the reqwest-backed one.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;
use crate::cache::CachedResponse;

/// Response from a fetch operation.
///
/// Non-2xx statuses are still responses; callers decide with [`is_ok`].
///
/// [`is_ok`]: FetchResponse::is_ok
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Convert into a storable record keyed by the requested URL.
    pub fn into_cached(self) -> CachedResponse {
        CachedResponse::new(self.url.as_str(), self.status, self.content_type, self.bytes)
    }
}

/// Given a URL, produce a response or a rejected outcome.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, Error>;
}
