//! Cached response records.

use bytes::Bytes;

use super::hash::body_digest;

/// A response stored in a generation, keyed by its request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub body_sha256: String,
    pub stored_at: String,
}

impl CachedResponse {
    /// Build a record stamped with the current time.
    pub fn new(url: impl Into<String>, status: u16, content_type: Option<String>, body: Bytes) -> Self {
        let body_sha256 = body_digest(&body);
        Self {
            url: url.into(),
            status,
            content_type,
            body,
            body_sha256,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
