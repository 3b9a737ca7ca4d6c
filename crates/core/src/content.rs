//! Page-side "read offline" caching.
//!
//! Post views use this to show an "Available offline" indicator and to back
//! the checkbox that adds or removes one post from the content generation.
//! It talks to the same storage the worker serves from, so a cached post is
//! answered by the worker's passthrough lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use url::Url;

use crate::Error;
use crate::cache::{CacheStorage, GenerationName};
use crate::network::Network;
use crate::worker::WorkerConfig;

/// User-controlled cache of individual content items.
pub struct ContentCache<S, N> {
    storage: Arc<S>,
    network: Arc<N>,
    generation: GenerationName,
    origin: Url,
    prefix: String,
}

impl<S: CacheStorage, N: Network> ContentCache<S, N> {
    pub fn new(config: &WorkerConfig, storage: Arc<S>, network: Arc<N>) -> Self {
        Self {
            storage,
            network,
            generation: config.generations.content_name().clone(),
            origin: config.origin.clone(),
            prefix: config.content_prefix.clone(),
        }
    }

    pub fn generation(&self) -> &GenerationName {
        &self.generation
    }

    /// Resource URL for a content id such as `posts/42`.
    ///
    /// Every segment of the id must survive URL resolution as its own
    /// non-empty segment under `/<prefix>/`, so dot segments in any encoding
    /// are rejected.
    pub fn content_url(&self, content_id: &str) -> Result<Url, Error> {
        let invalid = || Error::InvalidInput(format!("invalid content id: {content_id:?}"));
        let id = content_id.trim();
        if id.is_empty() || id.starts_with('/') || id.contains(['\\', '?', '#']) {
            return Err(invalid());
        }

        let base = format!("/{}/", self.prefix);
        let url = self
            .origin
            .join(&format!("{base}{id}"))
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let segments = url.path().strip_prefix(&base).map(|rest| rest.split('/').collect::<Vec<_>>());
        match segments {
            Some(segments) if segments.len() == id.split('/').count() && segments.iter().all(|s| !s.is_empty()) => {
                Ok(url)
            }
            _ => Err(invalid()),
        }
    }

    pub async fn is_content_cached(&self, content_id: &str) -> Result<bool, Error> {
        let url = self.content_url(content_id)?;
        Ok(self.storage.match_url(&self.generation, url.as_str()).await?.is_some())
    }

    /// Fetch the item and store it. A non-2xx response is an error and
    /// nothing is stored.
    pub async fn add(&self, content_id: &str) -> Result<(), Error> {
        let url = self.content_url(content_id)?;
        let response = self.network.fetch(&url).await?;
        if !response.is_ok() {
            return Err(Error::HttpError(format!("status {} for {url}", response.status)));
        }
        self.storage.put(&self.generation, response.into_cached()).await?;
        tracing::debug!(content_id, "Content cached for offline reading");
        Ok(())
    }

    /// Drop the item. Returns whether it was cached.
    pub async fn remove(&self, content_id: &str) -> Result<bool, Error> {
        let url = self.content_url(content_id)?;
        self.storage.delete_entry(&self.generation, url.as_str()).await
    }

    /// Apply a checkbox change and return the state the checkbox should show.
    ///
    /// A failed add reverts to unchecked. Unchecking always ends unchecked.
    pub async fn set_offline(&self, content_id: &str, checked: bool) -> bool {
        if checked {
            match self.add(content_id).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(content_id, error = %e, "Read offline failed; unchecking");
                    false
                }
            }
        } else {
            if let Err(e) = self.remove(content_id).await {
                tracing::warn!(content_id, error = %e, "Failed to remove offline content");
            }
            false
        }
    }

    /// Offline flag for each id, for the home list. Lookup errors read as
    /// not cached.
    pub async fn offline_status(&self, content_ids: &[String]) -> BTreeMap<String, bool> {
        let flags = join_all(content_ids.iter().map(|id| async move {
            let cached = self.is_content_cached(id).await.unwrap_or_else(|e| {
                tracing::debug!(content_id = %id, error = %e, "Offline status lookup failed");
                false
            });
            (id.clone(), cached)
        }))
        .await;
        flags.into_iter().collect()
    }
}
