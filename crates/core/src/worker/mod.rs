//! The offline cache manager.
//!
//! ### Install
//! - Fetch every shell asset and the shell document concurrently.
//! - Commit them to the current static generation only if every response is
//!   2xx. Any failure skips the update and leaves storage untouched.
//!
//! ### Activate
//! - Delete every generation other than the current static generation and
//!   the content generation. Deletions run concurrently and are best-effort:
//!   failures are logged and reported, and the next activation tries again.
//! - If the current static generation was never cached (its install was
//!   skipped), the newest older static generation is kept so the shell stays
//!   available offline.
//!
//! ### Fetch
//! - Same-origin `/` and `/posts/<id>` are answered with the cached shell.
//! - Everything else is answered by exact URL match.
//! - A miss, or a storage error during lookup, falls back to the network.

pub mod host;
pub mod route;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

pub use host::{LifecycleHandler, WorkerHost, WorkerState};
pub use route::{RequestKind, classify};

use crate::Error;
use crate::cache::{CacheStorage, CachedResponse, ExpectedGenerations, GenerationName};
use crate::network::Network;

/// The shell document and the bundles it needs, as absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellAssetSet {
    pub shell: Url,
    pub assets: Vec<Url>,
}

impl ShellAssetSet {
    /// All URLs to precache: the bundles, then the shell document.
    pub fn urls(&self) -> Vec<Url> {
        self.assets
            .iter()
            .chain(std::iter::once(&self.shell))
            .cloned()
            .collect()
    }
}

/// Per-worker configuration, fixed for the lifetime of one worker version.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// The page's own origin.
    pub origin: Url,
    pub generations: ExpectedGenerations,
    pub shell: ShellAssetSet,
    /// Path segment content resources live under.
    pub content_prefix: String,
}

/// Why an install left storage untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// An asset answered with a non-2xx status.
    NotOk { url: String, status: u16 },
    /// An asset could not be fetched at all.
    Network { url: String, message: String },
    /// The batch write failed and was rolled back.
    Storage { message: String },
}

/// Result of the install phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallOutcome {
    Cached { generation: GenerationName, entries: usize },
    Skipped { generation: GenerationName, reason: SkipReason },
}

impl InstallOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, InstallOutcome::Cached { .. })
    }
}

/// A stale generation that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FailedDeletion {
    pub generation: GenerationName,
    pub error: String,
}

/// Result of the activation phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivationReport {
    pub deleted: Vec<GenerationName>,
    pub failed: Vec<FailedDeletion>,
    /// Previous static generation kept because the current one is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retained: Option<GenerationName>,
}

/// Where a fetch was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    Cache,
    Network,
}

/// Response handed back for an intercepted request.
#[derive(Debug, Clone)]
pub struct Served {
    pub source: ServedFrom,
    pub response: CachedResponse,
}

/// Caches the app shell at install, purges stale generations at activation,
/// and answers fetches cache-first.
pub struct OfflineCacheManager<S, N> {
    config: WorkerConfig,
    storage: Arc<S>,
    network: Arc<N>,
}

impl<S: CacheStorage, N: Network> OfflineCacheManager<S, N> {
    pub fn new(config: WorkerConfig, storage: Arc<S>, network: Arc<N>) -> Self {
        Self { config, storage, network }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    /// Precache the shell into the current static generation, all or nothing.
    pub async fn install(&self) -> InstallOutcome {
        let generation = self.config.generations.static_name().clone();
        let urls = self.config.shell.urls();

        let results = join_all(urls.iter().map(|url| self.network.fetch(url))).await;

        let mut responses = BTreeMap::new();
        for (url, result) in urls.iter().zip(results) {
            let reason = match result {
                Ok(response) if response.is_ok() => {
                    responses.insert(url.to_string(), response.into_cached());
                    continue;
                }
                Ok(response) => SkipReason::NotOk { url: url.to_string(), status: response.status },
                Err(e) => SkipReason::Network { url: url.to_string(), message: e.to_string() },
            };
            tracing::warn!(%generation, ?reason, "Shell precache skipped");
            return InstallOutcome::Skipped { generation, reason };
        }

        let entries = responses.len();
        if let Err(e) = self.storage.put_all(&generation, responses.into_values().collect()).await {
            tracing::warn!(%generation, error = %e, "Shell precache write failed");
            return InstallOutcome::Skipped { generation, reason: SkipReason::Storage { message: e.to_string() } };
        }

        tracing::info!(%generation, entries, "Shell precached");
        InstallOutcome::Cached { generation, entries }
    }

    /// Delete every generation this version does not expect.
    pub async fn activate(&self) -> ActivationReport {
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list generations; nothing flushed");
                return ActivationReport::default();
            }
        };

        let generations = &self.config.generations;
        let retained = generations.fallback(&names);
        if let Some(generation) = &retained {
            tracing::warn!(
                %generation,
                current = %generations.static_name(),
                "Current shell generation missing; keeping previous"
            );
        }

        let stale: Vec<_> = generations
            .stale(names)
            .into_iter()
            .filter(|name| Some(name) != retained.as_ref())
            .collect();
        tracing::info!(stale = ?stale, "Flushing old caches");

        let results = join_all(stale.into_iter().map(|generation| async move {
            let result = self.storage.delete(&generation).await;
            (generation, result)
        }))
        .await;

        let mut report = ActivationReport { retained, ..Default::default() };
        for (generation, result) in results {
            match result {
                Ok(_) => report.deleted.push(generation),
                Err(e) => {
                    tracing::warn!(%generation, error = %e, "Failed to delete stale generation");
                    report.failed.push(FailedDeletion { generation, error: e.to_string() });
                }
            }
        }
        report
    }

    /// Answer an intercepted request.
    ///
    /// # Errors
    ///
    /// Only when the cache has nothing and the network fetch fails too.
    pub async fn handle_fetch(&self, request: &Url) -> Result<Served, Error> {
        match classify(&self.config.origin, request) {
            RequestKind::Shell => {
                let shell = self.config.shell.shell.clone();
                self.cache_first(&shell, request).await
            }
            RequestKind::Passthrough => self.cache_first(request, request).await,
        }
    }

    /// Fetch straight from the network, no cache involved.
    pub async fn fetch_network(&self, request: &Url) -> Result<Served, Error> {
        let response = self.network.fetch(request).await?;
        Ok(Served { source: ServedFrom::Network, response: response.into_cached() })
    }

    async fn cache_first(&self, lookup: &Url, request: &Url) -> Result<Served, Error> {
        match self.storage.match_any(lookup.as_str()).await {
            Ok(Some(response)) => {
                tracing::debug!(%request, %lookup, "Cache hit");
                return Ok(Served { source: ServedFrom::Cache, response });
            }
            Ok(None) => tracing::debug!(%request, %lookup, "Cache miss; falling back to network"),
            Err(e) => tracing::warn!(%request, error = %e, "Cache lookup failed; falling back to network"),
        }
        self.fetch_network(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use crate::testing::{FaultyDeletes, ScriptedNetwork, url, worker_config};
    use bytes::Bytes;

    fn shell_network() -> ScriptedNetwork {
        ScriptedNetwork::new()
            .respond(&url("/shell.html"), 200, "<html>shell</html>")
            .respond(&url("/js/main.js"), 200, "main()")
            .respond(&url("/js/vendor.js"), 200, "vendor()")
    }

    async fn manager(
        version: u32, network: ScriptedNetwork,
    ) -> (OfflineCacheManager<CacheDb, ScriptedNetwork>, Arc<CacheDb>) {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let manager = OfflineCacheManager::new(worker_config(version), db.clone(), Arc::new(network));
        (manager, db)
    }

    fn static_name(version: u32) -> GenerationName {
        GenerationName::versioned("static", version)
    }

    #[test]
    fn test_shell_asset_urls_order() {
        let urls: Vec<String> = worker_config(1).shell.urls().iter().map(Url::to_string).collect();
        assert_eq!(
            urls,
            vec![
                "http://localhost:8080/js/main.js",
                "http://localhost:8080/js/vendor.js",
                "http://localhost:8080/shell.html",
            ]
        );
    }

    #[tokio::test]
    async fn test_install_caches_all_shell_assets() {
        let (manager, db) = manager(1, shell_network()).await;

        let outcome = manager.install().await;
        assert_eq!(outcome, InstallOutcome::Cached { generation: static_name(1), entries: 3 });

        let entries = db.entries(&static_name(1)).await.unwrap();
        let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "http://localhost:8080/js/main.js",
                "http://localhost:8080/js/vendor.js",
                "http://localhost:8080/shell.html",
            ]
        );
        assert_eq!(entries["http://localhost:8080/shell.html"].body, Bytes::from_static(b"<html>shell</html>"));
    }

    #[tokio::test]
    async fn test_install_first_time_not_ok_leaves_storage_empty() {
        let network = shell_network().respond(&url("/js/vendor.js"), 404, "not found");
        let (manager, db) = manager(1, network).await;

        let outcome = manager.install().await;
        assert_eq!(
            outcome,
            InstallOutcome::Skipped {
                generation: static_name(1),
                reason: SkipReason::NotOk { url: "http://localhost:8080/js/vendor.js".into(), status: 404 },
            }
        );
        assert!(db.keys().await.unwrap().is_empty());
        assert!(db.entries(&static_name(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reinstall_leaves_generation_byte_identical() {
        let (manager, db) = manager(1, shell_network()).await;
        assert!(manager.install().await.is_cached());
        let before = db.entries(&static_name(1)).await.unwrap();

        manager.network().set(&url("/js/main.js"), 200, "main-v2()");
        manager.network().set(&url("/shell.html"), 500, "oops");
        let outcome = manager.install().await;
        assert!(!outcome.is_cached());

        let after = db.entries(&static_name(1)).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_install_network_failure_skips() {
        let network = shell_network().fail(&url("/js/main.js"));
        let (manager, db) = manager(1, network).await;

        match manager.install().await {
            InstallOutcome::Skipped { reason: SkipReason::Network { url, .. }, .. } => {
                assert_eq!(url, "http://localhost:8080/js/main.js");
            }
            other => panic!("expected network skip, got {other:?}"),
        }
        assert!(db.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_fetches_every_asset() {
        let network = shell_network().respond(&url("/js/main.js"), 404, "");
        let (manager, _db) = manager(1, network).await;
        manager.install().await;

        let mut calls = manager.network().calls();
        calls.sort();
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn test_activate_purges_stale_generations() {
        let (manager, db) = manager(2, shell_network()).await;
        for generation in ["static-1", "content", "images-old"] {
            db.open(&GenerationName::fixed(generation)).await.unwrap();
        }
        manager.install().await;

        let report = manager.activate().await;
        let mut deleted = report.deleted.clone();
        deleted.sort();
        assert_eq!(deleted, vec![GenerationName::fixed("images-old"), GenerationName::fixed("static-1")]);
        assert!(report.failed.is_empty());

        let expected = &manager.config().generations;
        let remaining = db.keys().await.unwrap();
        assert!(remaining.iter().all(|name| expected.is_expected(name)));
        assert_eq!(remaining, vec![GenerationName::fixed("content"), static_name(2)]);
    }

    #[tokio::test]
    async fn test_activate_with_nothing_stale() {
        let (manager, db) = manager(1, shell_network()).await;
        manager.install().await;
        db.open(&GenerationName::fixed("content")).await.unwrap();

        let report = manager.activate().await;
        assert_eq!(report, ActivationReport::default());
        assert_eq!(db.keys().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_activate_reports_failed_deletions() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for generation in ["static-1", "static-2", "static-3"] {
            db.open(&GenerationName::fixed(generation)).await.unwrap();
        }
        let storage = Arc::new(FaultyDeletes::new(db.clone(), &["static-1"]));
        let manager = OfflineCacheManager::new(worker_config(3), storage, Arc::new(shell_network()));

        let report = manager.activate().await;
        assert_eq!(report.deleted, vec![GenerationName::fixed("static-2")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].generation, GenerationName::fixed("static-1"));
        assert!(report.failed[0].error.contains("CACHE_ERROR"));

        assert_eq!(db.keys().await.unwrap(), vec![GenerationName::fixed("static-1"), static_name(3)]);
    }

    #[tokio::test]
    async fn test_activate_after_skipped_install_keeps_previous_shell() {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let v1 = OfflineCacheManager::new(worker_config(1), db.clone(), Arc::new(shell_network()));
        assert!(v1.install().await.is_cached());

        let broken = shell_network().respond(&url("/js/vendor.js"), 404, "");
        let v2 = OfflineCacheManager::new(worker_config(2), db.clone(), Arc::new(broken));
        assert!(!v2.install().await.is_cached());
        db.open(&GenerationName::fixed("legacy")).await.unwrap();

        let report = v2.activate().await;
        assert_eq!(report.retained, Some(static_name(1)));
        assert_eq!(report.deleted, vec![GenerationName::fixed("legacy")]);
        assert_eq!(db.keys().await.unwrap(), vec![static_name(1)]);

        let served = v2.handle_fetch(&url("/posts/1")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.body, Bytes::from_static(b"<html>shell</html>"));

        v2.network().set(&url("/js/vendor.js"), 200, "vendor()");
        assert!(v2.install().await.is_cached());
        let report = v2.activate().await;
        assert_eq!(report.retained, None);
        assert_eq!(report.deleted, vec![static_name(1)]);
        assert_eq!(db.keys().await.unwrap(), vec![static_name(2)]);
    }

    #[tokio::test]
    async fn test_shell_route_served_from_cache() {
        let (manager, _db) = manager(1, shell_network()).await;
        manager.install().await;

        for path in ["/", "/posts/7"] {
            let served = manager.handle_fetch(&url(path)).await.unwrap();
            assert_eq!(served.source, ServedFrom::Cache);
            assert_eq!(served.response.body, Bytes::from_static(b"<html>shell</html>"));
        }
    }

    #[tokio::test]
    async fn test_shell_route_falls_back_to_network() {
        let network = ScriptedNetwork::new().respond(&url("/posts/7"), 200, "<html>post 7</html>");
        let (manager, _db) = manager(1, network).await;

        let served = manager.handle_fetch(&url("/posts/7")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.body, Bytes::from_static(b"<html>post 7</html>"));
        assert_eq!(manager.network().calls(), vec!["http://localhost:8080/posts/7"]);
    }

    #[tokio::test]
    async fn test_shell_served_after_cache_cleared() {
        let (manager, db) = manager(1, shell_network().respond(&url("/"), 200, "<html>live</html>")).await;
        manager.install().await;
        db.delete(&static_name(1)).await.unwrap();

        let served = manager.handle_fetch(&url("/")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.body, Bytes::from_static(b"<html>live</html>"));
    }

    #[tokio::test]
    async fn test_passthrough_exact_match() {
        let (manager, _db) = manager(1, shell_network()).await;
        manager.install().await;
        let calls_after_install = manager.network().calls().len();

        let served = manager.handle_fetch(&url("/js/vendor.js")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.body, Bytes::from_static(b"vendor()"));
        assert_eq!(manager.network().calls().len(), calls_after_install);
    }

    #[tokio::test]
    async fn test_passthrough_miss_goes_to_network() {
        let cdn = Url::parse("http://cdn.example.com/font.woff2").unwrap();
        let network = shell_network().respond(&cdn, 200, "font");
        let (manager, _db) = manager(1, network).await;
        manager.install().await;

        let served = manager.handle_fetch(&cdn).await.unwrap();
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.body, Bytes::from_static(b"font"));
    }

    #[tokio::test]
    async fn test_foreign_origin_root_is_not_shell() {
        let foreign = Url::parse("http://other.example.com/").unwrap();
        let network = shell_network().respond(&foreign, 200, "other site");
        let (manager, _db) = manager(1, network).await;
        manager.install().await;

        let served = manager.handle_fetch(&foreign).await.unwrap();
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.body, Bytes::from_static(b"other site"));
    }

    #[tokio::test]
    async fn test_miss_and_network_failure_is_error() {
        let (manager, _db) = manager(1, ScriptedNetwork::new()).await;
        let result = manager.handle_fetch(&url("/js/missing.js")).await;
        assert!(matches!(result, Err(Error::HttpError(_))));
    }
}
