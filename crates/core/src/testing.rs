//! Test doubles shared by the worker and content tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::cache::{CacheDb, CacheStorage, CachedResponse, GenerationName};
use crate::network::{FetchResponse, Network};
use crate::worker::{ShellAssetSet, WorkerConfig};
use crate::{AppConfig, Error};

pub(crate) const ORIGIN: &str = "http://localhost:8080";

/// Worker config with the three-file shell used throughout the tests.
pub(crate) fn worker_config(version: u32) -> WorkerConfig {
    let config = AppConfig { version, ..Default::default() };
    let origin = Url::parse(ORIGIN).unwrap();
    WorkerConfig {
        shell: ShellAssetSet {
            shell: origin.join("/shell.html").unwrap(),
            assets: vec![origin.join("/js/main.js").unwrap(), origin.join("/js/vendor.js").unwrap()],
        },
        generations: config.expected_generations(),
        origin,
        content_prefix: "api".to_string(),
    }
}

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

enum Route {
    Respond { status: u16, body: Bytes },
    Fail,
}

/// A network that answers from a fixed routing table and records calls.
/// Unrouted URLs are rejected.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Route>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, url: &Url, status: u16, body: &'static str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Respond { status, body: Bytes::from_static(body.as_bytes()) });
        self
    }

    pub(crate) fn fail(self, url: &Url) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Fail);
        self
    }

    /// Hold responses for `url` back by `delay`.
    pub(crate) fn delay(self, url: &Url, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
        self
    }

    pub(crate) fn clear_delays(&self) {
        self.delays.lock().unwrap().clear();
    }

    /// Replace a route after construction.
    pub(crate) fn set(&self, url: &Url, status: u16, body: &'static str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Respond { status, body: Bytes::from_static(body.as_bytes()) });
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, Error> {
        self.calls.lock().unwrap().push(url.to_string());
        let delay = self.delays.lock().unwrap().get(url.as_str()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let routes = self.routes.lock().unwrap();
        match routes.get(url.as_str()) {
            Some(Route::Respond { status, body }) => Ok(FetchResponse {
                url: url.clone(),
                final_url: url.clone(),
                status: *status,
                content_type: None,
                bytes: body.clone(),
                fetch_ms: 0,
            }),
            Some(Route::Fail) => Err(Error::HttpError(format!("network error: connection refused for {url}"))),
            None => Err(Error::HttpError(format!("network error: no route to {url}"))),
        }
    }
}

/// Wraps a `CacheDb`; `delete` fails for chosen generations and can be slowed.
pub(crate) struct FaultyDeletes {
    inner: CacheDb,
    failing: HashSet<String>,
    delay: Option<Duration>,
}

impl FaultyDeletes {
    pub(crate) fn new(inner: CacheDb, failing: &[&str]) -> Self {
        Self { inner, failing: failing.iter().map(|name| name.to_string()).collect(), delay: None }
    }

    pub(crate) fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CacheStorage for FaultyDeletes {
    async fn open(&self, name: &GenerationName) -> Result<(), Error> {
        self.inner.open(name).await
    }

    async fn put(&self, name: &GenerationName, response: CachedResponse) -> Result<(), Error> {
        self.inner.put(name, response).await
    }

    async fn put_all(&self, name: &GenerationName, responses: Vec<CachedResponse>) -> Result<(), Error> {
        self.inner.put_all(name, responses).await
    }

    async fn match_url(&self, name: &GenerationName, url: &str) -> Result<Option<CachedResponse>, Error> {
        self.inner.match_url(name, url).await
    }

    async fn match_any(&self, url: &str) -> Result<Option<CachedResponse>, Error> {
        self.inner.match_any(url).await
    }

    async fn keys(&self) -> Result<Vec<GenerationName>, Error> {
        self.inner.keys().await
    }

    async fn entries(&self, name: &GenerationName) -> Result<BTreeMap<String, CachedResponse>, Error> {
        self.inner.entries(name).await
    }

    async fn count(&self, name: &GenerationName) -> Result<usize, Error> {
        self.inner.count(name).await
    }

    async fn delete(&self, name: &GenerationName) -> Result<bool, Error> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(name.as_str()) {
            return Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed));
        }
        self.inner.delete(name).await
    }

    async fn delete_entry(&self, name: &GenerationName, url: &str) -> Result<bool, Error> {
        self.inner.delete_entry(name, url).await
    }
}
