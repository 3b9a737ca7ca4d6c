//! Worker lifecycle tools: install, activate, fetch.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::resolve;
use shellcache_core::{
    ActivationReport, CacheStorage, Error, InstallOutcome, Network, OfflineCacheManager, ServedFrom, WorkerHost,
    WorkerState,
};

use super::json_result;

/// Largest body echoed back as text in `worker_fetch` output.
const MAX_BODY_PREVIEW: usize = 4096;

/// Output from the worker_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerInstallOutput {
    pub state: WorkerState,
    pub outcome: InstallOutcome,
}

/// Output from the worker_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerActivateOutput {
    pub state: WorkerState,
    pub report: ActivationReport,
}

/// Parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Request URL. Root-relative paths (`/posts/1`) resolve against the page origin.
    pub url: String,
}

/// Output from the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// Whether the worker answered from cache or network.
    pub source: ServedFrom,
    /// The URL of the response served; differs from `url` when the shell answers a navigation.
    pub response_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body_bytes: usize,
    pub body_sha256: String,
    /// Body as text, when it is UTF-8 and small enough to echo.
    pub body: Option<String>,
}

/// Implementation of the worker_install tool.
pub async fn install_impl<S: CacheStorage, N: Network>(
    host: &WorkerHost<OfflineCacheManager<S, N>>,
) -> Result<CallToolResult, McpError> {
    let outcome = host.install().await?;
    json_result(&WorkerInstallOutput { state: host.state(), outcome })
}

/// Implementation of the worker_activate tool.
pub async fn activate_impl<S: CacheStorage, N: Network>(
    host: &WorkerHost<OfflineCacheManager<S, N>>,
) -> Result<CallToolResult, McpError> {
    let report = host.activate().await?;
    json_result(&WorkerActivateOutput { state: host.state(), report })
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl<S: CacheStorage, N: Network>(
    host: &WorkerHost<OfflineCacheManager<S, N>>, params: WorkerFetchParams,
) -> Result<CallToolResult, McpError> {
    let url = resolve(&host.handler().config().origin, &params.url).map_err(Error::from)?;
    let served = host.fetch(&url).await?;

    let response = served.response;
    let body = (response.body.len() <= MAX_BODY_PREVIEW)
        .then(|| std::str::from_utf8(&response.body).ok().map(str::to_string))
        .flatten();

    json_result(&WorkerFetchOutput {
        url: url.to_string(),
        source: served.source,
        response_url: response.url,
        status: response.status,
        content_type: response.content_type,
        body_bytes: response.body.len(),
        body_sha256: response.body_sha256,
        body,
    })
}
