//! MCP server handler implementation.
//!
//! Holds the single worker version this process hosts and routes tool calls
//! to the lifecycle and content implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheKeysParams, keys_impl};
use crate::tools::content::{ContentStatusParams, ContentToggleParams, status_impl, toggle_impl};
use crate::tools::worker::{WorkerFetchParams, activate_impl, fetch_impl, install_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::FetchClient;
use shellcache_core::{CacheDb, ContentCache, OfflineCacheManager, WorkerConfig, WorkerHost};

/// The worker as hosted by this binary.
pub type Worker = OfflineCacheManager<CacheDb, FetchClient>;

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellCacheServer {
    host: Arc<WorkerHost<Worker>>,
    content: Arc<ContentCache<CacheDb, FetchClient>>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl ShellCacheServer {
    /// Create a new server handler around a freshly parsed worker.
    pub fn new(config: WorkerConfig, db: CacheDb, network: FetchClient) -> Self {
        let storage = Arc::new(db);
        let network = Arc::new(network);
        let content = ContentCache::new(&config, storage.clone(), network.clone());
        let manager = OfflineCacheManager::new(config, storage, network);

        Self { host: Arc::new(WorkerHost::new(manager)), content: Arc::new(content), tool_router: Self::tool_router() }
    }

    #[tool(description = "Run the worker install phase: precache the app shell into the current static generation. \
                          All assets must fetch OK or nothing is written.")]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.host).await
    }

    #[tool(description = "Run the worker activation phase: delete every cache generation other than the current \
                          static generation and the content generation. If the current static generation was \
                          never cached, the previous one is kept.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.host).await
    }

    #[tool(description = "Send one request through the worker. Returns where it was answered from (cache or network) \
                          and the response status, type, size and SHA-256.")]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.host, params.0).await
    }

    #[tool(description = "Apply a 'Read offline' checkbox change for a content item such as posts/42. \
                          Returns the checkbox state after the change; a failed add comes back unchecked.")]
    async fn content_toggle(&self, params: Parameters<ContentToggleParams>) -> Result<CallToolResult, McpError> {
        toggle_impl(&self.content, params.0).await
    }

    #[tool(description = "Report which content items are available offline.")]
    async fn content_status(&self, params: Parameters<ContentStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.content, params.0).await
    }

    #[tool(description = "List cache generations, or the cached URLs of one generation.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        let worker = self.host.handler();
        keys_impl(worker.storage().as_ref(), &worker.config().generations, params.0).await
    }
}

impl ServerHandler for ShellCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
