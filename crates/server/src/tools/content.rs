//! Page-side content tools: the "Read offline" checkbox and the home list's
//! "Available offline" indicator.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{CacheStorage, ContentCache, Error, Network};

use super::json_result;

/// Parameters for the content_toggle tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentToggleParams {
    /// Content id, e.g. `posts/42`.
    pub content_id: String,
    /// New checkbox state requested by the user.
    pub checked: bool,
}

/// Output from the content_toggle tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentToggleOutput {
    pub content_id: String,
    /// Checkbox state after the change.
    pub checked: bool,
}

/// Parameters for the content_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentStatusParams {
    pub content_ids: Vec<String>,
}

/// Output from the content_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentStatusOutput {
    /// Content id to whether it is available offline.
    pub offline: BTreeMap<String, bool>,
}

/// Implementation of the content_toggle tool.
pub async fn toggle_impl<S: CacheStorage, N: Network>(
    content: &ContentCache<S, N>, params: ContentToggleParams,
) -> Result<CallToolResult, McpError> {
    content.content_url(&params.content_id)?;
    let checked = content.set_offline(&params.content_id, params.checked).await;
    json_result(&ContentToggleOutput { content_id: params.content_id, checked })
}

/// Implementation of the content_status tool.
pub async fn status_impl<S: CacheStorage, N: Network>(
    content: &ContentCache<S, N>, params: ContentStatusParams,
) -> Result<CallToolResult, McpError> {
    if params.content_ids.is_empty() {
        return Err(Error::InvalidInput("content_ids must not be empty".to_string()).into());
    }
    let offline = content.offline_status(&params.content_ids).await;
    json_result(&ContentStatusOutput { offline })
}
