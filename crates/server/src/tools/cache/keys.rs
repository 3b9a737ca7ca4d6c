//! cache_keys tool implementation.
//!
//! Lists generations, or the cached URLs of one generation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{CacheStorage, Error, ExpectedGenerations, GenerationName};

use crate::tools::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Generation to list. Omit to list all generations.
    #[serde(default)]
    pub generation: Option<String>,
}

/// One generation in the cache_keys listing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationSummary {
    pub name: GenerationName,
    /// False for generations the next activation will delete.
    pub expected: bool,
    pub entries: usize,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CacheKeysOutput {
    Generations { generations: Vec<GenerationSummary> },
    Entries { generation: GenerationName, urls: Vec<String> },
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl<S: CacheStorage + ?Sized>(
    storage: &S, expected: &ExpectedGenerations, params: CacheKeysParams,
) -> Result<CallToolResult, McpError> {
    let names = storage.keys().await?;

    let output = match params.generation {
        Some(name) => {
            let generation = GenerationName::from(name);
            if !names.contains(&generation) {
                return Err(Error::CacheMiss(generation.to_string()).into());
            }
            let urls = storage.entries(&generation).await?.into_keys().collect();
            CacheKeysOutput::Entries { generation, urls }
        }
        None => {
            let mut generations = Vec::with_capacity(names.len());
            for name in names {
                let entries = storage.count(&name).await?;
                generations.push(GenerationSummary { expected: expected.is_expected(&name), name, entries });
            }
            CacheKeysOutput::Generations { generations }
        }
    };

    json_result(&output)
}
