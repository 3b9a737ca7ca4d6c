//! Cache-related MCP tools.
//!
//! This module provides read-only views of cache storage.

pub mod keys;

pub use keys::{CacheKeysParams, keys_impl};
