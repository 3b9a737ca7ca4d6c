//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Generation-based cache storage with SQLite backend
//! - The offline cache manager and its worker lifecycle host
//! - Page-side content caching ("read offline")
//! - Unified error types
//! - Configuration structures

pub mod assets;
pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod network;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use assets::AssetManifest;
pub use cache::{CacheDb, CacheStorage, CachedResponse, ExpectedGenerations, GenerationName};
pub use config::AppConfig;
pub use content::ContentCache;
pub use error::Error;
pub use network::{FetchResponse, Network};
pub use worker::{
    ActivationReport, InstallOutcome, LifecycleHandler, OfflineCacheManager, Served, ServedFrom, ShellAssetSet,
    SkipReason, WorkerConfig, WorkerHost, WorkerState,
};
