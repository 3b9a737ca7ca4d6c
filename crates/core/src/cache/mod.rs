//! SQLite-backed storage for cache generations.
//!
//! A generation is a named bucket of request URL to response pairs, the same
//! shape as the browser's Cache Storage. This module provides:
//!
//! - The `CacheStorage` interface the worker and content views program against
//! - `CacheDb`, its SQLite implementation via tokio-rusqlite
//! - Generation naming and the expected/stale split used at activation
//! - Automatic schema migrations

pub mod connection;
pub mod generation;
pub mod hash;
pub mod migrations;
pub mod response;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use generation::{ExpectedGenerations, GenerationName};
pub use response::CachedResponse;
pub use storage::CacheStorage;
