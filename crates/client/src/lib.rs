//! Client code for shellcache.
//!
//! This crate provides the HTTP side of the worker: a reqwest-backed
//! implementation of the core `Network` trait and URL handling for incoming
//! requests.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, canonicalize, resolve};
