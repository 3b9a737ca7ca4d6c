//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::assets::AssetManifest;
use crate::cache::{ExpectedGenerations, GenerationName};
use crate::worker::{ShellAssetSet, WorkerConfig};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache storage.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// The page's own origin. Only same-origin navigations are answered
    /// with the shell.
    ///
    /// Set via SHELLCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Worker version. Bumping it moves the shell into a new static
    /// generation and marks the previous one stale.
    ///
    /// Set via SHELLCACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Prefix of the versioned static generation name (`<prefix>-<version>`).
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// Name of the long-lived content generation.
    #[serde(default = "default_content_cache_name")]
    pub content_cache_name: String,

    /// Logical name of the shell document.
    #[serde(default = "default_shell_document")]
    pub shell_document: String,

    /// Logical names of the JS bundles precached with the shell.
    ///
    /// Set via SHELLCACHE_SHELL_ASSETS environment variable.
    #[serde(default = "default_shell_assets")]
    pub shell_assets: Vec<String>,

    /// Optional JSON manifest mapping logical asset names to the filenames
    /// the build emitted.
    ///
    /// Set via SHELLCACHE_ASSET_MANIFEST environment variable.
    #[serde(default)]
    pub asset_manifest: Option<PathBuf>,

    /// Path segment that content resources live under (`/<prefix>/posts/<id>`).
    #[serde(default = "default_content_prefix")]
    pub content_prefix: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SHELLCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SHELLCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SHELLCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_version() -> u32 {
    1
}

fn default_static_prefix() -> String {
    "static".into()
}

fn default_content_cache_name() -> String {
    "content".into()
}

fn default_shell_document() -> String {
    "shell.html".into()
}

fn default_shell_assets() -> Vec<String> {
    vec!["js/main-bundle.js".into(), "js/vendor-bundle.js".into()]
}

fn default_content_prefix() -> String {
    "api".into()
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            version: default_version(),
            static_prefix: default_static_prefix(),
            content_cache_name: default_content_cache_name(),
            shell_document: default_shell_document(),
            shell_assets: default_shell_assets(),
            asset_manifest: None,
            content_prefix: default_content_prefix(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parsed page origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(url),
            _ => Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an absolute http(s) URL".into() }),
        }
    }

    /// The generations this worker version expects to keep.
    pub fn expected_generations(&self) -> ExpectedGenerations {
        ExpectedGenerations::new(
            GenerationName::versioned(&self.static_prefix, self.version),
            GenerationName::fixed(&self.content_cache_name),
        )
    }

    /// Build the per-worker configuration handed to the cache manager.
    ///
    /// Asset names are resolved through the build manifest when one is
    /// configured, then joined onto the origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the origin is invalid, the manifest cannot be
    /// read, or a resolved asset path does not form a URL.
    pub fn worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        let origin = self.origin_url()?;
        let manifest = match &self.asset_manifest {
            Some(path) => {
                let manifest = AssetManifest::load(path)?;
                if manifest.is_empty() {
                    tracing::warn!(path = %path.display(), "Asset manifest is empty; using logical names");
                } else {
                    tracing::debug!(path = %path.display(), entries = manifest.len(), "Loaded asset manifest");
                }
                manifest
            }
            None => AssetManifest::default(),
        };

        let join = |name: &str| {
            origin
                .join(&manifest.asset_filename(name))
                .map_err(|e| ConfigError::Invalid { field: "shell_assets".into(), reason: format!("{name}: {e}") })
        };

        let shell = join(&self.shell_document)?;
        let assets = self
            .shell_assets
            .iter()
            .map(|name| join(name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(WorkerConfig {
            origin: origin.clone(),
            generations: self.expected_generations(),
            shell: ShellAssetSet { shell, assets },
            content_prefix: self.content_prefix.trim_matches('/').to_string(),
        })
    }
}
