//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("failed to read asset manifest {path}: {reason}")]
    Manifest { path: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `version` is 0
    /// - a generation name part is empty, or both generations share a name
    /// - `shell_document`, an entry of `shell_assets`, or `content_prefix` is empty
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if self.version == 0 {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must be at least 1".into() });
        }

        if self.static_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "static_prefix".into(), reason: "must not be empty".into() });
        }
        if self.content_cache_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "content_cache_name".into(),
                reason: "must not be empty".into(),
            });
        }
        let expected = self.expected_generations();
        if expected.static_name() == expected.content_name() {
            return Err(ConfigError::Invalid {
                field: "content_cache_name".into(),
                reason: format!("collides with static generation {}", expected.static_name()),
            });
        }

        if self.shell_document.is_empty() {
            return Err(ConfigError::Invalid { field: "shell_document".into(), reason: "must not be empty".into() });
        }
        if self.shell_assets.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid {
                field: "shell_assets".into(),
                reason: "asset names must not be empty".into(),
            });
        }
        if self.content_prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid { field: "content_prefix".into(), reason: "must not be empty".into() });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.shell_assets.is_empty() {
            tracing::warn!(shell_document = %self.shell_document, "No shell assets configured; only the shell document is precached");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(config: AppConfig) -> String {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_origin() {
        assert_eq!(invalid_field(AppConfig { origin: "not a url".into(), ..Default::default() }), "origin");
    }

    #[test]
    fn test_validate_version_zero() {
        assert_eq!(invalid_field(AppConfig { version: 0, ..Default::default() }), "version");
    }

    #[test]
    fn test_validate_empty_generation_names() {
        assert_eq!(invalid_field(AppConfig { static_prefix: String::new(), ..Default::default() }), "static_prefix");
        assert_eq!(
            invalid_field(AppConfig { content_cache_name: String::new(), ..Default::default() }),
            "content_cache_name"
        );
    }

    #[test]
    fn test_validate_generation_collision() {
        let config = AppConfig { content_cache_name: "static-1".into(), ..Default::default() };
        assert_eq!(invalid_field(config), "content_cache_name");
    }

    #[test]
    fn test_validate_empty_shell_names() {
        assert_eq!(invalid_field(AppConfig { shell_document: String::new(), ..Default::default() }), "shell_document");
        assert_eq!(
            invalid_field(AppConfig { shell_assets: vec!["js/main.js".into(), String::new()], ..Default::default() }),
            "shell_assets"
        );
        assert_eq!(invalid_field(AppConfig { content_prefix: "/".into(), ..Default::default() }), "content_prefix");
    }

    #[test]
    fn test_validate_no_shell_assets_is_allowed() {
        let config = AppConfig { shell_assets: Vec::new(), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_bounds() {
        assert_eq!(invalid_field(AppConfig { max_bytes: 0, ..Default::default() }), "max_bytes");
        assert_eq!(invalid_field(AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() }), "max_bytes");
    }

    #[test]
    fn test_validate_timeout_bounds() {
        assert_eq!(invalid_field(AppConfig { timeout_ms: 50, ..Default::default() }), "timeout_ms");
        assert_eq!(invalid_field(AppConfig { timeout_ms: 301_000, ..Default::default() }), "timeout_ms");
    }

    #[test]
    fn test_validate_empty_user_agent() {
        assert_eq!(invalid_field(AppConfig { user_agent: String::new(), ..Default::default() }), "user_agent");
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());

        let config = AppConfig { max_bytes: 50 * 1024 * 1024, timeout_ms: 300_000, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
