//! Build asset manifest.
//!
//! The bundler may emit revisioned filenames (`js/main-bundle-3f2a.js`). The
//! manifest maps each logical name to what was emitted, so the precache list
//! always points at files that exist.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Logical asset name to emitted filename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    entries: BTreeMap<String, String>,
}

impl AssetManifest {
    /// Read a JSON manifest from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Manifest { path: path.display().to_string(), reason: e.to_string() })?;
        Self::from_json(&raw).map_err(|e| match e {
            ConfigError::Manifest { reason, .. } => ConfigError::Manifest { path: path.display().to_string(), reason },
            other => other,
        })
    }

    /// Parse a manifest from a JSON object of string pairs.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw)
            .map_err(|e| ConfigError::Manifest { path: "<inline>".into(), reason: e.to_string() })
    }

    /// Absolute path the asset is served under.
    ///
    /// Unmapped names resolve to themselves.
    pub fn asset_filename(&self, name: &str) -> String {
        let emitted = self.entries.get(name).map(String::as_str).unwrap_or(name);
        format!("/{}", emitted.trim_start_matches('/'))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
