//! Generation naming and the expected/stale split.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of a cache generation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct GenerationName(String);

impl GenerationName {
    /// Version-qualified name, e.g. `static-3`.
    pub fn versioned(prefix: &str, version: u32) -> Self {
        Self(format!("{prefix}-{version}"))
    }

    /// Unversioned name that survives worker updates, e.g. `content`.
    pub fn fixed(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GenerationName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The two generations a worker version keeps: its own static generation and
/// the shared content generation. Every other name is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedGenerations {
    static_name: GenerationName,
    content_name: GenerationName,
}

impl ExpectedGenerations {
    pub fn new(static_name: GenerationName, content_name: GenerationName) -> Self {
        Self { static_name, content_name }
    }

    pub fn static_name(&self) -> &GenerationName {
        &self.static_name
    }

    pub fn content_name(&self) -> &GenerationName {
        &self.content_name
    }

    pub fn is_expected(&self, name: &GenerationName) -> bool {
        *name == self.static_name || *name == self.content_name
    }

    /// Names to delete at activation.
    ///
    /// Each name is judged on its own, so the result is the same set whatever
    /// order `names` arrives in; it keeps that input order.
    pub fn stale(&self, names: impl IntoIterator<Item = GenerationName>) -> Vec<GenerationName> {
        names.into_iter().filter(|name| !self.is_expected(name)).collect()
    }

    /// Older static generation to keep while the current one is missing.
    ///
    /// A skipped install leaves no current static generation. The highest
    /// earlier version with the same prefix then keeps serving the shell
    /// until an activation finds its replacement cached.
    pub fn fallback(&self, names: &[GenerationName]) -> Option<GenerationName> {
        if names.contains(&self.static_name) {
            return None;
        }
        let (prefix, _) = self.static_name.as_str().rsplit_once('-')?;
        names
            .iter()
            .filter_map(|name| {
                let version = name.as_str().strip_prefix(prefix)?.strip_prefix('-')?.parse::<u32>().ok()?;
                Some((version, name))
            })
            .max_by_key(|(version, _)| *version)
            .map(|(_, name)| name.clone())
    }
}
