use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default number of decoded sources kept in the LRU cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 5;

/// `isclose`-style tolerance: `|a - b| <= atol + rtol * |b|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { rtol: 1e-5, atol: 1e-8 }
    }
}

impl Tolerance {
    pub fn is_close(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.atol + self.rtol * b.abs()
    }
}

/// Session settings. Every field has a default, so a config file only needs
/// the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of decoded sources held by the cache. Zero disables caching.
    pub cache_capacity: usize,
    /// Tolerance for the sum-to-one weight check.
    pub tolerance: Tolerance,
    /// Decode batch uploads in parallel (needs the `threading` feature).
    pub parallel_decode: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            tolerance: Tolerance::default(),
            parallel_decode: true,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Load a JSON config file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text).map_err(std::io::Error::from)
    }
}
