//! Resolver configuration.
//!
//! Supplied externally and read-only at runtime: the default candidate
//! list, the designated direct URLs, an opaque certificate blob passed
//! through to the prober, and the candidate-source fetch knobs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

pub const DEFAULT_DIRECT_URL: &str = "https://www.wikipedia.org/";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Default proxy/transport URLs to probe.
    pub candidates: Vec<String>,
    /// Baseline URLs whose success means no proxy is needed.
    pub direct_urls: Vec<String>,
    /// Certificate/credential blob handed to the prober, never interpreted.
    pub cert: Option<String>,
    /// Remote sources that may yield additional candidate URLs.
    pub url_sources: Vec<String>,
    pub url_interval: u32,
    pub url_start: u32,
    pub url_end: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            direct_urls: vec![DEFAULT_DIRECT_URL.to_string()],
            cert: None,
            url_sources: Vec::new(),
            url_interval: 1,
            url_start: 1,
            url_end: 1,
        }
    }
}

impl ResolverConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A config with no candidates may still proceed when sources exist:
    /// the prober fetches candidates from them before validating.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidates.is_empty() {
            if self.url_sources.is_empty() {
                return Err(ConfigError::NoCandidates);
            }
            warn!("no default candidate urls, relying on url sources");
        }
        Ok(())
    }
}
