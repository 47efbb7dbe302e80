use std::fs;
use std::path::Path;
use std::time::Duration;

use joinery_query::{INNER_HITS_SIZE, MAX_SKETCH_CANDIDATES, TOP_K_SIZE};
use joinery_types::ResolutionOrder;
use serde::Deserialize;

/// Engine tuning. Every field has a default, so a partial YAML file is fine:
///
/// ```yaml
/// top_k: 20
/// query_timeout_ms: 5000
/// temporal_resolutions: [year, month, day]
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub top_k: usize,
    pub inner_hits: usize,
    pub max_sketch_candidates: usize,
    pub query_timeout_ms: u64,
    pub sketch_timeout_ms: u64,
    pub metadata_timeout_ms: u64,
    /// Coarsest first.
    pub temporal_resolutions: ResolutionOrder,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            top_k: TOP_K_SIZE,
            inner_hits: INNER_HITS_SIZE,
            max_sketch_candidates: MAX_SKETCH_CANDIDATES,
            query_timeout_ms: 30_000,
            sketch_timeout_ms: 30_000,
            metadata_timeout_ms: 30_000,
            temporal_resolutions: ResolutionOrder::default(),
        }
    }
}

impl DiscoveryConfig {
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// `JOINERY_CONFIG` if set, defaults otherwise.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var("JOINERY_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_path(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn sketch_timeout(&self) -> Duration {
        Duration::from_millis(self.sketch_timeout_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }
}
