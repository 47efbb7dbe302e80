use std::collections::HashMap;

use async_trait::async_trait;
use joinery_types::{DiscoveryError, Sketch, SketchMatch};
use thiserror::Error;

pub mod http;
pub use http::HttpSketchClient;

#[derive(Debug, Error)]
#[error("sketch service error: {message}")]
pub struct SketchError {
    pub message: String,
}

impl From<SketchError> for DiscoveryError {
    fn from(err: SketchError) -> Self {
        DiscoveryError::ExternalServiceUnavailable(err.to_string())
    }
}

/// Set-similarity lookup: which catalog columns hold values similar to this sketch.
#[async_trait]
pub trait SketchService: Send + Sync {
    /// Candidates in the service's rank order.
    async fn query(&self, sketch: &Sketch) -> Result<Vec<SketchMatch>, SketchError>;
}

/// Service that never finds anything.
pub struct NullSketchService;

#[async_trait]
impl SketchService for NullSketchService {
    async fn query(&self, _sketch: &Sketch) -> Result<Vec<SketchMatch>, SketchError> {
        Ok(Vec::new())
    }
}

/// Canned answers keyed by the sketch's hash values.
#[derive(Default)]
pub struct StaticSketchService {
    answers: HashMap<Vec<u64>, Vec<SketchMatch>>,
}

impl StaticSketchService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, hash_values: Vec<u64>, matches: Vec<SketchMatch>) -> Self {
        self.answers.insert(hash_values, matches);
        self
    }
}

#[async_trait]
impl SketchService for StaticSketchService {
    async fn query(&self, sketch: &Sketch) -> Result<Vec<SketchMatch>, SketchError> {
        Ok(self.answers.get(&sketch.hash_values).cloned().unwrap_or_default())
    }
}
