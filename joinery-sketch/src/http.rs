use async_trait::async_trait;
use joinery_types::{Sketch, SketchMatch};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{SketchError, SketchService};

#[derive(Serialize)]
struct QueryRequest<'a> {
    n_permutations: u32,
    hash_values: &'a [u64],
    cardinality: u64,
}

/// `{"results": [["dataset_id", "column_name", 0.83], ...]}`
#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<(String, String, f64)>,
}

/// HTTP client for the sketch-similarity service.
pub struct HttpSketchClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSketchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SketchService for HttpSketchClient {
    async fn query(&self, sketch: &Sketch) -> Result<Vec<SketchMatch>, SketchError> {
        let url = format!("{}/query", self.base_url.trim_end_matches('/'));
        let body = QueryRequest {
            n_permutations: sketch.n_permutations,
            hash_values: &sketch.hash_values,
            cardinality: sketch.cardinality,
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SketchError {
                message: format!("HTTP error: {e}"),
            })?;

        if !resp.status().is_success() {
            return Err(SketchError {
                message: format!("HTTP status: {}", resp.status()),
            });
        }

        let parsed: QueryResponse = resp.json().await.map_err(|e| SketchError {
            message: format!("parse error: {e}"),
        })?;
        debug!(candidates = parsed.results.len(), "sketch query");

        Ok(parsed
            .results
            .into_iter()
            .map(|(dataset_id, column_name, score)| SketchMatch {
                dataset_id,
                column_name,
                score,
            })
            .collect())
    }
}
