use async_trait::async_trait;
use joinery_types::{DiscoveryError, HitSource};
use thiserror::Error;

pub mod request;
pub use request::{ColumnBoost, Filter, IndexName, OverlapClause, SearchRequest, Shape, Should};

pub mod elastic;
pub use elastic::ElasticsearchIndex;

pub mod memory;
pub use memory::{ColumnDocument, CoverageDocument, InMemoryIndex};

/// Fields every join query projects from matched documents.
pub const JOIN_RESULT_SOURCE_FIELDS: [&str; 7] = [
    "dataset_id",
    "name",
    "index",
    "column_names",
    "column_indexes",
    "type",
    "temporal_resolution",
];

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("dataset not found: {0}")]
    NotFound(String),
    #[error("index unavailable: {0}")]
    Unavailable(String),
    #[error("malformed index response: {0}")]
    MalformedResponse(String),
}

impl From<IndexError> for DiscoveryError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotFound(id) => DiscoveryError::DatasetNotFound(id),
            other => DiscoveryError::ExternalServiceUnavailable(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredDocument {
    pub score: f64,
    pub source: HitSource,
}

/// The catalog: scored join queries plus per-dataset record lookups.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Run a join query and return at most `request.size` documents, best first.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredDocument>, IndexError>;

    /// Fetch the dataset record (`datasets` index) by id.
    async fn dataset_metadata(&self, dataset_id: &str) -> Result<serde_json::Value, IndexError>;

    /// Resolve column positions by name within a catalog dataset.
    ///
    /// The result is aligned with `names`; names the dataset does not have map to `None`.
    async fn column_indexes(&self, dataset_id: &str, names: &[String]) -> Result<Vec<Option<usize>>, IndexError> {
        let record = self.dataset_metadata(dataset_id).await?;
        let columns = record
            .get("columns")
            .and_then(|c| c.as_array())
            .ok_or_else(|| IndexError::MalformedResponse(format!("dataset {dataset_id} has no columns")))?;
        Ok(names
            .iter()
            .map(|wanted| {
                columns
                    .iter()
                    .position(|c| c.get("name").and_then(|n| n.as_str()) == Some(wanted.as_str()))
            })
            .collect())
    }
}

/// Index with nothing in it.
pub struct NullIndex;

#[async_trait]
impl SearchIndex for NullIndex {
    async fn search(&self, _request: &SearchRequest) -> Result<Vec<ScoredDocument>, IndexError> {
        Ok(Vec::new())
    }

    async fn dataset_metadata(&self, dataset_id: &str) -> Result<serde_json::Value, IndexError> {
        Err(IndexError::NotFound(dataset_id.to_string()))
    }
}
