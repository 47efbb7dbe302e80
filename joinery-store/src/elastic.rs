use async_trait::async_trait;
use joinery_types::HitSource;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{IndexError, ScoredDocument, SearchIndex, SearchRequest};

/// Elasticsearch-backed catalog.
pub struct ElasticsearchIndex {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl ElasticsearchIndex {
    pub fn new(base_url: &str) -> Result<Self, IndexError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| IndexError::Unavailable(format!("invalid index url {base_url}: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, IndexError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IndexError::Unavailable(format!("index url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    hits: HitList,
}

#[derive(Deserialize, Debug)]
struct HitList {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize, Debug)]
struct RawHit {
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: RawSource,
}

/// `_source` as projected by `JOIN_RESULT_SOURCE_FIELDS`.
#[derive(Deserialize, Debug, Default)]
struct RawSource {
    dataset_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    column_names: Option<Vec<String>>,
    #[serde(default)]
    column_indexes: Option<Vec<usize>>,
    #[serde(default)]
    temporal_resolution: Option<String>,
}

impl TryFrom<RawSource> for HitSource {
    type Error = IndexError;

    fn try_from(raw: RawSource) -> Result<Self, Self::Error> {
        match raw {
            RawSource {
                dataset_id,
                name: Some(name),
                index: Some(index),
                ..
            } => Ok(HitSource::Column {
                dataset_id,
                name,
                index,
            }),
            RawSource {
                dataset_id,
                column_names: Some(column_names),
                column_indexes: Some(column_indexes),
                temporal_resolution,
                ..
            } if column_names.len() == column_indexes.len() => Ok(HitSource::Coverage {
                dataset_id,
                column_names,
                column_indexes,
                temporal_resolution,
            }),
            RawSource { dataset_id, .. } => Err(IndexError::MalformedResponse(format!(
                "hit for {dataset_id} is neither a column nor a coverage document"
            ))),
        }
    }
}

#[derive(Deserialize, Debug)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<serde_json::Value>,
}

fn decode_hits(parsed: SearchResponse) -> Vec<ScoredDocument> {
    parsed
        .hits
        .hits
        .into_iter()
        .filter_map(|hit| match HitSource::try_from(hit.source) {
            Ok(source) => Some(ScoredDocument {
                score: hit.score.unwrap_or(0.0),
                source,
            }),
            Err(e) => {
                warn!(error = %e, "skipping undecodable hit");
                None
            }
        })
        .collect()
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredDocument>, IndexError> {
        let mut url = self.url(&[request.index.as_str(), "_search"])?;
        url.query_pairs_mut().append_pair("size", &request.size.to_string());
        debug!(index = request.index.as_str(), clauses = request.should.len(), "index search");

        let resp = self
            .client
            .post(url)
            .json(&request.body())
            .send()
            .await
            .map_err(|e| IndexError::Unavailable(format!("search request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(IndexError::Unavailable(format!("search status: {}", resp.status())));
        }

        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| IndexError::MalformedResponse(format!("search parse error: {e}")))?;
        Ok(decode_hits(parsed))
    }

    async fn dataset_metadata(&self, dataset_id: &str) -> Result<serde_json::Value, IndexError> {
        let url = self.url(&["datasets", "_doc", dataset_id])?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IndexError::Unavailable(format!("get request error: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexError::NotFound(dataset_id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(IndexError::Unavailable(format!("get status: {}", resp.status())));
        }

        let parsed: GetResponse = resp
            .json()
            .await
            .map_err(|e| IndexError::MalformedResponse(format!("get parse error: {e}")))?;
        match parsed {
            GetResponse {
                found: true,
                source: Some(source),
            } => Ok(source),
            _ => Err(IndexError::NotFound(dataset_id.to_string())),
        }
    }
}
