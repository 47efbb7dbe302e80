use std::collections::HashMap;

use async_trait::async_trait;
use joinery_types::{HitSource, Interval};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::{Filter, IndexError, IndexName, ScoredDocument, SearchIndex, SearchRequest, Shape, Should};

/// Catalog column record.
#[derive(Clone, Debug)]
pub struct ColumnDocument {
    pub dataset_id: String,
    pub name: String,
    pub index: usize,
    pub structural_type: String,
    pub semantic_types: Vec<String>,
    pub coverage: Vec<Interval>,
}

/// Catalog spatial/temporal coverage record.
#[derive(Clone, Debug)]
pub struct CoverageDocument {
    pub dataset_id: String,
    pub column_names: Vec<String>,
    pub column_indexes: Vec<usize>,
    pub ranges: Vec<Shape>,
    pub temporal_resolution: Option<String>,
}

/// In-process catalog that evaluates join queries itself.
///
/// Supplementary clauses are understood in two shapes only: `{"term": {field: value}}`
/// filters and `{"weight": w, "filter"?: {"term": ..}}` functions. Anything else is
/// ignored.
pub struct InMemoryIndex {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    columns: Vec<ColumnDocument>,
    spatial: Vec<CoverageDocument>,
    temporal: Vec<CoverageDocument>,
    datasets: HashMap<String, Value>,
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub async fn put_dataset(&self, dataset_id: &str, metadata: Value) {
        self.inner.write().await.datasets.insert(dataset_id.to_string(), metadata);
    }

    /// Drop only the dataset record, leaving its column/coverage documents searchable.
    pub async fn forget_dataset(&self, dataset_id: &str) {
        self.inner.write().await.datasets.remove(dataset_id);
    }

    pub async fn put_column(&self, doc: ColumnDocument) {
        self.inner.write().await.columns.push(doc);
    }

    pub async fn put_spatial(&self, doc: CoverageDocument) {
        self.inner.write().await.spatial.push(doc);
    }

    pub async fn put_temporal(&self, doc: CoverageDocument) {
        self.inner.write().await.temporal.push(doc);
    }
}

/// A stored document viewed uniformly for filtering and scoring.
struct DocView<'a> {
    source: HitSource,
    ranges: Vec<Shape>,
    column: Option<&'a ColumnDocument>,
    metadata: Option<&'a Value>,
}

impl DocView<'_> {
    fn field_matches(&self, field: &str, value: &str) -> bool {
        match (field, self.column) {
            ("dataset_id", _) => self.source.dataset_id() == value,
            ("name" | "name.raw", Some(c)) => c.name == value,
            ("structural_type", Some(c)) => c.structural_type == value,
            ("semantic_types", Some(c)) => c.semantic_types.iter().any(|t| t == value),
            _ => self
                .metadata
                .and_then(|m| m.get(field))
                .map(|v| json_matches(v, value))
                .unwrap_or(false),
        }
    }

    fn matches(&self, filter: &Filter) -> bool {
        match filter {
            Filter::DatasetId(id) => self.source.dataset_id() == id,
            Filter::Term { field, value } => self.field_matches(field, value),
            Filter::FuzzyName(name) => self
                .column
                .map(|c| strsim::levenshtein(&c.name, name) <= auto_fuzziness(name))
                .unwrap_or(false),
        }
    }

    fn matches_clause(&self, clause: &Value) -> bool {
        let Some(term) = term_clause(clause) else {
            return true;
        };
        term.iter().all(|(field, v)| {
            let wanted = v.get("value").unwrap_or(v);
            match wanted.as_str() {
                Some(s) => self.field_matches(field, s),
                None => self.field_matches(field, &wanted.to_string()),
            }
        })
    }

    fn score(&self, should: &[Should]) -> Option<f64> {
        let mut total = 0.0;
        let mut matched = false;
        for clause in should {
            match clause {
                Should::Overlap(o) => {
                    for stored in &self.ranges {
                        if let Some(extent) = o.shape.overlap(stored) {
                            total += extent / o.coverage;
                            matched = true;
                        }
                    }
                }
                Should::ColumnBoost(b) => {
                    if let HitSource::Column { dataset_id, name, .. } = &self.source {
                        if *dataset_id == b.dataset_id && *name == b.column_name {
                            total += b.boost;
                            matched = true;
                        }
                    }
                }
            }
        }
        matched.then_some(total)
    }

    /// `score_mode: sum` over matching weight functions; 1 when none match.
    fn function_factor(&self, functions: &[Value]) -> f64 {
        let weights: Vec<f64> = functions
            .iter()
            .filter(|f| f.get("filter").map(|c| self.matches_clause(c)).unwrap_or(true))
            .filter_map(|f| f.get("weight").and_then(|w| w.as_f64()))
            .collect();
        if weights.is_empty() {
            1.0
        } else {
            weights.iter().sum()
        }
    }
}

/// Only `term` clauses are evaluated locally; anything else admits every document.
fn term_clause(clause: &Value) -> Option<&serde_json::Map<String, Value>> {
    clause.get("term").and_then(|t| t.as_object())
}

fn json_matches(v: &Value, wanted: &str) -> bool {
    match v {
        Value::String(s) => s == wanted,
        Value::Array(items) => items.iter().any(|i| json_matches(i, wanted)),
        other => other.to_string() == wanted,
    }
}

/// Elasticsearch `AUTO` fuzziness for a term of this length.
fn auto_fuzziness(term: &str) -> usize {
    match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

impl Inner {
    fn views(&self, index: IndexName) -> Vec<DocView<'_>> {
        match index {
            IndexName::Columns => self
                .columns
                .iter()
                .map(|c| DocView {
                    source: HitSource::Column {
                        dataset_id: c.dataset_id.clone(),
                        name: c.name.clone(),
                        index: c.index,
                    },
                    ranges: c.coverage.iter().copied().map(Shape::Interval).collect(),
                    column: Some(c),
                    metadata: self.datasets.get(&c.dataset_id),
                })
                .collect(),
            IndexName::SpatialCoverage | IndexName::TemporalCoverage => {
                let docs = if index == IndexName::SpatialCoverage {
                    &self.spatial
                } else {
                    &self.temporal
                };
                docs.iter()
                    .map(|d| DocView {
                        source: HitSource::Coverage {
                            dataset_id: d.dataset_id.clone(),
                            column_names: d.column_names.clone(),
                            column_indexes: d.column_indexes.clone(),
                            temporal_resolution: d.temporal_resolution.clone(),
                        },
                        ranges: d.ranges.clone(),
                        column: None,
                        metadata: self.datasets.get(&d.dataset_id),
                    })
                    .collect()
            }
        }
    }
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredDocument>, IndexError> {
        for clause in request.sup_filters.iter().filter(|c| term_clause(c).is_none()) {
            warn!(%clause, "in-memory index cannot evaluate supplementary filter, ignoring it");
        }
        let inner = self.inner.read().await;
        let mut scored: Vec<ScoredDocument> = inner
            .views(request.index)
            .into_iter()
            .filter(|doc| request.filter.iter().all(|f| doc.matches(f)))
            .filter(|doc| !request.must_not.iter().any(|f| doc.matches(f)))
            .filter(|doc| request.sup_filters.iter().all(|c| doc.matches_clause(c)))
            .filter_map(|doc| {
                let score = doc.score(&request.should)? * doc.function_factor(&request.sup_functions);
                Some(ScoredDocument {
                    score,
                    source: doc.source,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(request.size);
        Ok(scored)
    }

    async fn dataset_metadata(&self, dataset_id: &str) -> Result<Value, IndexError> {
        self.inner
            .read()
            .await
            .datasets
            .get(dataset_id)
            .cloned()
            .ok_or_else(|| IndexError::NotFound(dataset_id.to_string()))
    }
}
