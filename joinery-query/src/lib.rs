//! Modality query builders: numerical, spatial, temporal and textual join queries.
//!
//! Each builder is a pure function of its inputs and the caller's [`QueryOptions`];
//! the `*_join` helpers build and run the query against a [`SearchIndex`].

use joinery_store::{Filter, IndexError, IndexName, ScoredDocument, SearchIndex, SearchRequest};
use joinery_types::{Envelope, Interval, NumericKind};
use serde_json::Value;
use tracing::warn;

pub mod geometry;
pub use geometry::{Linear, OverlapGeometry, Planar, RangeOverlapQuery};

pub mod textual;
pub use textual::{candidate_matches, textual_join, textual_request};

/// Documents returned per index query.
pub const TOP_K_SIZE: usize = 50;
/// Inner hits returned per range clause.
pub const INNER_HITS_SIZE: usize = 100;
/// Sketch candidates forwarded into one textual query.
pub const MAX_SKETCH_CANDIDATES: usize = 300;

/// Restrictions and caller clauses shared by every modality in one request.
#[derive(Clone, Debug)]
pub struct QueryOptions {
    /// Only consider this catalog dataset.
    pub dataset_id: Option<String>,
    pub ignore_datasets: Vec<String>,
    pub sup_functions: Vec<Value>,
    pub sup_filters: Vec<Value>,
    pub top_k: usize,
    pub inner_hits: usize,
    pub max_sketch_candidates: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            dataset_id: None,
            ignore_datasets: Vec::new(),
            sup_functions: Vec::new(),
            sup_filters: Vec::new(),
            top_k: TOP_K_SIZE,
            inner_hits: INNER_HITS_SIZE,
            max_sketch_candidates: MAX_SKETCH_CANDIDATES,
        }
    }
}

impl QueryOptions {
    pub fn has_supplementary(&self) -> bool {
        !self.sup_functions.is_empty() || !self.sup_filters.is_empty()
    }

    pub fn admits(&self, dataset_id: &str) -> bool {
        self.dataset_id.as_deref().map_or(true, |only| only == dataset_id)
            && !self.ignore_datasets.iter().any(|d| d == dataset_id)
    }

    /// Empty request carrying the dataset restriction, exclusions and caller clauses.
    pub(crate) fn base_request(&self, index: IndexName) -> SearchRequest {
        let mut req = SearchRequest::new(index, self.top_k);
        req.inner_hits = self.inner_hits;
        req.sup_filters = self.sup_filters.clone();
        req.sup_functions = self.sup_functions.clone();
        if let Some(id) = &self.dataset_id {
            req.filter.push(Filter::DatasetId(id.clone()));
        }
        req.must_not = self
            .ignore_datasets
            .iter()
            .map(|id| Filter::DatasetId(id.clone()))
            .collect();
        req
    }
}

/// Catalog columns of the same classification, with a similar name, whose value
/// ranges overlap the input column's.
pub fn numerical_request(kind: NumericKind, column_name: &str, ranges: &[Interval], opts: &QueryOptions) -> SearchRequest {
    let mut query = RangeOverlapQuery::<Linear>::new(IndexName::Columns, "coverage", ranges).filter(Filter::Term {
        field: kind.field().to_string(),
        value: kind.value().to_string(),
    });
    if kind.matches_on_name() {
        query = query.filter(Filter::FuzzyName(column_name.to_string()));
    }
    query.build(opts)
}

/// Spatial coverage records whose bounding boxes overlap the input envelopes.
///
/// Degenerate envelopes are dropped before the normalizer is computed; `None` when
/// nothing usable is left.
pub fn spatial_request(ranges: &[Envelope], opts: &QueryOptions) -> Option<SearchRequest> {
    let usable: Vec<Envelope> = ranges.iter().copied().filter(|e| !e.is_degenerate()).collect();
    if usable.len() < ranges.len() {
        warn!(dropped = ranges.len() - usable.len(), "ignoring degenerate spatial envelopes");
    }
    if usable.is_empty() {
        return None;
    }
    Some(RangeOverlapQuery::<Planar>::new(IndexName::SpatialCoverage, "ranges", &usable).build(opts))
}

pub fn temporal_request(ranges: &[Interval], opts: &QueryOptions) -> SearchRequest {
    RangeOverlapQuery::<Linear>::new(IndexName::TemporalCoverage, "ranges", ranges).build(opts)
}

pub async fn numerical_join(
    index: &dyn SearchIndex,
    kind: NumericKind,
    column_name: &str,
    ranges: &[Interval],
    opts: &QueryOptions,
) -> Result<Vec<ScoredDocument>, IndexError> {
    if ranges.is_empty() {
        return Ok(Vec::new());
    }
    index.search(&numerical_request(kind, column_name, ranges, opts)).await
}

pub async fn spatial_join(
    index: &dyn SearchIndex,
    ranges: &[Envelope],
    opts: &QueryOptions,
) -> Result<Vec<ScoredDocument>, IndexError> {
    match spatial_request(ranges, opts) {
        Some(req) => index.search(&req).await,
        None => Ok(Vec::new()),
    }
}

pub async fn temporal_join(
    index: &dyn SearchIndex,
    ranges: &[Interval],
    opts: &QueryOptions,
) -> Result<Vec<ScoredDocument>, IndexError> {
    if ranges.is_empty() {
        return Ok(Vec::new());
    }
    index.search(&temporal_request(ranges, opts)).await
}
