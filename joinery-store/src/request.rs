//! Typed join query model and its Elasticsearch rendering.
//!
//! Builders produce a [`SearchRequest`]; backends either render it with
//! [`SearchRequest::body`] or evaluate it directly.

use joinery_types::{Envelope, Interval};
use serde_json::{json, Value};

use crate::JOIN_RESULT_SOURCE_FIELDS;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexName {
    /// One document per catalog column, with nested `coverage` ranges.
    Columns,
    /// One document per dataset-level spatial coverage, nested `ranges`.
    SpatialCoverage,
    /// One document per dataset-level temporal coverage, nested `ranges`.
    TemporalCoverage,
}

impl IndexName {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexName::Columns => "columns",
            IndexName::SpatialCoverage => "spatial_coverage",
            IndexName::TemporalCoverage => "temporal_coverage",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    DatasetId(String),
    Term { field: String, value: String },
    /// Edit-distance match on the raw column name.
    FuzzyName(String),
}

impl Filter {
    fn clause(&self) -> Value {
        match self {
            Filter::DatasetId(id) => json!({"term": {"dataset_id": id}}),
            Filter::Term { field, value } => json!({"term": {field.as_str(): value}}),
            Filter::FuzzyName(name) => json!({"fuzzy": {"name.raw": name}}),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Interval(Interval),
    Envelope(Envelope),
}

impl Shape {
    /// Overlap extent between a query shape and a stored shape of the same kind.
    pub fn overlap(&self, stored: &Shape) -> Option<f64> {
        match (self, stored) {
            (Shape::Interval(q), Shape::Interval(d)) => q.overlap_width(d),
            (Shape::Envelope(q), Shape::Envelope(d)) => q.overlap_area(d),
            _ => None,
        }
    }
}

/// One input range: matches nested ranges that intersect it and scores each by
/// `overlap / coverage`, summed over the matching nested documents.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlapClause {
    pub path: &'static str,
    pub shape: Shape,
    pub coverage: f64,
}

impl OverlapClause {
    fn clause(&self, position: usize, inner_hits: usize) -> Value {
        let (query, script) = match &self.shape {
            Shape::Interval(r) => (
                json!({
                    "range": {
                        format!("{}.range", self.path): {
                            "gte": r.lo,
                            "lte": r.hi,
                            "relation": "intersects"
                        }
                    }
                }),
                json!({
                    "lang": "painless",
                    "params": {"gte": r.lo, "lte": r.hi, "coverage": self.coverage},
                    "source": format!(
                        "double start = Math.max(params.gte, doc['{p}.gte'].value);\n\
                         double end = Math.min(params.lte, doc['{p}.lte'].value);\n\
                         return (end - start + 1) / params.coverage;\n",
                        p = self.path
                    )
                }),
            ),
            Shape::Envelope(e) => (
                json!({
                    "geo_shape": {
                        format!("{}.range", self.path): {
                            "shape": {"type": "envelope", "coordinates": e.coordinates()},
                            "relation": "intersects"
                        }
                    }
                }),
                json!({
                    "lang": "painless",
                    "params": {
                        "min_lon": e.min_lon,
                        "max_lat": e.max_lat,
                        "max_lon": e.max_lon,
                        "min_lat": e.min_lat,
                        "coverage": self.coverage
                    },
                    "source": format!(
                        "double n_min_lon = Math.max(doc['{p}.min_lon'].value, params.min_lon);\n\
                         double n_max_lat = Math.min(doc['{p}.max_lat'].value, params.max_lat);\n\
                         double n_max_lon = Math.min(doc['{p}.max_lon'].value, params.max_lon);\n\
                         double n_min_lat = Math.max(doc['{p}.min_lat'].value, params.min_lat);\n\
                         return ((n_max_lon - n_min_lon) * (n_max_lat - n_min_lat)) / params.coverage;\n",
                        p = self.path
                    )
                }),
            ),
        };
        json!({
            "nested": {
                "path": self.path,
                "query": {
                    "function_score": {
                        "query": query,
                        "script_score": {"script": script},
                        "boost_mode": "replace"
                    }
                },
                "inner_hits": {
                    "_source": false,
                    "size": inner_hits,
                    "name": format!("range-{position}")
                },
                "score_mode": "sum"
            }
        })
    }
}

/// Constant score for a specific catalog column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnBoost {
    pub dataset_id: String,
    pub column_name: String,
    pub boost: f64,
}

impl ColumnBoost {
    fn clause(&self) -> Value {
        json!({
            "constant_score": {
                "filter": {
                    "bool": {
                        "must": [
                            {"term": {"dataset_id": self.dataset_id}},
                            {"term": {"name.raw": self.column_name}}
                        ]
                    }
                },
                "boost": self.boost
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Should {
    Overlap(OverlapClause),
    ColumnBoost(ColumnBoost),
}

/// A scored join query: at least one `should` clause must match, its score is the sum
/// of matching clauses, multiplied by the sum of the supplementary functions.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
    pub index: IndexName,
    pub filter: Vec<Filter>,
    pub must_not: Vec<Filter>,
    pub should: Vec<Should>,
    /// Caller clauses merged into `filter` verbatim.
    pub sup_filters: Vec<Value>,
    /// Caller score functions merged verbatim.
    pub sup_functions: Vec<Value>,
    pub size: usize,
    pub inner_hits: usize,
}

impl SearchRequest {
    pub fn new(index: IndexName, size: usize) -> Self {
        Self {
            index,
            filter: Vec::new(),
            must_not: Vec::new(),
            should: Vec::new(),
            sup_filters: Vec::new(),
            sup_functions: Vec::new(),
            size,
            inner_hits: 100,
        }
    }

    /// Elasticsearch `_search` body.
    pub fn body(&self) -> Value {
        let mut filter: Vec<Value> = self.sup_filters.clone();
        filter.extend(self.filter.iter().map(Filter::clause));
        let must_not: Vec<Value> = self.must_not.iter().map(Filter::clause).collect();
        let should: Vec<Value> = self
            .should
            .iter()
            .enumerate()
            .map(|(i, s)| match s {
                Should::Overlap(o) => o.clause(i, self.inner_hits),
                Should::ColumnBoost(b) => b.clause(),
            })
            .collect();

        json!({
            "_source": {"includes": JOIN_RESULT_SOURCE_FIELDS},
            "query": {
                "function_score": {
                    "query": {
                        "bool": {
                            "filter": filter,
                            "should": should,
                            "must_not": must_not,
                            "minimum_should_match": 1
                        }
                    },
                    "functions": self.sup_functions,
                    "score_mode": "sum",
                    "boost_mode": "multiply"
                }
            }
        })
    }
}
