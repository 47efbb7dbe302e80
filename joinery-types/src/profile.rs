use serde::{Deserialize, Serialize};

/// Profiler output for the input dataset.
///
/// Field names follow the profiler's JSON document so a profile can be deserialized
/// straight from what the profiler emits.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DataProfile {
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spatial_coverage: Vec<SpatialCoverage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temporal_coverage: Vec<TemporalCoverage>,
}

impl DataProfile {
    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.name.as_str())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub structural_type: String,
    #[serde(default)]
    pub semantic_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Vec<RangeEntry>>,
    #[serde(default, rename = "lazo", skip_serializing_if = "Option::is_none")]
    pub sketch: Option<Sketch>,
}

/// `{"range": {"gte": .., "lte": ..}}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeEntry {
    pub range: Bounds,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub gte: f64,
    pub lte: f64,
}

impl RangeEntry {
    pub fn new(gte: f64, lte: f64) -> Self {
        Self {
            range: Bounds { gte, lte },
        }
    }
}

/// Dataset-level spatial coverage spanning one or more columns (e.g. lat + lon).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpatialCoverage {
    pub column_indexes: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Vec<EnvelopeEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geohashes4: Option<Vec<serde_json::Value>>,
}

/// `{"range": {"type": "envelope", "coordinates": [[min_lon, max_lat], [max_lon, min_lat]]}}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeEntry {
    pub range: EnvelopeShape,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeShape {
    #[serde(default = "envelope_type", rename = "type")]
    pub shape_type: String,
    pub coordinates: [[f64; 2]; 2],
}

fn envelope_type() -> String {
    "envelope".into()
}

impl EnvelopeEntry {
    pub fn new(coordinates: [[f64; 2]; 2]) -> Self {
        Self {
            range: EnvelopeShape {
                shape_type: envelope_type(),
                coordinates,
            },
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TemporalCoverage {
    pub column_indexes: Vec<usize>,
    #[serde(default)]
    pub ranges: Vec<RangeEntry>,
    pub temporal_resolution: String,
}

/// Set-similarity fingerprint of a column's distinct values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sketch {
    pub n_permutations: u32,
    pub hash_values: Vec<u64>,
    pub cardinality: u64,
}
