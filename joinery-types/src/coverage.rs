use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::profile::Sketch;
use crate::schema_types;

/// Ordered tuple of column positions that join as one unit.
///
/// Single columns are groups of one; composite spatial/temporal keys list every
/// participating column in the order the profiler declared them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnGroup(Vec<usize>);

impl ColumnGroup {
    pub fn single(index: usize) -> Self {
        Self(vec![index])
    }

    /// Returns `None` for an empty index list.
    pub fn new(indexes: Vec<usize>) -> Option<Self> {
        if indexes.is_empty() {
            None
        } else {
            Some(Self(indexes))
        }
    }

    pub fn indexes(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_composite(&self) -> bool {
        self.0.len() > 1
    }

    /// An empty scope admits every group.
    pub fn within_scope(&self, scope: &[usize]) -> bool {
        scope.is_empty() || self.0.iter().all(|idx| scope.contains(idx))
    }
}

/// Closed interval `[lo, hi]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Inclusive width, `hi - lo + 1`.
    pub fn width(&self) -> f64 {
        self.hi - self.lo + 1.0
    }

    /// Inclusive width of the intersection, or `None` if the intervals are disjoint.
    pub fn overlap_width(&self, other: &Interval) -> Option<f64> {
        if self.lo > other.hi || other.lo > self.hi {
            return None;
        }
        Some(self.hi.min(other.hi) - self.lo.max(other.lo) + 1.0)
    }
}

/// Axis-aligned bounding box in lon/lat.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
    pub min_lat: f64,
}

impl Envelope {
    /// From the GeoJSON-style `[[min_lon, max_lat], [max_lon, min_lat]]` corners.
    pub fn from_coordinates(c: [[f64; 2]; 2]) -> Self {
        Self {
            min_lon: c[0][0],
            max_lat: c[0][1],
            max_lon: c[1][0],
            min_lat: c[1][1],
        }
    }

    pub fn coordinates(&self) -> [[f64; 2]; 2] {
        [[self.min_lon, self.max_lat], [self.max_lon, self.min_lat]]
    }

    pub fn area(&self) -> f64 {
        (self.max_lon - self.min_lon) * (self.max_lat - self.min_lat)
    }

    /// Zero-area boxes and boxes whose min/max corners are swapped (including those
    /// crossing the antimeridian).
    pub fn is_degenerate(&self) -> bool {
        !(self.max_lon > self.min_lon && self.max_lat > self.min_lat)
    }

    /// Area of the overlap rectangle, or `None` if the boxes do not touch.
    pub fn overlap_area(&self, other: &Envelope) -> Option<f64> {
        let min_lon = self.min_lon.max(other.min_lon);
        let max_lon = self.max_lon.min(other.max_lon);
        let min_lat = self.min_lat.max(other.min_lat);
        let max_lat = self.max_lat.min(other.max_lat);
        if min_lon > max_lon || min_lat > max_lat {
            return None;
        }
        Some((max_lon - min_lon) * (max_lat - min_lat))
    }
}

/// How a numeric column is classified when matched against catalog columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericKind {
    Identifier,
    Integer,
    /// Never produced by the coverage extractor, which routes date columns through
    /// temporal blocks. Kept for callers that query the columns index with a
    /// date/time classification; such queries skip the name match.
    DateTime,
}

impl NumericKind {
    /// Index field the classification is filtered on.
    pub fn field(&self) -> &'static str {
        match self {
            NumericKind::Identifier | NumericKind::DateTime => "semantic_types",
            NumericKind::Integer => "structural_type",
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            NumericKind::Identifier => schema_types::ID,
            NumericKind::Integer => schema_types::INTEGER,
            NumericKind::DateTime => schema_types::DATE_TIME,
        }
    }

    /// Date/time columns are matched on values alone, not on column names.
    pub fn matches_on_name(&self) -> bool {
        !matches!(self, NumericKind::DateTime)
    }
}

/// What a column group spans, per modality.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoverageDescriptor {
    Numeric {
        kind: NumericKind,
        ranges: Vec<Interval>,
    },
    Spatial {
        ranges: Vec<Envelope>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        geohashes4: Option<Vec<serde_json::Value>>,
    },
    Temporal {
        ranges: Vec<Interval>,
        temporal_resolution: String,
    },
}

impl CoverageDescriptor {
    pub fn modality(&self) -> &'static str {
        match self {
            CoverageDescriptor::Numeric { .. } => "numeric",
            CoverageDescriptor::Spatial { .. } => "spatial",
            CoverageDescriptor::Temporal { .. } => "temporal",
        }
    }
}

/// Coverage per column group, in the order the profile declares them.
///
/// `IndexMap::insert` on an existing group replaces the value in place, so
/// enumeration order stays tied to the profile.
pub type CoverageMap = IndexMap<ColumnGroup, CoverageDescriptor>;
pub type SketchMap = IndexMap<ColumnGroup, Sketch>;

/// One map entry rendered as `{"columns": [..], ...value}`.
#[derive(Debug, Serialize)]
pub struct GroupEntry<'a, V> {
    pub columns: &'a ColumnGroup,
    #[serde(flatten)]
    pub value: &'a V,
}

/// Group-keyed maps as a JSON-friendly list; column groups are not string keys.
pub fn group_entries<V>(map: &IndexMap<ColumnGroup, V>) -> Vec<GroupEntry<'_, V>> {
    map.iter().map(|(columns, value)| GroupEntry { columns, value }).collect()
}
