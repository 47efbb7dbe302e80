//! Shared data model for join discovery: the input profile, column groups and their
//! coverage, index hits, and the proposals handed back to callers.

pub mod coverage;
pub mod error;
pub mod hit;
pub mod profile;
pub mod resolution;

pub use coverage::{
    group_entries, ColumnGroup, CoverageDescriptor, CoverageMap, Envelope, GroupEntry, Interval, NumericKind, SketchMap,
};
pub use error::DiscoveryError;
pub use hit::{AugmentationProposal, HitSource, JoinSpec, SearchHit, SketchMatch};
pub use profile::{Column, DataProfile, Sketch, SpatialCoverage, TemporalCoverage};
pub use resolution::ResolutionOrder;

/// Semantic/structural type tags emitted by the profiler.
pub mod schema_types {
    pub const ID: &str = "http://schema.org/identifier";
    pub const INTEGER: &str = "http://schema.org/Integer";
    pub const DATE_TIME: &str = "http://schema.org/DateTime";
}

/// Row identifier column added by D3M tooling; never a join key.
pub const D3M_INDEX: &str = "d3mIndex";
