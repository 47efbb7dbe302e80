use std::marker::PhantomData;

use joinery_store::{Filter, IndexName, OverlapClause, SearchRequest, Shape, Should};
use joinery_types::{Envelope, Interval};

use crate::QueryOptions;

/// How ranges of one modality are measured and intersected.
pub trait OverlapGeometry {
    type Range: Copy;

    /// Contribution of one input range to the coverage normalizer.
    fn extent(range: &Self::Range) -> f64;

    fn shape(range: &Self::Range) -> Shape;
}

/// Closed 1-D intervals (numeric values, epoch seconds).
pub struct Linear;

impl OverlapGeometry for Linear {
    type Range = Interval;

    fn extent(range: &Interval) -> f64 {
        range.width()
    }

    fn shape(range: &Interval) -> Shape {
        Shape::Interval(*range)
    }
}

/// Lon/lat bounding boxes. Intersection is box overlap, not polygon overlap.
pub struct Planar;

impl OverlapGeometry for Planar {
    type Range = Envelope;

    fn extent(range: &Envelope) -> f64 {
        range.area()
    }

    fn shape(range: &Envelope) -> Shape {
        Shape::Envelope(*range)
    }
}

/// A query matching documents whose nested ranges intersect any of `ranges`.
///
/// Every input range becomes one `should` clause normalized by the total extent of
/// all input ranges, so a document overlapping several disjoint input ranges
/// accumulates their scores.
pub struct RangeOverlapQuery<'a, G: OverlapGeometry> {
    index: IndexName,
    path: &'static str,
    ranges: &'a [G::Range],
    filter: Vec<Filter>,
    _geometry: PhantomData<G>,
}

impl<'a, G: OverlapGeometry> RangeOverlapQuery<'a, G> {
    pub fn new(index: IndexName, path: &'static str, ranges: &'a [G::Range]) -> Self {
        Self {
            index,
            path,
            ranges,
            filter: Vec::new(),
            _geometry: PhantomData,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter.push(filter);
        self
    }

    pub fn coverage(&self) -> f64 {
        self.ranges.iter().map(G::extent).sum()
    }

    pub fn build(self, opts: &QueryOptions) -> SearchRequest {
        let coverage = self.coverage();
        let mut req = opts.base_request(self.index);
        let mut filter = self.filter;
        filter.append(&mut req.filter);
        req.filter = filter;
        req.should = self
            .ranges
            .iter()
            .map(|range| {
                Should::Overlap(OverlapClause {
                    path: self.path,
                    shape: G::shape(range),
                    coverage,
                })
            })
            .collect();
        req
    }
}
