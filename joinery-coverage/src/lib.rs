use joinery_types::profile::RangeEntry;
use joinery_types::{
    schema_types, ColumnGroup, CoverageDescriptor, CoverageMap, DataProfile, DiscoveryError, Envelope, Interval,
    NumericKind, SketchMap, D3M_INDEX,
};
use tracing::debug;

/// Turn a profile into the coverage each joinable column group spans.
///
/// Enumeration order: single columns in profile order, then spatial blocks, then
/// temporal blocks. `scope` restricts output to groups whose every member is listed;
/// an empty scope keeps everything.
///
/// Textual columns are not handled here; see [`extract_sketches`].
pub fn extract_coverage(profile: &DataProfile, scope: &[usize]) -> Result<CoverageMap, DiscoveryError> {
    let mut out = CoverageMap::new();

    for (column_index, column) in profile.columns.iter().enumerate() {
        let Some(coverage) = &column.coverage else { continue; };
        let group = ColumnGroup::single(column_index);
        if !group.within_scope(scope) || column.name == D3M_INDEX {
            continue;
        }
        let kind = if column.semantic_types.iter().any(|t| t == schema_types::ID) {
            NumericKind::Identifier
        } else if column.structural_type == schema_types::INTEGER {
            NumericKind::Integer
        } else {
            continue;
        };
        let ranges = intervals(coverage, &column.name)?;
        out.insert(group, CoverageDescriptor::Numeric { kind, ranges });
    }

    for spatial in &profile.spatial_coverage {
        let group = composite_group(profile, &spatial.column_indexes, "spatial")?;
        if !group.within_scope(scope) {
            continue;
        }
        let ranges = spatial
            .ranges
            .iter()
            .flatten()
            .map(|entry| Envelope::from_coordinates(entry.range.coordinates))
            .collect();
        out.insert(
            group,
            CoverageDescriptor::Spatial {
                ranges,
                geohashes4: spatial.geohashes4.clone(),
            },
        );
    }

    for temporal in &profile.temporal_coverage {
        let group = composite_group(profile, &temporal.column_indexes, "temporal")?;
        if !group.within_scope(scope) {
            continue;
        }
        let ranges = intervals(&temporal.ranges, "temporal coverage")?;
        out.insert(
            group,
            CoverageDescriptor::Temporal {
                ranges,
                temporal_resolution: temporal.temporal_resolution.clone(),
            },
        );
    }

    debug!(groups = out.len(), "extracted column coverage");
    Ok(out)
}

/// Collect the set-similarity sketch of every single column that carries one.
pub fn extract_sketches(profile: &DataProfile, scope: &[usize]) -> SketchMap {
    let mut out = SketchMap::new();
    for (column_index, column) in profile.columns.iter().enumerate() {
        let Some(sketch) = &column.sketch else { continue; };
        let group = ColumnGroup::single(column_index);
        if group.within_scope(scope) {
            out.insert(group, sketch.clone());
        }
    }
    out
}

fn intervals(entries: &[RangeEntry], owner: &str) -> Result<Vec<Interval>, DiscoveryError> {
    entries
        .iter()
        .map(|entry| {
            let (lo, hi) = (entry.range.gte, entry.range.lte);
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(DiscoveryError::MalformedProfile(format!(
                    "invalid range [{lo}, {hi}] in {owner}"
                )));
            }
            Ok(Interval::new(lo, hi))
        })
        .collect()
}

fn composite_group(profile: &DataProfile, indexes: &[usize], block: &str) -> Result<ColumnGroup, DiscoveryError> {
    if let Some(bad) = indexes.iter().find(|&&idx| idx >= profile.columns.len()) {
        return Err(DiscoveryError::MalformedProfile(format!(
            "{block} coverage references column {bad}, profile has {} columns",
            profile.columns.len()
        )));
    }
    ColumnGroup::new(indexes.to_vec())
        .ok_or_else(|| DiscoveryError::MalformedProfile(format!("{block} coverage lists no columns")))
}
