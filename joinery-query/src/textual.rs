use futures_util::future::join_all;
use joinery_store::{ColumnBoost, IndexError, IndexName, ScoredDocument, SearchIndex, SearchRequest, Should};
use joinery_types::{HitSource, SketchMatch};
use tracing::{debug, warn};

use crate::QueryOptions;

/// Apply the dataset restriction and exclusions, then cap to the service's top
/// candidates.
pub fn candidate_matches(matches: Vec<SketchMatch>, opts: &QueryOptions) -> Vec<SketchMatch> {
    let mut kept: Vec<SketchMatch> = matches.into_iter().filter(|m| opts.admits(&m.dataset_id)).collect();
    kept.truncate(opts.max_sketch_candidates);
    kept
}

/// One constant-score clause per candidate column, boosted by its sketch score.
pub fn textual_request(matches: &[SketchMatch], opts: &QueryOptions) -> SearchRequest {
    let mut req = opts.base_request(IndexName::Columns);
    req.should = matches
        .iter()
        .map(|m| {
            Should::ColumnBoost(ColumnBoost {
                dataset_id: m.dataset_id.clone(),
                column_name: m.column_name.clone(),
                boost: m.score,
            })
        })
        .collect();
    req
}

/// Turn sketch-service candidates into scored column documents.
///
/// Without supplementary functions or filters the sketch scores are final: each
/// candidate's column position is looked up and its score passed through untouched.
/// Otherwise the candidates are sent through the index so caller clauses can shape
/// the combined score.
pub async fn textual_join(
    index: &dyn SearchIndex,
    matches: Vec<SketchMatch>,
    opts: &QueryOptions,
) -> Result<Vec<ScoredDocument>, IndexError> {
    let matches = candidate_matches(matches, opts);
    if matches.is_empty() {
        return Ok(Vec::new());
    }
    if opts.has_supplementary() {
        return index.search(&textual_request(&matches, opts)).await;
    }
    resolve_positions(index, &matches).await
}

async fn resolve_positions(index: &dyn SearchIndex, matches: &[SketchMatch]) -> Result<Vec<ScoredDocument>, IndexError> {
    let mut per_dataset: Vec<(&str, Vec<&SketchMatch>)> = Vec::new();
    for m in matches {
        match per_dataset.iter().position(|(id, _)| *id == m.dataset_id) {
            Some(i) => per_dataset[i].1.push(m),
            None => per_dataset.push((m.dataset_id.as_str(), vec![m])),
        }
    }

    let lookups = join_all(per_dataset.iter().map(|(dataset_id, group)| async move {
        let names: Vec<String> = group.iter().map(|m| m.column_name.clone()).collect();
        index.column_indexes(dataset_id, &names).await
    }))
    .await;

    let mut out = Vec::with_capacity(matches.len());
    for ((dataset_id, group), lookup) in per_dataset.into_iter().zip(lookups) {
        let positions = match lookup {
            Ok(positions) => positions,
            Err(IndexError::NotFound(_)) => {
                debug!(dataset_id, "sketch candidate dataset missing from catalog");
                continue;
            }
            Err(e) => {
                warn!(dataset_id, error = %e, "skipping sketch candidates, column lookup failed");
                continue;
            }
        };
        for (m, position) in group.into_iter().zip(positions) {
            let Some(column_index) = position else {
                debug!(dataset_id, column = %m.column_name, "sketch candidate column missing from dataset record");
                continue;
            };
            out.push(ScoredDocument {
                score: m.score,
                source: HitSource::Column {
                    dataset_id: m.dataset_id.clone(),
                    name: m.column_name.clone(),
                    index: column_index,
                },
            });
        }
    }
    Ok(out)
}
