use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::join_all;
use joinery_store::SearchIndex;
use joinery_types::{AugmentationProposal, DataProfile, DiscoveryError, JoinSpec, ResolutionOrder, SearchHit};
use tracing::{debug, warn};

/// Ranked proposals plus how many hits were dropped on the way.
#[derive(Debug, Default)]
pub struct Merged {
    pub proposals: Vec<AugmentationProposal>,
    pub dropped: usize,
}

/// Rank every modality's hits together and turn each into a join proposal.
///
/// Hits whose dataset record cannot be fetched (stale id, lookup failure, timeout)
/// are dropped individually. Proposals are not deduplicated: the same dataset may be
/// proposed once per input column group that matched it.
pub async fn merge_and_rank(
    mut hits: Vec<SearchHit>,
    profile: &DataProfile,
    index: &dyn SearchIndex,
    resolutions: &ResolutionOrder,
    lookup_timeout: Duration,
) -> Result<Merged, DiscoveryError> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut dataset_ids: Vec<&str> = Vec::new();
    for hit in &hits {
        let id = hit.source.dataset_id();
        if !dataset_ids.contains(&id) {
            dataset_ids.push(id);
        }
    }
    let lookups = join_all(dataset_ids.iter().map(|id| async move {
        let outcome = match tokio::time::timeout(lookup_timeout, index.dataset_metadata(id)).await {
            Ok(result) => result.map_err(DiscoveryError::from),
            Err(_) => Err(DiscoveryError::Timeout {
                service: "dataset lookup".into(),
                after_ms: lookup_timeout.as_millis() as u64,
            }),
        };
        (*id, outcome)
    }))
    .await;
    let metadata: HashMap<&str, Result<serde_json::Value, DiscoveryError>> = lookups.into_iter().collect();

    let mut merged = Merged::default();
    for hit in &hits {
        let meta = match metadata.get(hit.source.dataset_id()) {
            Some(Ok(meta)) => meta.clone(),
            Some(Err(DiscoveryError::DatasetNotFound(id))) => {
                debug!(dataset_id = %id, "dropping proposal for dataset missing from catalog");
                merged.dropped += 1;
                continue;
            }
            Some(Err(e)) => {
                warn!(dataset_id = hit.source.dataset_id(), error = %e, "dropping proposal, metadata lookup failed");
                merged.dropped += 1;
                continue;
            }
            None => {
                return Err(DiscoveryError::InternalInconsistency(format!(
                    "no metadata lookup issued for {}",
                    hit.source.dataset_id()
                )))
            }
        };
        merged.proposals.push(proposal(hit, meta, profile, resolutions)?);
    }
    Ok(merged)
}

fn proposal(
    hit: &SearchHit,
    metadata: serde_json::Value,
    profile: &DataProfile,
    resolutions: &ResolutionOrder,
) -> Result<AugmentationProposal, DiscoveryError> {
    let left_names = hit
        .companion
        .indexes()
        .iter()
        .map(|&i| {
            profile.column_name(i).map(str::to_owned).ok_or_else(|| {
                DiscoveryError::InternalInconsistency(format!("companion column {i} is not in the profile"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let temporal_resolution = match (hit.companion_resolution.as_deref(), hit.source.temporal_resolution()) {
        (Some(left), Some(right)) => {
            let resolved = resolutions.coarser(left, right);
            if resolved.is_none() {
                warn!(left, right, "temporal resolution outside the configured vocabulary");
            }
            resolved.map(str::to_owned)
        }
        _ => None,
    };

    Ok(AugmentationProposal {
        id: hit.source.dataset_id().to_string(),
        score: hit.score,
        metadata,
        augmentation: JoinSpec {
            join_type: "join".into(),
            left_columns: vec![hit.companion.indexes().to_vec()],
            right_columns: vec![hit.source.right_columns()],
            left_columns_names: vec![left_names],
            right_columns_names: vec![hit.source.right_names()],
            temporal_resolution,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use joinery_store::InMemoryIndex;
    use joinery_types::{Column, ColumnGroup, HitSource};
    use serde_json::json;

    fn profile() -> DataProfile {
        DataProfile {
            columns: ["id", "date", "lat", "lon"]
                .into_iter()
                .map(|name| Column {
                    name: name.into(),
                    ..Column::default()
                })
                .collect(),
            ..DataProfile::default()
        }
    }

    fn column_hit(dataset_id: &str, score: f64) -> SearchHit {
        SearchHit {
            score,
            source: HitSource::Column {
                dataset_id: dataset_id.into(),
                name: "key".into(),
                index: 4,
            },
            companion: ColumnGroup::single(0),
            companion_resolution: None,
        }
    }

    fn temporal_hit(dataset_id: &str, score: f64, left: &str, right: &str) -> SearchHit {
        SearchHit {
            score,
            source: HitSource::Coverage {
                dataset_id: dataset_id.into(),
                column_names: vec!["when".into()],
                column_indexes: vec![2],
                temporal_resolution: Some(right.into()),
            },
            companion: ColumnGroup::single(1),
            companion_resolution: Some(left.into()),
        }
    }

    async fn catalog(ids: &[&str]) -> InMemoryIndex {
        let index = InMemoryIndex::new();
        for id in ids {
            index.put_dataset(id, json!({"id": id})).await;
        }
        index
    }

    #[tokio::test]
    async fn ranks_globally_and_builds_join_specs() {
        let index = catalog(&["a", "b", "c"]).await;
        let hits = vec![
            column_hit("a", 0.2),
            temporal_hit("b", 0.9, "day", "month"),
            SearchHit {
                score: 0.5,
                source: HitSource::Coverage {
                    dataset_id: "c".into(),
                    column_names: vec!["y".into(), "x".into()],
                    column_indexes: vec![7, 8],
                    temporal_resolution: None,
                },
                companion: ColumnGroup::new(vec![2, 3]).unwrap(),
                companion_resolution: None,
            },
        ];
        let merged = merge_and_rank(hits, &profile(), &index, &ResolutionOrder::default(), Duration::from_secs(1))
            .await
            .unwrap();

        let ids: Vec<&str> = merged.proposals.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(merged.dropped, 0);

        let temporal = &merged.proposals[0].augmentation;
        assert_eq!(temporal.temporal_resolution.as_deref(), Some("month"));
        assert_eq!(temporal.left_columns_names, vec![vec!["date".to_string()]]);

        let spatial = &merged.proposals[1].augmentation;
        assert_eq!(spatial.left_columns, vec![vec![2, 3]]);
        assert_eq!(spatial.right_columns, vec![vec![7, 8]]);
        assert_eq!(spatial.right_columns_names, vec![vec!["y".to_string(), "x".to_string()]]);
        assert_eq!(spatial.temporal_resolution, None);

        assert_eq!(merged.proposals[2].augmentation.right_columns, vec![vec![4]]);
        assert_eq!(merged.proposals[2].metadata, json!({"id": "a"}));
    }

    #[tokio::test]
    async fn stale_dataset_drops_one_proposal() {
        let index = catalog(&["a", "b"]).await;
        let hits = vec![column_hit("a", 0.3), column_hit("gone", 0.5), column_hit("b", 0.1)];
        let merged = merge_and_rank(hits, &profile(), &index, &ResolutionOrder::default(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(merged.proposals.len(), 2);
        assert_eq!(merged.dropped, 1);
    }

    #[tokio::test]
    async fn same_dataset_is_not_collapsed() {
        let index = catalog(&["a"]).await;
        let mut second = column_hit("a", 0.4);
        second.companion = ColumnGroup::single(1);
        let merged = merge_and_rank(
            vec![column_hit("a", 0.6), second],
            &profile(),
            &index,
            &ResolutionOrder::default(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(merged.proposals.len(), 2);
        assert_eq!(merged.proposals[1].augmentation.left_columns, vec![vec![1]]);
    }

    #[tokio::test]
    async fn unknown_resolution_is_omitted() {
        let index = catalog(&["a"]).await;
        let merged = merge_and_rank(
            vec![temporal_hit("a", 1.0, "fortnight", "day")],
            &profile(),
            &index,
            &ResolutionOrder::default(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(merged.proposals[0].augmentation.temporal_resolution, None);
    }

    #[tokio::test]
    async fn companion_outside_profile_is_inconsistent() {
        let index = catalog(&["a"]).await;
        let mut hit = column_hit("a", 1.0);
        hit.companion = ColumnGroup::single(99);
        let err = merge_and_rank(vec![hit], &profile(), &index, &ResolutionOrder::default(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::InternalInconsistency(_)));
    }
}
