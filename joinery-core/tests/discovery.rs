use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use joinery_core::{DiscoveryConfig, DiscoveryRequest, JoinDiscovery};
use joinery_sketch::{SketchError, SketchService, StaticSketchService};
use joinery_store::{
    ColumnDocument, CoverageDocument, IndexError, InMemoryIndex, ScoredDocument, SearchIndex, SearchRequest, Shape,
};
use joinery_types::profile::{EnvelopeEntry, RangeEntry};
use joinery_types::{
    schema_types, Column, DataProfile, DiscoveryError, Envelope, Interval, Sketch, SketchMatch, SpatialCoverage,
    TemporalCoverage,
};
use serde_json::json;

const CITY_HASHES: [u64; 3] = [11, 22, 33];

fn profile() -> DataProfile {
    DataProfile {
        columns: vec![
            Column {
                name: "count".into(),
                structural_type: schema_types::INTEGER.into(),
                coverage: Some(vec![RangeEntry::new(0.0, 10.0)]),
                ..Column::default()
            },
            Column {
                name: "date".into(),
                structural_type: "http://schema.org/Text".into(),
                semantic_types: vec![schema_types::DATE_TIME.into()],
                ..Column::default()
            },
            Column {
                name: "lat".into(),
                structural_type: "http://schema.org/Float".into(),
                ..Column::default()
            },
            Column {
                name: "lon".into(),
                structural_type: "http://schema.org/Float".into(),
                ..Column::default()
            },
            Column {
                name: "city".into(),
                structural_type: "http://schema.org/Text".into(),
                sketch: Some(Sketch {
                    n_permutations: 3,
                    hash_values: CITY_HASHES.to_vec(),
                    cardinality: 40,
                }),
                ..Column::default()
            },
        ],
        spatial_coverage: vec![SpatialCoverage {
            column_indexes: vec![2, 3],
            ranges: Some(vec![EnvelopeEntry::new([[0.0, 2.0], [2.0, 0.0]])]),
            geohashes4: None,
        }],
        temporal_coverage: vec![TemporalCoverage {
            column_indexes: vec![1],
            ranges: vec![RangeEntry::new(0.0, 99.0)],
            temporal_resolution: "day".into(),
        }],
    }
}

async fn catalog() -> InMemoryIndex {
    let index = InMemoryIndex::new();
    for (id, columns) in [
        ("stats", json!([{"name": "count"}])),
        ("weather", json!([{"name": "day"}, {"name": "rain"}])),
        ("parcels", json!([{"name": "y"}, {"name": "x"}])),
        ("places", json!([{"name": "id"}, {"name": "city_name"}])),
    ] {
        index.put_dataset(id, json!({"name": id, "columns": columns})).await;
    }
    index
        .put_column(ColumnDocument {
            dataset_id: "stats".into(),
            name: "count".into(),
            index: 0,
            structural_type: schema_types::INTEGER.into(),
            semantic_types: Vec::new(),
            coverage: vec![Interval::new(5.0, 15.0)],
        })
        .await;
    index
        .put_temporal(CoverageDocument {
            dataset_id: "weather".into(),
            column_names: vec!["day".into()],
            column_indexes: vec![0],
            ranges: vec![Shape::Interval(Interval::new(50.0, 149.0))],
            temporal_resolution: Some("month".into()),
        })
        .await;
    index
        .put_spatial(CoverageDocument {
            dataset_id: "parcels".into(),
            column_names: vec!["y".into(), "x".into()],
            column_indexes: vec![0, 1],
            ranges: vec![Shape::Envelope(Envelope::from_coordinates([[1.0, 3.0], [3.0, 1.0]]))],
            temporal_resolution: None,
        })
        .await;
    index
}

fn sketches() -> StaticSketchService {
    StaticSketchService::new().with_answer(CITY_HASHES.to_vec(), vec![SketchMatch::new("places", "city_name", 0.83)])
}

fn engine(index: Arc<dyn SearchIndex>, sketches: Arc<dyn SketchService>) -> JoinDiscovery {
    JoinDiscovery::new(index, sketches, DiscoveryConfig::default())
}

#[tokio::test]
async fn proposes_joins_across_all_modalities() {
    let discovery = engine(Arc::new(catalog().await), Arc::new(sketches()));
    let outcome = discovery.discover(&DiscoveryRequest::new(profile())).await.unwrap();

    let ranked: Vec<(&str, f64)> = outcome.results.iter().map(|p| (p.id.as_str(), p.score)).collect();
    assert_eq!(ranked.len(), 4);
    assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1), "not sorted: {ranked:?}");
    assert_eq!(ranked[0], ("places", 0.83));
    assert_eq!(outcome.failed_subqueries, 0);
    assert_eq!(outcome.dropped_proposals, 0);

    let by_id = |id: &str| outcome.results.iter().find(|p| p.id == id).unwrap();

    let stats = by_id("stats");
    assert!((stats.score - 6.0 / 11.0).abs() < 1e-12);
    assert_eq!(stats.augmentation.left_columns_names, vec![vec!["count".to_string()]]);

    let weather = by_id("weather");
    assert_eq!(weather.augmentation.temporal_resolution.as_deref(), Some("month"));
    assert!((weather.score - 0.5).abs() < 1e-12);

    let parcels = by_id("parcels");
    assert_eq!(parcels.augmentation.left_columns, vec![vec![2, 3]]);
    assert_eq!(parcels.augmentation.right_columns, vec![vec![0, 1]]);

    let places = by_id("places");
    assert_eq!(places.augmentation.right_columns, vec![vec![1]]);
    assert_eq!(places.metadata["name"], "places");
}

#[tokio::test]
async fn excluded_datasets_never_appear() {
    let discovery = engine(Arc::new(catalog().await), Arc::new(sketches()));
    let request = DiscoveryRequest {
        ignore_datasets: vec!["places".into(), "weather".into()],
        ..DiscoveryRequest::new(profile())
    };
    let outcome = discovery.discover(&request).await.unwrap();
    let ids: Vec<&str> = outcome.results.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&"places") && !ids.contains(&"weather"));
}

#[tokio::test]
async fn target_dataset_restricts_every_modality() {
    let discovery = engine(Arc::new(catalog().await), Arc::new(sketches()));
    let request = DiscoveryRequest {
        dataset_id: Some("places".into()),
        ..DiscoveryRequest::new(profile())
    };
    let outcome = discovery.discover(&request).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].id, "places");
}

#[tokio::test]
async fn stale_catalog_entry_drops_exactly_one_proposal() {
    let index = catalog().await;
    index.forget_dataset("stats").await;
    let discovery = engine(Arc::new(index), Arc::new(sketches()));
    let outcome = discovery.discover(&DiscoveryRequest::new(profile())).await.unwrap();
    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.dropped_proposals, 1);
    assert!(outcome.results.iter().all(|p| p.id != "stats"));
}

#[tokio::test]
async fn column_scope_limits_the_search() {
    let discovery = engine(Arc::new(catalog().await), Arc::new(sketches()));
    let request = DiscoveryRequest {
        column_scope: vec![0],
        ..DiscoveryRequest::new(profile())
    };
    let outcome = discovery.discover(&request).await.unwrap();
    let ids: Vec<&str> = outcome.results.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["stats"]);
}

#[tokio::test]
async fn caller_boosts_route_textual_matches_through_the_index() {
    let index = catalog().await;
    index
        .put_column(ColumnDocument {
            dataset_id: "places".into(),
            name: "city_name".into(),
            index: 1,
            structural_type: "http://schema.org/Text".into(),
            semantic_types: Vec::new(),
            coverage: Vec::new(),
        })
        .await;
    let discovery = engine(Arc::new(index), Arc::new(sketches()));
    let request = DiscoveryRequest {
        column_scope: vec![4],
        query_sup_functions: vec![json!({"weight": 3.0})],
        ..DiscoveryRequest::new(profile())
    };
    let outcome = discovery.discover(&request).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert!((outcome.results[0].score - 0.83 * 3.0).abs() < 1e-12);
}

struct BrokenSketches;

#[async_trait]
impl SketchService for BrokenSketches {
    async fn query(&self, _sketch: &Sketch) -> Result<Vec<SketchMatch>, SketchError> {
        Err(SketchError {
            message: "connection refused".into(),
        })
    }
}

#[tokio::test]
async fn failing_sketch_service_only_loses_textual_matches() {
    let discovery = engine(Arc::new(catalog().await), Arc::new(BrokenSketches));
    let outcome = discovery.discover(&DiscoveryRequest::new(profile())).await.unwrap();
    assert_eq!(outcome.failed_subqueries, 1);
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.results.iter().all(|p| p.id != "places"));
}

/// Delegates lookups but never answers searches in time.
struct StalledIndex(InMemoryIndex);

#[async_trait]
impl SearchIndex for StalledIndex {
    async fn search(&self, _request: &SearchRequest) -> Result<Vec<ScoredDocument>, IndexError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn dataset_metadata(&self, dataset_id: &str) -> Result<serde_json::Value, IndexError> {
        self.0.dataset_metadata(dataset_id).await
    }
}

#[tokio::test]
async fn slow_index_times_out_per_subquery() {
    let config = DiscoveryConfig {
        query_timeout_ms: 20,
        ..DiscoveryConfig::default()
    };
    let discovery = JoinDiscovery::new(Arc::new(StalledIndex(catalog().await)), Arc::new(sketches()), config);
    let outcome = discovery.discover(&DiscoveryRequest::new(profile())).await.unwrap();
    // Numerical, spatial and temporal time out; the textual path only uses lookups.
    assert_eq!(outcome.failed_subqueries, 3);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].id, "places");
}

#[tokio::test]
async fn cancellation_abandons_the_request() {
    let discovery = engine(Arc::new(StalledIndex(catalog().await)), Arc::new(sketches()));
    let outcome = discovery
        .discover_until(&DiscoveryRequest::new(profile()), tokio::time::sleep(Duration::from_millis(20)))
        .await;
    assert!(outcome.is_none());
}

#[tokio::test]
async fn malformed_profile_is_rejected() {
    let mut bad = profile();
    bad.temporal_coverage[0].column_indexes = vec![17];
    let discovery = engine(Arc::new(catalog().await), Arc::new(sketches()));
    let err = discovery.discover(&DiscoveryRequest::new(bad)).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::MalformedProfile(_)));
}

#[tokio::test]
async fn request_deserializes_with_defaults() {
    let request: DiscoveryRequest = serde_json::from_value(json!({
        "profile": {"columns": [{"name": "a", "structural_type": "http://schema.org/Integer"}]},
        "ignore_datasets": ["x"]
    }))
    .unwrap();
    assert_eq!(request.ignore_datasets, vec!["x".to_string()]);
    assert!(request.dataset_id.is_none());
    assert!(request.column_scope.is_empty());
}
