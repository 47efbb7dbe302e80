use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture, FutureExt};
use joinery_coverage::{extract_coverage, extract_sketches};
use joinery_query::{numerical_join, spatial_join, temporal_join, textual_join, QueryOptions};
use joinery_sketch::{HttpSketchClient, NullSketchService, SketchService};
use joinery_store::{ElasticsearchIndex, NullIndex, ScoredDocument, SearchIndex};
use joinery_types::{AugmentationProposal, ColumnGroup, CoverageDescriptor, DataProfile, DiscoveryError, SearchHit};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod config;
pub use config::DiscoveryConfig;

pub mod merge;
pub use merge::{merge_and_rank, Merged};

/// One discovery call: the input profile plus optional restrictions.
///
/// Every optional field defaults to "no restriction".
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DiscoveryRequest {
    pub profile: DataProfile,
    /// Only propose joins with this catalog dataset.
    pub dataset_id: Option<String>,
    pub ignore_datasets: Vec<String>,
    pub query_sup_functions: Vec<serde_json::Value>,
    pub query_sup_filters: Vec<serde_json::Value>,
    /// Input column positions to search from; empty means all.
    pub column_scope: Vec<usize>,
}

impl DiscoveryRequest {
    pub fn new(profile: DataProfile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DiscoveryOutcome {
    pub results: Vec<AugmentationProposal>,
    /// Sub-queries that failed or timed out and contributed nothing.
    pub failed_subqueries: usize,
    /// Hits dropped because their dataset record could not be fetched.
    pub dropped_proposals: usize,
}

type SubQuery<'a> = BoxFuture<'a, Result<Vec<SearchHit>, DiscoveryError>>;

/// Wires the catalog and the sketch service together for join discovery.
pub struct JoinDiscovery {
    pub index: Arc<dyn SearchIndex>,
    pub sketches: Arc<dyn SketchService>,
    pub config: DiscoveryConfig,
}

impl JoinDiscovery {
    pub fn new(index: Arc<dyn SearchIndex>, sketches: Arc<dyn SketchService>, config: DiscoveryConfig) -> Self {
        Self {
            index,
            sketches,
            config,
        }
    }

    /// Connect to the configured backends. A missing URL leaves that backend as a
    /// null implementation that answers with nothing.
    pub fn connect(
        index_url: Option<&str>,
        sketch_url: Option<&str>,
        config: DiscoveryConfig,
    ) -> Result<Self, DiscoveryError> {
        let index: Arc<dyn SearchIndex> = match index_url {
            Some(url) if !url.is_empty() => Arc::new(ElasticsearchIndex::new(url)?),
            _ => {
                warn!("no search index configured; numerical, spatial and temporal joins disabled");
                Arc::new(NullIndex)
            }
        };
        let sketches: Arc<dyn SketchService> = match sketch_url {
            Some(url) if !url.is_empty() => Arc::new(HttpSketchClient::new(url)),
            _ => {
                warn!("no sketch service configured; textual joins disabled");
                Arc::new(NullSketchService)
            }
        };
        Ok(Self::new(index, sketches, config))
    }

    /// Find join candidates for `request.profile`, best first.
    ///
    /// Only an invalid profile or a broken internal invariant fails the call; every
    /// external failure shrinks the result instead. Dropping the returned future
    /// cancels all in-flight sub-queries.
    pub async fn discover(&self, request: &DiscoveryRequest) -> Result<DiscoveryOutcome, DiscoveryError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("discover", %request_id);
        async move {
            let outcome = self.run(request).await;
            match &outcome {
                Ok(o) => info!(
                    results = o.results.len(),
                    failed_subqueries = o.failed_subqueries,
                    dropped_proposals = o.dropped_proposals,
                    "discovery finished"
                ),
                Err(e @ DiscoveryError::InternalInconsistency(_)) => error!(error = %e, "discovery aborted"),
                Err(e) => warn!(error = %e, "discovery rejected"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Like [`discover`](Self::discover), abandoning the request when `cancel`
    /// resolves first. Returns `None` on cancellation.
    pub async fn discover_until<C>(
        &self,
        request: &DiscoveryRequest,
        cancel: C,
    ) -> Option<Result<DiscoveryOutcome, DiscoveryError>>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            outcome = self.discover(request) => Some(outcome),
            _ = cancel => {
                info!("discovery cancelled");
                None
            }
        }
    }

    async fn run(&self, request: &DiscoveryRequest) -> Result<DiscoveryOutcome, DiscoveryError> {
        let profile = &request.profile;
        let coverage = extract_coverage(profile, &request.column_scope)?;
        let sketches = extract_sketches(profile, &request.column_scope);
        let opts = QueryOptions {
            dataset_id: request.dataset_id.clone(),
            ignore_datasets: request.ignore_datasets.clone(),
            sup_functions: request.query_sup_functions.clone(),
            sup_filters: request.query_sup_filters.clone(),
            top_k: self.config.top_k,
            inner_hits: self.config.inner_hits,
            max_sketch_candidates: self.config.max_sketch_candidates,
        };
        debug!(
            coverage_groups = coverage.len(),
            sketched_columns = sketches.len(),
            "dispatching sub-queries"
        );

        let index = self.index.as_ref();
        let opts = &opts;
        let query_timeout = self.config.query_timeout();
        let mut subqueries: Vec<SubQuery<'_>> = Vec::new();

        for (group, descriptor) in coverage.iter() {
            let group = group.clone();
            match descriptor {
                CoverageDescriptor::Spatial { ranges, .. } => {
                    if ranges.is_empty() {
                        continue;
                    }
                    subqueries.push(
                        async move {
                            let docs = bounded("spatial query", query_timeout, spatial_join(index, ranges, opts)).await?;
                            Ok(attach(docs, group, None))
                        }
                        .boxed(),
                    );
                }
                CoverageDescriptor::Temporal {
                    ranges,
                    temporal_resolution,
                } => {
                    subqueries.push(
                        async move {
                            let docs =
                                bounded("temporal query", query_timeout, temporal_join(index, ranges, opts)).await?;
                            Ok(attach(docs, group, Some(temporal_resolution.clone())))
                        }
                        .boxed(),
                    );
                }
                CoverageDescriptor::Numeric { kind, ranges } => {
                    let column_name = match group.indexes() {
                        [single] => profile.column_name(*single),
                        _ => None,
                    }
                    .ok_or_else(|| {
                        DiscoveryError::InternalInconsistency(format!(
                            "numeric coverage attached to column group {:?}",
                            group.indexes()
                        ))
                    })?;
                    let kind = *kind;
                    subqueries.push(
                        async move {
                            let docs = bounded(
                                "numerical query",
                                query_timeout,
                                numerical_join(index, kind, column_name, ranges, opts),
                            )
                            .await?;
                            Ok(attach(docs, group, None))
                        }
                        .boxed(),
                    );
                }
            }
        }

        let sketch_service = self.sketches.as_ref();
        let sketch_timeout = self.config.sketch_timeout();
        for (group, sketch) in sketches.iter() {
            let group = group.clone();
            subqueries.push(
                async move {
                    let matches = bounded("sketch service", sketch_timeout, sketch_service.query(sketch)).await?;
                    let docs = bounded("textual query", query_timeout, textual_join(index, matches, opts)).await?;
                    Ok(attach(docs, group, None))
                }
                .boxed(),
            );
        }

        let total = subqueries.len();
        let mut hits = Vec::new();
        let mut failed_subqueries = 0;
        for result in join_all(subqueries).await {
            match result {
                Ok(found) => hits.extend(found),
                Err(e) => {
                    warn!(error = %e, "sub-query contributed no hits");
                    failed_subqueries += 1;
                }
            }
        }
        debug!(subqueries = total, failed_subqueries, hits = hits.len(), "collected hits");

        let merged = merge_and_rank(
            hits,
            profile,
            index,
            &self.config.temporal_resolutions,
            self.config.metadata_timeout(),
        )
        .await?;

        Ok(DiscoveryOutcome {
            results: merged.proposals,
            failed_subqueries,
            dropped_proposals: merged.dropped,
        })
    }
}

/// One-shot discovery with default configuration.
pub async fn discover_joins(
    index: Arc<dyn SearchIndex>,
    sketches: Arc<dyn SketchService>,
    request: &DiscoveryRequest,
) -> Result<DiscoveryOutcome, DiscoveryError> {
    JoinDiscovery::new(index, sketches, DiscoveryConfig::default())
        .discover(request)
        .await
}

async fn bounded<T, E, F>(service: &str, limit: Duration, fut: F) -> Result<T, DiscoveryError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<DiscoveryError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(DiscoveryError::Timeout {
            service: service.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}

fn attach(docs: Vec<ScoredDocument>, companion: ColumnGroup, resolution: Option<String>) -> Vec<SearchHit> {
    docs.into_iter()
        .map(|doc| SearchHit {
            score: doc.score,
            source: doc.source,
            companion: companion.clone(),
            companion_resolution: resolution.clone(),
        })
        .collect()
}
