//! HTTP front for join discovery.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use joinery_core::{DiscoveryOutcome, DiscoveryRequest, JoinDiscovery};
use joinery_types::DiscoveryError;
use serde_json::json;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub discovery: Arc<JoinDiscovery>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/search/join", post(search_join))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub struct ApiError(DiscoveryError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            DiscoveryError::MalformedProfile(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Dropping the connection drops this future, which cancels outstanding sub-queries.
async fn search_join(
    State(state): State<AppState>,
    Json(req): Json<DiscoveryRequest>,
) -> Result<Json<DiscoveryOutcome>, ApiError> {
    state.discovery.discover(&req).await.map(Json).map_err(ApiError)
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use joinery_core::DiscoveryConfig;
    use joinery_sketch::{StaticSketchService, NullSketchService};
    use joinery_store::InMemoryIndex;
    use joinery_types::SketchMatch;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn router() -> Router {
        let index = InMemoryIndex::new();
        index
            .put_dataset("places", json!({"name": "places", "columns": [{"name": "city_name"}]}))
            .await;
        let sketches = StaticSketchService::new().with_answer(vec![1, 2], vec![SketchMatch::new("places", "city_name", 0.7)]);
        app(AppState {
            discovery: Arc::new(JoinDiscovery::new(
                Arc::new(index),
                Arc::new(sketches),
                DiscoveryConfig::default(),
            )),
        })
    }

    async fn post_json(router: Router, body: Value) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::post("/search/join")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn search_join_returns_ranked_results() {
        let body = json!({
            "profile": {"columns": [{
                "name": "city",
                "structural_type": "http://schema.org/Text",
                "lazo": {"n_permutations": 2, "hash_values": [1, 2], "cardinality": 10}
            }]}
        });
        let (status, out) = post_json(router().await, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["results"][0]["id"], "places");
        assert_eq!(out["results"][0]["score"], 0.7);
        assert_eq!(out["results"][0]["augmentation"]["right_columns_names"], json!([["city_name"]]));
        assert_eq!(out["failed_subqueries"], 0);
    }

    #[tokio::test]
    async fn malformed_profile_is_a_bad_request() {
        let body = json!({
            "profile": {
                "columns": [{"name": "t"}],
                "temporal_coverage": [{"column_indexes": [4], "ranges": [], "temporal_resolution": "day"}]
            }
        });
        let (status, out) = post_json(router().await, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(out["error"].as_str().unwrap().contains("4"));
    }

    #[tokio::test]
    async fn healthz_answers() {
        let router = app(AppState {
            discovery: Arc::new(JoinDiscovery::new(
                Arc::new(InMemoryIndex::new()),
                Arc::new(NullSketchService),
                DiscoveryConfig::default(),
            )),
        });
        let response = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
