use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::cluster::{Comparison, GroupId};
use crate::error::ClusterError;
use crate::item::Item;
use crate::service::{ClusterDetail, ClusterService, ClusterSummary, IngestOutcome};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ClusterService>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/posts", post(ingest_post))
        .route("/posts/batch", post(ingest_batch))
        .route("/clusters", get(list_clusters))
        .route("/clusters/{id}", get(cluster_detail))
        .route("/debug/compare", post(debug_compare))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Handler errors. Invalid posts are the caller's fault; anything else is ours.
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<ClusterError>() {
            Some(ClusterError::InvalidInput(field)) => {
                ApiError::BadRequest(format!("missing or empty `{field}`"))
            }
            Some(ClusterError::UnknownGroup(id)) => ApiError::NotFound(format!("cluster {id}")),
            _ => ApiError::Internal(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, format!("not found: {m}")),
            ApiError::Internal(e) => {
                tracing::error!(error = ?e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorBody { error: msg })).into_response()
    }
}

async fn ingest_post(
    State(state): State<AppState>,
    Json(item): Json<Item>,
) -> Result<(StatusCode, Json<IngestOutcome>), ApiError> {
    let outcome = state.service.ingest(item)?;
    let status = match outcome {
        IngestOutcome::Created { .. } => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

#[derive(Serialize)]
struct BatchEntry {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<IngestOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Posts are clustered in request order; one bad post doesn't fail the batch.
async fn ingest_batch(
    State(state): State<AppState>,
    Json(items): Json<Vec<Item>>,
) -> Result<Json<Vec<BatchEntry>>, ApiError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let id = item.id.clone();
        match state.service.ingest(item) {
            Ok(outcome) => out.push(BatchEntry {
                id,
                outcome: Some(outcome),
                error: None,
            }),
            Err(e) if e.downcast_ref::<ClusterError>().is_some() => out.push(BatchEntry {
                id,
                outcome: None,
                error: Some(e.to_string()),
            }),
            Err(e) => return Err(ApiError::Internal(e)),
        }
    }
    Ok(Json(out))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    include_stale: bool,
}

async fn list_clusters(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<ClusterSummary>>, ApiError> {
    Ok(Json(
        state
            .service
            .cluster_summaries(q.include_stale, chrono::Utc::now())?,
    ))
}

async fn cluster_detail(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
) -> Result<Json<ClusterDetail>, ApiError> {
    state
        .service
        .cluster_detail(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("cluster {id}")))
}

#[derive(Deserialize)]
struct CompareReq {
    a: Item,
    b: Item,
}

async fn debug_compare(
    State(state): State<AppState>,
    Json(req): Json<CompareReq>,
) -> Json<Comparison> {
    Json(state.service.compare(&req.a, &req.b))
}
