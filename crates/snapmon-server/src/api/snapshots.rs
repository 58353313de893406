use crate::api::params::LatestParams;
use crate::api::{error_response, success_response, ApiError};
use crate::ingest::{ingest_batch, IngestReport};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use snapmon_common::types::{MetricSnapshot, SnapshotPayload};
use snapmon_storage::{SortOrder, StorageError};
use utoipa_axum::{router::OpenApiRouter, routes};

fn storage_failure(trace_id: &str, e: &StorageError) -> Response {
    tracing::error!(trace_id, error = %e, "Failed to load snapshots");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        trace_id,
        "storage_error",
        "Failed to load snapshots",
    )
}

/// Ingest a batch of metric snapshots.
///
/// The body is a JSON array of snapshots (a JSON string holding such an array
/// is also accepted). Snapshots are stored in order; the first invalid one
/// stops the batch, leaving earlier snapshots stored.
#[utoipa::path(
    post,
    path = "/v1/metrics",
    tag = "Snapshots",
    request_body = Vec<SnapshotPayload>,
    responses(
        (status = 200, description = "All snapshots stored", body = IngestReport),
        (status = 400, description = "Malformed body or invalid snapshot", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError)
    )
)]
async fn ingest_metrics(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "bad_request",
                &format!("Request body is not valid JSON: {e}"),
            )
        }
    };

    match ingest_batch(&state.store, body).await {
        Ok(report) => success_response(StatusCode::OK, &trace_id, report),
        Err(e) if e.is_client_error() => {
            error_response(e.status(), &trace_id, e.code(), &e.to_string())
        }
        Err(e) => {
            tracing::error!(trace_id = %trace_id.0, error = %e, "Snapshot ingestion failed");
            error_response(e.status(), &trace_id, e.code(), "Failed to store snapshots")
        }
    }
}

/// Most recent snapshots, newest first.
///
/// Returns the configured default count (2) unless `limit` is given.
#[utoipa::path(
    get,
    path = "/v1/snapshots/latest",
    tag = "Snapshots",
    params(LatestParams),
    responses(
        (status = 200, description = "Latest snapshots", body = Vec<MetricSnapshot>),
        (status = 400, description = "Invalid query parameters", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError)
    )
)]
async fn latest_snapshots(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    params: Result<Query<LatestParams>, QueryRejection>,
) -> impl IntoResponse {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "bad_request",
                &rejection.body_text(),
            )
        }
    };
    let limit = params.limit(state.config.latest_count);
    match state.store.get(Some(limit), SortOrder::Desc).await {
        Ok(snapshots) => success_response(StatusCode::OK, &trace_id, snapshots),
        Err(e) => storage_failure(&trace_id, &e),
    }
}

/// Every stored snapshot, newest first.
#[utoipa::path(
    get,
    path = "/v1/snapshots/history",
    tag = "Snapshots",
    responses(
        (status = 200, description = "All snapshots", body = Vec<MetricSnapshot>),
        (status = 500, description = "Storage failure", body = ApiError)
    )
)]
async fn snapshot_history(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.get(None, SortOrder::Desc).await {
        Ok(snapshots) => success_response(StatusCode::OK, &trace_id, snapshots),
        Err(e) => storage_failure(&trace_id, &e),
    }
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(ingest_metrics))
        .routes(routes!(latest_snapshots))
        .routes(routes!(snapshot_history))
}
