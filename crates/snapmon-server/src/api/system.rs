use crate::api::success_response;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Serialize;
use snapmon_common::types::LocalSnapshot;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Service health
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// Server version
    version: String,
    /// Seconds since startup
    uptime_secs: i64,
    /// Number of stored snapshots, absent when storage is unreachable
    snapshot_count: Option<u64>,
    /// "ok" or "unavailable"
    storage_status: String,
}

/// Service health and storage status.
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    let (snapshot_count, storage_status) = match state.store.count().await {
        Ok(count) => (Some(count), "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not count snapshots");
            (None, "unavailable")
        }
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            snapshot_count,
            storage_status: storage_status.to_string(),
        },
    )
}

/// Sample the server machine now. The snapshot is not stored.
#[utoipa::path(
    get,
    path = "/v1/local",
    tag = "Local",
    responses(
        (status = 200, description = "Freshly sampled local snapshot", body = LocalSnapshot)
    )
)]
async fn local_snapshot(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let snapshot = state.sample_local();
    success_response(StatusCode::OK, &trace_id, snapshot)
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(local_snapshot))
}
