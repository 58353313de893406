use crate::state::AppState;
use crate::{api, logging, openapi};
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "snapmon API",
        description = "Metric snapshot ingestion and query API",
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Snapshots", description = "Snapshot ingestion and queries"),
        (name = "Local", description = "Sampling of the server machine")
    )
)]
struct ApiDoc;

fn cors_layer(allowed: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn build_http_app(state: AppState) -> Router {
    let (router, api_spec) = api::routes().split_for_parts();

    let mut spec = ApiDoc::openapi();
    spec.merge(api_spec);
    let spec = Arc::new(spec);

    let cors = cors_layer(&state.config.cors_allowed_origins);

    router
        .with_state(state)
        .merge(openapi::json_route(spec))
        .fallback(api::not_found)
        .layer(DefaultBodyLimit::max(logging::MAX_REQUEST_BYTES))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
