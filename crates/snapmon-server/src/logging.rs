use crate::api::error_response;
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::fmt::Write;
use std::time::Instant;
use tracing::Instrument;

/// Trace ID of the current request, stored in request extensions.
#[derive(Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Largest request body accepted, in bytes.
pub const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

/// Maximum number of characters to log from request/response body.
const MAX_BODY_LOG_CHARS: usize = 200;

/// Generate a 16-character hex trace ID (8 random bytes).
fn generate_trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    let mut s = String::with_capacity(16);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Truncate to at most `max` bytes without splitting a character.
fn truncate_body(bytes: &[u8], max: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.len() > max => {
            let mut end = max;
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &s[..end])
        }
        Ok(s) => s.to_string(),
        Err(_) => "<non-utf8 body>".to_string(),
    }
}

fn format_elapsed(elapsed_us: u128) -> String {
    if elapsed_us < 1000 {
        format!("{elapsed_us}µs")
    } else if elapsed_us < 1_000_000 {
        format!("{}ms", elapsed_us / 1000)
    } else {
        format!("{:.1}s", elapsed_us as f64 / 1_000_000.0)
    }
}

fn is_json(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

fn with_trace_header(mut response: Response, trace_id: &str) -> Response {
    if let Ok(val) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, val);
    }
    response
}

/// Request/response logging middleware.
///
/// Every request gets a fresh [`TraceId`]; handler logs run inside a span
/// carrying it, and the response echoes it in `X-Trace-Id`.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    req.extensions_mut().insert(TraceId(trace_id.clone()));
    let span = tracing::info_span!("request", trace_id = %trace_id);

    async move {
        let method = req.method().clone();
        let url = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        // Buffer the body of POST requests so it can be logged and replayed.
        let req = if method == axum::http::Method::POST {
            let (parts, body) = req.into_parts();
            let body_bytes = match axum::body::to_bytes(body, MAX_REQUEST_BYTES).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(
                        method = %method,
                        path = %url,
                        error = %e,
                        "--> request body rejected"
                    );
                    let response = error_response(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        &trace_id,
                        "payload_too_large",
                        &format!("Request body exceeds {MAX_REQUEST_BYTES} bytes"),
                    );
                    return with_trace_header(response, &trace_id);
                }
            };
            tracing::info!(
                method = %method,
                path = %url,
                body = %truncate_body(&body_bytes, MAX_BODY_LOG_CHARS),
                ua = %user_agent,
                "--> request"
            );
            Request::from_parts(parts, Body::from(body_bytes))
        } else {
            tracing::info!(method = %method, path = %url, ua = %user_agent, "--> request");
            req
        };

        let start = Instant::now();
        let response = next.run(req).await;
        let elapsed = format_elapsed(start.elapsed().as_micros());
        let status = response.status();

        let (parts, body) = response.into_parts();
        let body_bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .unwrap_or_default();
        let body_snippet = if is_json(&parts.headers) {
            truncate_body(&body_bytes, MAX_BODY_LOG_CHARS)
        } else {
            String::new()
        };

        let status_code = status.as_u16();
        if status.is_server_error() {
            tracing::error!(
                status = status_code,
                elapsed = %elapsed,
                body = %body_snippet,
                "<-- response"
            );
        } else if status.is_client_error() {
            tracing::warn!(
                status = status_code,
                elapsed = %elapsed,
                body = %body_snippet,
                "<-- response"
            );
        } else {
            tracing::info!(status = status_code, elapsed = %elapsed, "<-- response");
        }

        with_trace_header(Response::from_parts(parts, Body::from(body_bytes)), &trace_id)
    }
    .instrument(span)
    .await
}
