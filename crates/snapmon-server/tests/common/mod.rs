#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde::de::DeserializeOwned;
use sea_orm::{ConnectionTrait, Database};
use serde_json::{json, Value};
use snapmon_server::app;
use snapmon_server::config::{DatabaseConfig, ServerConfig};
use snapmon_server::state::AppState;
use snapmon_storage::SnapshotStore;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub async fn build_test_context() -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;

    let config = ServerConfig {
        database: DatabaseConfig {
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    config.database.prepare()?;
    let store = SnapshotStore::connect(&config.database.store_options()).await?;

    let state = AppState::new(store, config);
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Value,
) -> (StatusCode, Value, Option<String>) {
    request_raw(app, method, uri, &body.to_string()).await
}

pub async fn request_raw(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build");
    send(app, req).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, req).await
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["err_code"], 0);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
}

pub fn assert_err_envelope(json: &Value, err_code: i32) {
    assert_eq!(json["err_code"], err_code);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
    assert!(json.get("data").is_some());
    assert!(json["data"].is_null());
}

pub fn decode_data<T: DeserializeOwned>(json: &Value) -> T {
    serde_json::from_value(json["data"].clone()).expect("data should decode")
}

pub fn snapshot_body(origin: &str, cpu: f64) -> Value {
    json!({
        "origin": origin,
        "timestamp": "2024-01-01T00:00:00+00:00",
        "metrics": [
            {"name": "CPU Usage", "value": cpu, "unit": "%"},
            {"name": "RAM Usage", "value": 2048.0, "unit": "MB"}
        ]
    })
}

/// Posts `count` snapshots one batch at a time, origins `host-1..=host-count`.
pub async fn seed_snapshots(app: &axum::Router, count: usize) {
    for i in 1..=count {
        let (status, _, _) = request_json(
            app,
            "POST",
            "/v1/metrics",
            json!([snapshot_body(&format!("host-{i}"), i as f64)]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}

pub fn ids_of(json: &Value) -> Vec<i64> {
    json["data"]
        .as_array()
        .expect("data should be an array")
        .iter()
        .map(|s| s["id"].as_i64().expect("id should be an integer"))
        .collect()
}

/// Drops `table` through a separate connection so the app's pool sees a broken schema.
pub async fn drop_table(ctx: &TestContext, table: &str) {
    let db = Database::connect(ctx.state.config.database.connection_url())
        .await
        .expect("second connection should open");
    db.execute_unprepared(&format!("DROP TABLE {table}"))
        .await
        .expect("table should drop");
    db.close().await.expect("second connection should close");
}
