use crate::entities::metric::{self, Entity as MetricEntity};
use crate::entities::metric_snapshot::Entity as SnapshotEntity;
use crate::{AddSnapshotError, SchemaReset, SnapshotStore, SortOrder, StorageError, StoreOptions};
use chrono::{TimeZone, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use snapmon_common::types::{MetricPayload, NewSnapshot};
use snapmon_common::validation::{FieldKind, ValidationError};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup() -> (TempDir, SnapshotStore) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("snapmon.db").display());
    let store = SnapshotStore::connect(&StoreOptions::new(url)).await.unwrap();
    (dir, store)
}

fn payload(origin: &str, cpu: f64) -> Value {
    json!({
        "origin": origin,
        "timestamp": "2024-01-01T00:00:00+00:00",
        "metrics": [
            {"name": "CPU Usage", "value": cpu, "unit": "%"},
            {"name": "RAM Usage", "value": 1024.0, "unit": "MB"}
        ]
    })
}

async fn metric_rows(store: &SnapshotStore) -> u64 {
    MetricEntity::find().count(store.db()).await.unwrap()
}

#[tokio::test]
async fn add_snapshot_persists_snapshot_and_metrics() {
    let (_dir, store) = setup().await;

    let stored = store.add_snapshot(&payload("host-a", 12.5)).await.unwrap();

    assert!(stored.id > 0);
    assert_eq!(stored.origin, "host-a");
    assert_eq!(stored.metrics.len(), 2);
    assert!(stored.metrics.iter().all(|m| m.snapshot_id == stored.id));
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(metric_rows(&store).await, 2);
}

#[tokio::test]
async fn snapshot_without_metrics_is_stored() {
    let (_dir, store) = setup().await;

    let body = json!({"origin": "host-a", "timestamp": "2024-01-01T00:00:00Z", "metrics": []});
    let stored = store.add_snapshot(&body).await.unwrap();

    assert!(stored.metrics.is_empty());
    let all = store.get(None, SortOrder::Asc).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].metrics.is_empty());
}

#[tokio::test]
async fn missing_snapshot_field_writes_nothing() {
    let (_dir, store) = setup().await;

    for key in ["origin", "timestamp", "metrics"] {
        let mut body = payload("host-a", 1.0);
        body.as_object_mut().unwrap().remove(key);
        let err = store.add_snapshot(&body).await.unwrap_err();
        assert!(
            matches!(
                err,
                AddSnapshotError::Invalid(ValidationError::MissingField { key: ref k }) if k == key
            ),
            "unexpected error for {key}: {err:?}"
        );
    }

    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(metric_rows(&store).await, 0);
}

#[tokio::test]
async fn non_numeric_metric_value_is_a_type_mismatch() {
    let (_dir, store) = setup().await;

    let mut body = payload("host-a", 1.0);
    body["metrics"][0]["value"] = json!("high");
    let err = store.add_snapshot(&body).await.unwrap_err();

    match err {
        AddSnapshotError::Invalid(ValidationError::TypeMismatch { key, expected, .. }) => {
            assert_eq!(key, "metrics[0].value");
            assert_eq!(expected, FieldKind::Number);
        }
        other => panic!("expected type mismatch, got {other:?}"),
    }
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn get_orders_and_limits_by_id() {
    let (_dir, store) = setup().await;
    for i in 1..=5 {
        store.add_snapshot(&payload(&format!("host-{i}"), i as f64)).await.unwrap();
    }

    let latest = store.get(Some(2), SortOrder::Desc).await.unwrap();
    let ids: Vec<i64> = latest.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![5, 4]);
    assert_eq!(latest[0].origin, "host-5");
    assert_eq!(latest[0].metrics.len(), 2);
    assert_eq!(latest[0].metrics[0].value, 5.0);
    assert!(latest.iter().all(|s| s.metrics.iter().all(|m| m.snapshot_id == s.id)));

    let history = store.get(None, SortOrder::Desc).await.unwrap();
    let ids: Vec<i64> = history.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![5, 4, 3, 2, 1]);

    let ascending = store.get(None, SortOrder::Asc).await.unwrap();
    let ids: Vec<i64> = ascending.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    assert!(store.get(Some(0), SortOrder::Desc).await.unwrap().is_empty());
    assert_eq!(store.get(Some(50), SortOrder::Asc).await.unwrap().len(), 5);
}

#[tokio::test]
async fn metrics_keep_payload_order() {
    let (_dir, store) = setup().await;
    let body = json!({
        "origin": "host-a",
        "timestamp": "2024-01-01T00:00:00Z",
        "metrics": [
            {"name": "c", "value": 3, "unit": "x"},
            {"name": "a", "value": 1, "unit": "x"},
            {"name": "b", "value": 2, "unit": "x"}
        ]
    });
    store.add_snapshot(&body).await.unwrap();

    let stored = store.get(Some(1), SortOrder::Desc).await.unwrap();
    let names: Vec<&str> = stored[0].metrics.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["c", "a", "b"]);
}

#[tokio::test]
async fn round_trip_latest_snapshot() {
    let (_dir, store) = setup().await;
    let body = json!({
        "origin": "host-a",
        "timestamp": "2024-01-01T00:00:00+00:00",
        "metrics": [{"name": "CPU Usage", "value": 12.5, "unit": "%"}]
    });
    store.add_snapshot(&body).await.unwrap();

    let latest = store.get(Some(1), SortOrder::Desc).await.unwrap();
    assert_eq!(latest.len(), 1);
    let snapshot = &latest[0];
    assert_eq!(snapshot.origin, "host-a");
    assert_eq!(snapshot.timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(snapshot.metrics.len(), 1);
    assert_eq!(snapshot.metrics[0].name, "CPU Usage");
    assert_eq!(snapshot.metrics[0].value, 12.5);
    assert_eq!(snapshot.metrics[0].unit, "%");
}

#[tokio::test]
async fn failed_metric_insert_rolls_back_the_snapshot() {
    let (_dir, store) = setup().await;

    // SQLite binds NaN as NULL, which the NOT NULL constraint on value rejects.
    let snapshot = NewSnapshot {
        origin: "host-a".into(),
        timestamp: Utc::now(),
        metrics: vec![
            MetricPayload::new("CPU Usage", 10.0, "%"),
            MetricPayload::new("RAM Usage", f64::NAN, "MB"),
        ],
    };
    let err = store.insert(snapshot).await.unwrap_err();

    assert!(
        matches!(err, StorageError::PartialWrite { written: 1, total: 2, .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(metric_rows(&store).await, 0);

    // The store keeps working after a rolled back write.
    store.add_snapshot(&payload("host-b", 1.0)).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn metric_requires_existing_snapshot() {
    let (_dir, store) = setup().await;

    let orphan = metric::ActiveModel {
        name: Set("CPU Usage".into()),
        value: Set(1.0),
        unit: Set("%".into()),
        snapshot_id: Set(999),
        ..Default::default()
    };
    assert!(orphan.insert(store.db()).await.is_err());
    assert_eq!(metric_rows(&store).await, 0);
}

#[tokio::test]
async fn deleting_a_snapshot_cascades_to_metrics() {
    let (_dir, store) = setup().await;
    let first = store.add_snapshot(&payload("host-a", 1.0)).await.unwrap();
    store.add_snapshot(&payload("host-b", 2.0)).await.unwrap();

    SnapshotEntity::delete_by_id(first.id).exec(store.db()).await.unwrap();

    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(metric_rows(&store).await, 2);
}

#[tokio::test]
async fn init_is_idempotent_unless_reset_is_requested() {
    let (_dir, store) = setup().await;
    store.add_snapshot(&payload("host-a", 1.0)).await.unwrap();

    store.init(SchemaReset::Keep).await.unwrap();
    store.init(SchemaReset::Keep).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);

    store.init(SchemaReset::DropAndRecreate).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);

    let stored = store.add_snapshot(&payload("host-a", 1.0)).await.unwrap();
    assert_eq!(stored.metrics.len(), 2);
}

#[tokio::test]
async fn reconnecting_keeps_existing_data() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("snapmon.db").display());

    {
        let store = SnapshotStore::connect(&StoreOptions::new(url.clone())).await.unwrap();
        store.add_snapshot(&payload("host-a", 1.0)).await.unwrap();
    }

    let store = SnapshotStore::connect(&StoreOptions::new(url)).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn unreachable_database_is_reported_as_unavailable() {
    let dir = TempDir::new().unwrap();
    let url = format!(
        "sqlite://{}?mode=ro",
        dir.path().join("missing").join("snapmon.db").display()
    );

    let err = match SnapshotStore::connect(&StoreOptions::new(url)).await {
        Ok(_) => panic!("connecting to a missing database should fail"),
        Err(e) => e,
    };
    assert!(err.is_unavailable(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn concurrent_writes_keep_metrics_with_their_snapshot() {
    let (_dir, store) = setup().await;
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let origin = format!("host-{i}");
            let body = json!({
                "origin": origin,
                "timestamp": "2024-01-01T00:00:00Z",
                "metrics": [
                    {"name": format!("{origin}-cpu"), "value": i, "unit": "%"},
                    {"name": format!("{origin}-ram"), "value": i, "unit": "MB"}
                ]
            });
            store.add_snapshot(&body).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let all = store.get(None, SortOrder::Asc).await.unwrap();
    assert_eq!(all.len(), 8);
    for snapshot in all {
        assert_eq!(snapshot.metrics.len(), 2);
        assert!(snapshot
            .metrics
            .iter()
            .all(|m| m.name.starts_with(&format!("{}-", snapshot.origin))));
    }
}
