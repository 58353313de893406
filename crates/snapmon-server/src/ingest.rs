//! Batch ingestion of raw snapshot payloads.
//!
//! A batch is processed in order and stops at the first snapshot that fails.
//! Each snapshot is committed on its own, so snapshots before the failing one
//! stay stored and snapshots after it are never attempted.

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use snapmon_common::validation::{FieldKind, ValidationError};
use snapmon_storage::{AddSnapshotError, SnapshotStore, SortOrder};
use utoipa::ToSchema;

/// Number of recent snapshots written to the debug log after an ingest.
const RECENT_SUMMARY_COUNT: u64 = 2;

/// Outcome of a fully ingested batch.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct IngestReport {
    /// Number of snapshots stored
    pub ingested: usize,
    /// IDs assigned to the stored snapshots, in batch order
    pub ids: Vec<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The body is not a JSON array of snapshots.
    #[error("Invalid request body: {0}")]
    Body(#[source] ValidationError),

    /// Snapshot `index` (0-based) failed. `persisted` holds the IDs stored
    /// before it.
    #[error("Snapshot at index {index} rejected: {kind}")]
    Item {
        index: usize,
        persisted: Vec<i64>,
        #[source]
        kind: AddSnapshotError,
    },
}

impl IngestError {
    /// Whether the caller sent bad input, as opposed to a storage failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::Body(_)
                | IngestError::Item {
                    kind: AddSnapshotError::Invalid(_),
                    ..
                }
        )
    }

    pub fn status(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Envelope error code name.
    pub fn code(&self) -> &'static str {
        if self.is_client_error() {
            "bad_request"
        } else {
            "storage_error"
        }
    }
}

/// Unwraps the request body into the list of snapshot payloads.
///
/// Accepts an array, or a JSON string whose content is an array (clients
/// that encode the batch twice).
pub fn decode_batch(body: Value) -> Result<Vec<Value>, IngestError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => Ok(items),
            _ => Err(body_mismatch(&Value::String(text))),
        },
        other => Err(body_mismatch(&other)),
    }
}

fn body_mismatch(actual: &Value) -> IngestError {
    IngestError::Body(ValidationError::mismatch("body", actual, FieldKind::Array))
}

/// Validates and stores every snapshot of `body`, stopping at the first
/// failure.
pub async fn ingest_batch(
    store: &SnapshotStore,
    body: Value,
) -> Result<IngestReport, IngestError> {
    let items = decode_batch(body)?;
    let total = items.len();

    let mut ids = Vec::with_capacity(total);
    for (index, item) in items.iter().enumerate() {
        match store.add_snapshot(item).await {
            Ok(stored) => ids.push(stored.id),
            Err(kind) => {
                tracing::warn!(
                    index,
                    persisted = ids.len(),
                    skipped = total - index - 1,
                    error = %kind,
                    "Batch stopped at failing snapshot"
                );
                return Err(IngestError::Item {
                    index,
                    persisted: ids,
                    kind,
                });
            }
        }
    }

    tracing::info!(ingested = ids.len(), "Snapshots ingested");
    if !ids.is_empty() && tracing::enabled!(tracing::Level::DEBUG) {
        log_recent(store).await;
    }

    Ok(IngestReport {
        ingested: ids.len(),
        ids,
    })
}

async fn log_recent(store: &SnapshotStore) {
    match store.get(Some(RECENT_SUMMARY_COUNT), SortOrder::Desc).await {
        Ok(recent) => {
            for snapshot in recent {
                tracing::debug!(snapshot = %snapshot.summary(), "Recent snapshot");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to load recent snapshots"),
    }
}
