use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseTransaction, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde_json::Value;
use snapmon_common::types::{Metric, MetricSnapshot, NewSnapshot};
use snapmon_common::validation::parse_snapshot;
use std::collections::HashMap;

use crate::entities::metric::{self, Column as MetricCol, Entity as MetricEntity};
use crate::entities::metric_snapshot::{self, Column as SnapshotCol, Entity as SnapshotEntity};
use crate::error::{AddSnapshotError, Result, StorageError};
use crate::store::SnapshotStore;

/// Keeps `IN (...)` lists well below SQLite's bound-parameter limit.
const ID_CHUNK_SIZE: usize = 500;

/// Retrieval order by snapshot ID (ID order is insertion order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl From<SortOrder> for Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

fn to_metric(m: metric::Model) -> Metric {
    Metric {
        id: m.id,
        name: m.name,
        value: m.value,
        unit: m.unit,
        snapshot_id: m.snapshot_id,
    }
}

fn to_snapshot(m: metric_snapshot::Model, metrics: Vec<Metric>) -> MetricSnapshot {
    MetricSnapshot {
        id: m.id,
        origin: m.origin,
        timestamp: m.timestamp,
        metrics,
    }
}

/// Writes the snapshot row, then each metric pointing at it.
async fn write_rows(txn: &DatabaseTransaction, snapshot: NewSnapshot) -> Result<MetricSnapshot> {
    let parent = metric_snapshot::ActiveModel {
        origin: Set(snapshot.origin),
        timestamp: Set(snapshot.timestamp),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let total = snapshot.metrics.len();
    let mut metrics = Vec::with_capacity(total);
    for (written, m) in snapshot.metrics.into_iter().enumerate() {
        let row = metric::ActiveModel {
            name: Set(m.name),
            value: Set(m.value),
            unit: Set(m.unit),
            snapshot_id: Set(parent.id),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|source| StorageError::PartialWrite {
            snapshot_id: parent.id,
            written,
            total,
            source,
        })?;
        metrics.push(to_metric(row));
    }

    Ok(to_snapshot(parent, metrics))
}

impl SnapshotStore {
    /// Validates a raw payload and persists it.
    ///
    /// An invalid payload writes nothing and is reported as
    /// [`AddSnapshotError::Invalid`].
    pub async fn add_snapshot(
        &self,
        payload: &Value,
    ) -> std::result::Result<MetricSnapshot, AddSnapshotError> {
        let snapshot = parse_snapshot(payload)?;
        Ok(self.insert(snapshot).await?)
    }

    /// Persists an already validated snapshot and its metrics atomically.
    ///
    /// If any metric insert fails the snapshot row is rolled back with it.
    pub async fn insert(&self, snapshot: NewSnapshot) -> Result<MetricSnapshot> {
        let txn = self.db().begin().await?;
        match write_rows(&txn, snapshot).await {
            Ok(stored) => {
                txn.commit().await?;
                tracing::debug!(
                    snapshot_id = stored.id,
                    origin = %stored.origin,
                    metrics = stored.metrics.len(),
                    "Snapshot stored"
                );
                Ok(stored)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    tracing::error!(error = %rollback, "Failed to roll back snapshot write");
                }
                Err(e)
            }
        }
    }

    /// Returns snapshots ordered by ID, at most `limit` of them when given.
    ///
    /// Every snapshot carries its metrics in insertion order.
    pub async fn get(&self, limit: Option<u64>, order: SortOrder) -> Result<Vec<MetricSnapshot>> {
        let mut query = SnapshotEntity::find().order_by(SnapshotCol::Id, order.into());
        if let Some(n) = limit {
            query = query.limit(n);
        }
        let parents = query.all(self.db()).await?;
        if parents.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = parents.iter().map(|p| p.id).collect();
        let mut grouped: HashMap<i64, Vec<Metric>> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let rows = MetricEntity::find()
                .filter(MetricCol::SnapshotId.is_in(chunk.iter().copied()))
                .order_by(MetricCol::Id, Order::Asc)
                .all(self.db())
                .await?;
            for row in rows {
                grouped.entry(row.snapshot_id).or_default().push(to_metric(row));
            }
        }

        Ok(parents
            .into_iter()
            .map(|p| {
                let metrics = grouped.remove(&p.id).unwrap_or_default();
                to_snapshot(p, metrics)
            })
            .collect())
    }

    /// Number of stored snapshots.
    pub async fn count(&self) -> Result<u64> {
        Ok(SnapshotEntity::find().count(self.db()).await?)
    }
}
