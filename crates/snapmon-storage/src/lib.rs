//! Persistence layer for metric snapshots.
//!
//! Snapshots live in the `metric_snapshot` table and own their rows in the
//! `metric` table (`ON DELETE CASCADE`). [`SnapshotStore`] runs on SeaORM;
//! the schema is managed by the `migration` crate.

pub mod entities;
pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{AddSnapshotError, StorageError};
pub use store::snapshot::SortOrder;
pub use store::{SchemaReset, SnapshotStore, StoreOptions};
