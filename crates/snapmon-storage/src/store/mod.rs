use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;

use crate::error::{Result, StorageError};

pub mod snapshot;

/// What [`SnapshotStore::init`] does with an existing schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaReset {
    /// Apply pending migrations and keep existing data.
    #[default]
    Keep,
    /// Drop every table and re-create the schema. Destroys all stored data.
    DropAndRecreate,
}

/// Connection settings for [`SnapshotStore::connect`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Full database URL, e.g. `sqlite:///data/snapmon.db?mode=rwc`.
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
    pub reset: SchemaReset,
}

impl StoreOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(5),
            reset: SchemaReset::Keep,
        }
    }
}

/// Durable storage for metric snapshots and their metrics.
///
/// Writes go through one transaction per snapshot; reads return snapshots
/// ordered by ID with their metrics attached.
pub struct SnapshotStore {
    pub(crate) db: DatabaseConnection,
}

impl SnapshotStore {
    /// Connects to the database and initialises the schema.
    ///
    /// Connection and pool-acquire waits are bounded by the configured
    /// timeouts; expiry surfaces as [`StorageError::Unavailable`].
    pub async fn connect(options: &StoreOptions) -> Result<Self> {
        let mut opt = ConnectOptions::new(options.url.clone());
        opt.max_connections(options.max_connections)
            .connect_timeout(options.connect_timeout)
            .acquire_timeout(options.acquire_timeout)
            .sqlx_logging(false);

        let db = Database::connect(opt)
            .await
            .map_err(StorageError::Unavailable)?;

        // WAL lets history reads proceed while an ingest transaction is open
        if options.url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        let store = Self { db };
        store.init(options.reset).await?;
        tracing::info!(
            max_connections = options.max_connections,
            "Initialized snapshot store"
        );
        Ok(store)
    }

    /// Ensures the schema exists. Idempotent for [`SchemaReset::Keep`].
    pub async fn init(&self, reset: SchemaReset) -> Result<()> {
        match reset {
            SchemaReset::Keep => {
                Migrator::up(&self.db, None)
                    .await
                    .map_err(StorageError::Migration)?;
            }
            SchemaReset::DropAndRecreate => {
                tracing::warn!(
                    "Destructive reset enabled: dropping and recreating all snapshot tables"
                );
                Migrator::refresh(&self.db)
                    .await
                    .map_err(StorageError::Migration)?;
            }
        }
        tracing::info!(?reset, "Database initialized");
        Ok(())
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
