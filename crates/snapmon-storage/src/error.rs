use sea_orm::DbErr;
use snapmon_common::validation::ValidationError;

/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use sea_orm::DbErr;
/// use snapmon_storage::error::StorageError;
///
/// let err = StorageError::from(DbErr::Custom("disk full".into()));
/// assert!(!err.is_unavailable());
/// assert!(err.to_string().contains("disk full"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The database could not be reached, or no pooled connection became
    /// available before the acquire timeout.
    #[error("Storage: database unavailable: {0}")]
    Unavailable(#[source] DbErr),

    /// A metric insert failed after its snapshot row was written. The whole
    /// transaction is rolled back, so nothing of the snapshot remains.
    #[error(
        "Storage: metric {written} of {total} for snapshot {snapshot_id} failed, \
         rolled back: {source}"
    )]
    PartialWrite {
        snapshot_id: i64,
        written: usize,
        total: usize,
        #[source]
        source: DbErr,
    },

    /// Applying or reverting schema migrations failed.
    #[error("Storage: migration failed: {0}")]
    Migration(#[source] DbErr),

    /// Any other database error.
    #[error("Storage: database error: {0}")]
    Database(#[source] DbErr),
}

impl StorageError {
    /// Whether the failure is an infrastructure outage rather than a rejected
    /// statement.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl From<DbErr> for StorageError {
    fn from(err: DbErr) -> Self {
        if matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_)) {
            StorageError::Unavailable(err)
        } else {
            StorageError::Database(err)
        }
    }
}

/// Failure of [`SnapshotStore::add_snapshot`](crate::SnapshotStore::add_snapshot).
#[derive(Debug, thiserror::Error)]
pub enum AddSnapshotError {
    /// The payload did not match the snapshot schema; nothing was written.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
