use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use snapmon_collector::{default_collectors, local_snapshot, Collector};
use snapmon_common::types::LocalSnapshot;
use snapmon_storage::SnapshotStore;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub collectors: Arc<Mutex<Vec<Box<dyn Collector>>>>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: SnapshotStore, config: ServerConfig) -> Self {
        Self {
            store: Arc::new(store),
            collectors: Arc::new(Mutex::new(default_collectors())),
            start_time: Utc::now(),
            config: Arc::new(config),
        }
    }

    /// Samples the server machine with the shared collectors.
    pub fn sample_local(&self) -> LocalSnapshot {
        let mut collectors = self
            .collectors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        local_snapshot(&mut collectors)
    }
}
