mod config;

use anyhow::Result;
use snapmon_collector::{default_collectors, local_snapshot, Collector};
use snapmon_common::types::SnapshotPayload;
use std::collections::VecDeque;
use tokio::signal;
use tokio::time::interval;
use tracing_subscriber::EnvFilter;

/// Bounded FIFO of snapshots waiting to be sent.
struct SnapshotBuffer {
    buffer: VecDeque<SnapshotPayload>,
    max_size: usize,
}

impl SnapshotBuffer {
    fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            buffer: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    fn push(&mut self, snapshot: SnapshotPayload) {
        if self.buffer.len() >= self.max_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(snapshot);
    }

    fn drain_all(&mut self) -> Vec<SnapshotPayload> {
        self.buffer.drain(..).collect()
    }

    /// Puts an unsent batch back in front of anything sampled since,
    /// dropping the oldest snapshots that no longer fit.
    fn requeue(&mut self, batch: Vec<SnapshotPayload>) {
        for snapshot in batch.into_iter().rev() {
            if self.buffer.len() >= self.max_size {
                break;
            }
            self.buffer.push_front(snapshot);
        }
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }
}

enum Delivery {
    Sent(usize),
    /// The server refused the batch as invalid; resending would not help.
    Rejected(String),
    /// Network or server failure; the batch should be retried.
    Failed(String),
}

async fn send_batch(client: &reqwest::Client, url: &str, batch: &[SnapshotPayload]) -> Delivery {
    let resp = match client.post(url).json(batch).send().await {
        Ok(resp) => resp,
        Err(e) => return Delivery::Failed(e.to_string()),
    };

    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    let message = body["err_msg"].as_str().unwrap_or("").to_string();

    if status.is_success() {
        let ingested = body["data"]["ingested"].as_u64().unwrap_or(0) as usize;
        Delivery::Sent(ingested)
    } else if status.is_client_error() {
        Delivery::Rejected(format!("{status}: {message}"))
    } else {
        Delivery::Failed(format!("{status}: {message}"))
    }
}

fn sample(collectors: &mut [Box<dyn Collector>], origin: Option<&str>) -> SnapshotPayload {
    let mut payload = SnapshotPayload::from(local_snapshot(collectors));
    if let Some(origin) = origin {
        payload.origin = origin.to_string();
    }
    payload
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("snapmon=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    let config = config::AgentConfig::load(&config_path)?;
    let url = config.ingest_url();
    tracing::info!(server = %url, origin = ?config.origin_override(), "snapmon-agent starting");

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()?;
    let mut collectors = default_collectors();
    let mut buffer = SnapshotBuffer::new(config.buffer_max_size);
    let mut tick = interval(config.interval());

    tracing::info!(
        interval_secs = config.collection_interval_secs,
        buffer_max = config.buffer_max_size,
        "Starting collection loop"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                buffer.push(sample(&mut collectors, config.origin_override()));
                let batch = buffer.drain_all();

                match send_batch(&client, &url, &batch).await {
                    Delivery::Sent(ingested) => {
                        tracing::debug!(ingested, "Snapshots reported");
                    }
                    Delivery::Rejected(reason) => {
                        tracing::error!(
                            dropped = batch.len(),
                            reason = %reason,
                            "Server rejected batch"
                        );
                    }
                    Delivery::Failed(reason) => {
                        tracing::warn!(reason = %reason, "Failed to send snapshots, buffering");
                        buffer.requeue(batch);
                        tracing::debug!(buffered = buffer.len(), "Snapshots buffered");
                    }
                }
            }
            _ = signal::ctrl_c() => {
                tracing::info!(unsent = buffer.len(), "Shutting down gracefully");
                break;
            }
        }
    }

    Ok(())
}
