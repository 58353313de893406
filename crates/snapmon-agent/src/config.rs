use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    /// Server address, e.g. `http://10.0.0.5:8080` or `10.0.0.5:8080`
    pub server_endpoint: String,
    /// Origin reported with each snapshot; the host name when unset
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Snapshots kept while the server is unreachable; oldest dropped first
    #[serde(default = "default_buffer_max_size")]
    pub buffer_max_size: usize,
}

fn default_collection_interval() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    5
}

fn default_buffer_max_size() -> usize {
    100
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("Invalid config file {path}"))?;
        Ok(config)
    }

    /// Full URL of the server's ingest route.
    pub fn ingest_url(&self) -> String {
        let addr = self.server_endpoint.trim().trim_end_matches('/');
        if addr.contains("://") {
            format!("{addr}/v1/metrics")
        } else {
            format!("http://{addr}/v1/metrics")
        }
    }

    pub fn origin_override(&self) -> Option<&str> {
        self.origin.as_deref().map(str::trim).filter(|o| !o.is_empty())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
