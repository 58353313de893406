use anyhow::Context;
use serde::{Deserialize, Serialize};
use snapmon_storage::{SchemaReset, StoreOptions};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Number of snapshots returned by `/v1/snapshots/latest` without `?limit=`
    #[serde(default = "default_latest_count")]
    pub latest_count: u64,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full database URL. When absent a SQLite file under `data_dir` is used.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Drop and recreate all tables at startup. Destroys stored snapshots.
    #[serde(default)]
    pub allow_destructive_reset: bool,
}

fn default_http_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_latest_count() -> u64 {
    2
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            bind_address: default_bind_address(),
            latest_count: default_latest_count(),
            cors_allowed_origins: Vec::new(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            data_dir: default_data_dir(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            allow_destructive_reset: false,
        }
    }
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => {
                let path = Path::new(&self.data_dir).join("snapmon.db");
                format!("sqlite://{}?mode=rwc", path.display())
            }
        }
    }

    /// Connection URL with any password replaced, safe to log.
    pub fn redacted_url(&self) -> String {
        let url = self.connection_url();
        let Some((scheme, rest)) = url.split_once("://") else {
            return url;
        };
        match rest.rsplit_once('@') {
            Some((userinfo, host)) => match userinfo.split_once(':') {
                Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
                None => url,
            },
            None => url,
        }
    }

    /// Checks the URL scheme and creates `data_dir` when the derived SQLite
    /// file will live there. Only SQLite is supported.
    pub fn prepare(&self) -> anyhow::Result<()> {
        if !self.connection_url().starts_with("sqlite:") {
            anyhow::bail!(
                "Unsupported database URL {}: only sqlite: URLs are supported",
                self.redacted_url()
            );
        }
        if self.url.as_deref().is_some_and(|u| !u.trim().is_empty()) {
            return Ok(());
        }
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create data directory {}", self.data_dir))
    }

    pub fn store_options(&self) -> StoreOptions {
        let mut options = StoreOptions::new(self.connection_url());
        options.max_connections = self.max_connections.max(1);
        options.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        options.acquire_timeout = Duration::from_secs(self.acquire_timeout_secs);
        options.reset = if self.allow_destructive_reset {
            SchemaReset::DropAndRecreate
        } else {
            SchemaReset::Keep
        };
        options
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("Invalid config file {path}"))?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.http_port)
    }
}
