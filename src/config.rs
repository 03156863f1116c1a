use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level application configuration, loaded from `settings.toml` (plus
/// `MAILDEDUP__*` environment overrides), mirroring the original service's
/// `[email]` / `[kafka]` / `[database]` table layout under renamed sections.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub email: EmailConfig,
    #[serde(default)]
    pub bus: BusConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub server: server::ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub read_dir: PathBuf,
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BusConfig {
    #[serde(default)]
    pub bootstrap_servers: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub consumer: BusConsumerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConsumerConfig {
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_min_commit_count")]
    pub min_commit_count: u64,
}

impl Default for BusConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: default_group_id(),
            client_id: default_client_id(),
            max_workers: default_max_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            min_commit_count: default_min_commit_count(),
        }
    }
}

impl BusConsumerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DbConfig {
    #[serde(default = "default_db_backend")]
    pub backend: String,
    pub path: PathBuf,
}

fn default_threshold() -> u32 {
    3
}

fn default_max_workers() -> usize {
    4
}

fn default_group_id() -> String {
    "maildedup".to_string()
}

fn default_client_id() -> String {
    "maildedup-worker".to_string()
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_min_commit_count() -> u64 {
    10
}

fn default_db_backend() -> String {
    "redb".to_string()
}

impl AppConfig {
    /// Load configuration from `settings.toml` in the working directory,
    /// overridable via `MAILDEDUP__SECTION__KEY` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("settings").required(false))
            .add_source(config::Environment::with_prefix("MAILDEDUP").separator("__"));

        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_consumer_defaults_match_the_distilled_spec() {
        let cfg = BusConsumerConfig::default();
        assert_eq!(cfg.min_commit_count, 10);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(250));
    }
}
