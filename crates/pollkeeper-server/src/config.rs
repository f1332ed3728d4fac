use anyhow::{bail, Context, Result};
use pollkeeper_db::DatabaseConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub request: RequestConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Deadline for a single command, in seconds.
    pub timeout_secs: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Config {
    /// Reads `path` (a missing file means defaults) and applies `DATABASE_URL`.
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with(path, std::env::var("DATABASE_URL").ok())
    }

    fn load_with(path: &str, database_url: Option<String>) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw).with_context(|| format!("failed to parse {path}"))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(err).with_context(|| format!("failed to read {path}")),
        };
        config.resolve(database_url)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// The environment wins over the file; an empty url is fatal.
    pub fn resolve(mut self, database_url: Option<String>) -> Result<Self> {
        if let Some(url) = database_url.filter(|url| !url.trim().is_empty()) {
            self.database.url = url;
        }
        if self.database.url.trim().is_empty() {
            bail!("database URL is not set. Please set DATABASE_URL environment variable.");
        }
        Ok(self)
    }
}
