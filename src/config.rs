use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub settings: SettingsConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Optional upper bound on the database file size. Enforced through
    /// SQLite's `max_page_count` pragma so quota exhaustion is a real,
    /// locally reproducible condition rather than a platform surprise.
    #[serde(default)]
    pub max_size_bytes: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    /// Where the durable, non-secret settings snapshot lives.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
        }
    }
}

fn default_history_days() -> u32 {
    30
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.retention.history_days == 0 {
        anyhow::bail!("retention.history_days must be >= 1");
    }

    if config.db.max_size_bytes == Some(0) {
        anyhow::bail!("db.max_size_bytes must be > 0 when set");
    }

    Ok(config)
}
