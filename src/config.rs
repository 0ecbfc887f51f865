//! TOML configuration parsing and validation.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/ppp.sqlite"
//!
//! [source]
//! dataset_url = "https://example.org/ppp/public_150k_plus.csv"
//! dictionary_url = "https://example.org/ppp/ppp-data-dictionary.xlsx"
//! download_dir = "./data/downloads"
//!
//! [loader]
//! max_rows = 10000
//!
//! [query]
//! default_limit = 50
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Where the two published artifacts come from.
///
/// Locations may be `http(s)://` URLs, `file://` URLs, or plain paths.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub dataset_url: String,
    pub dictionary_url: String,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Applied to the HTTP client only. `None` means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./data/downloads")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    /// Maximum number of data rows materialized from the dataset file.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
        }
    }
}

fn default_max_rows() -> usize {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> i64 {
    50
}
fn default_max_limit() -> i64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

/// Checks the cross-field rules `serde` cannot express.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.dataset_url.trim().is_empty() {
        anyhow::bail!("source.dataset_url must not be empty");
    }
    if config.source.dictionary_url.trim().is_empty() {
        anyhow::bail!("source.dictionary_url must not be empty");
    }

    if config.loader.max_rows == 0 {
        anyhow::bail!("loader.max_rows must be > 0");
    }

    if config.query.default_limit < 1 {
        anyhow::bail!("query.default_limit must be >= 1");
    }
    if config.query.default_limit > config.query.max_limit {
        anyhow::bail!(
            "query.default_limit ({}) must not exceed query.max_limit ({})",
            config.query.default_limit,
            config.query.max_limit
        );
    }

    Ok(())
}
