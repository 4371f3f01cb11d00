//! Configuration parsing and validation.
//!
//! s57-ingest runs without a config file; every setting has a default and the
//! most common ones can be overridden on the command line. A TOML file
//! passed with `--config` supplies the rest.
//!
//! # Example
//!
//! ```toml
//! [db]
//! url = "postgresql://localhost/njord"
//!
//! [ingest]
//! workers = 4
//! batch_size = 1000
//! extension = "000"
//! recursive = false
//!
//! [reader]
//! s57_options = "RETURN_PRIMITIVES=OFF,LNAM_REFS=ON,UPDATES=APPLY"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Default connection string when neither `--database`, `DATABASE_URL`,
/// nor `[db].url` is given.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/njord";

/// OGR S-57 driver options. Soundings carry their depth as the Z coordinate
/// (`ADD_SOUNDG_DEPTH`) and features carry `LNAM_REFS`.
pub const DEFAULT_S57_OPTIONS: &str = "RETURN_PRIMITIVES=OFF,RETURN_LINKAGES=OFF,LNAM_REFS=ON,\
UPDATES=APPLY,SPLIT_MULTIPOINT=ON,RECODE_BY_DSSI=ON,ADD_SOUNDG_DEPTH=ON";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_url")]
    pub url: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

fn default_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Files processed concurrently. Each in-flight file holds one pooled
    /// connection.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Features per `insert_features` call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Chart file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub recursive: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_size: default_batch_size(),
            extension: default_extension(),
            recursive: false,
        }
    }
}

fn default_workers() -> usize {
    4
}
fn default_batch_size() -> usize {
    1000
}
fn default_extension() -> String {
    "000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReaderConfig {
    #[serde(default = "default_s57_options")]
    pub s57_options: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            s57_options: default_s57_options(),
        }
    }
}

fn default_s57_options() -> String {
    DEFAULT_S57_OPTIONS.to_string()
}

impl Config {
    /// Check the invariants every command relies on.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.workers == 0 {
            bail!("ingest.workers must be >= 1");
        }
        if self.ingest.batch_size == 0 {
            bail!("ingest.batch_size must be >= 1");
        }
        if self.ingest.extension.trim_start_matches('.').is_empty() {
            bail!("ingest.extension must not be empty");
        }
        if self.db.url.trim().is_empty() {
            bail!("db.url must not be empty");
        }
        Ok(())
    }

    /// The chart extension without a leading dot.
    pub fn extension(&self) -> &str {
        self.ingest.extension.trim_start_matches('.')
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
