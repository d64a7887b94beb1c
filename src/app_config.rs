//! Harvest configuration loading.
//!
//! Settings come from a TOML file (`harvester.toml` in the working directory
//! unless `--config` names another) and are then overridden by CLI flags.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use harvester_core::{DatabaseOptions, PageLayout};
use serde::Deserialize;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "harvester.toml";

/// Database file used when neither the config nor the CLI names one.
pub const DEFAULT_DATABASE_FILE: &str = "harvester.db";

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Listing endpoint; collection id and page are sent as query parameters.
    pub base_url: Option<String>,
    /// SQLite database path.
    pub database: Option<PathBuf>,
    /// Collections processed at once (1..=16).
    pub concurrency: Option<u8>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Per-collection page ceiling.
    pub max_pages: Option<u32>,
    /// Overrides `layout.title_delimiter`.
    pub title_delimiter: Option<String>,
    /// Keys to purge and re-fetch on every run.
    #[serde(default)]
    pub force_refresh: Vec<i64>,
    /// Desired collections: logical key to remote id.
    #[serde(default)]
    pub collections: BTreeMap<String, i64>,
    /// Page selectors.
    pub layout: Option<PageLayout>,
    /// Database pool max connections (1..=20).
    pub db_max_connections: Option<u32>,
    /// Database busy timeout in milliseconds.
    pub db_busy_timeout_ms: Option<u32>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=16).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=16");
        }
        if self.max_pages == Some(0) {
            bail!("Invalid config value for `max_pages`: 0. Expected at least 1");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;

        if let Some(value) = self.db_max_connections
            && !(1..=20).contains(&value)
        {
            bail!("Invalid config value for `db_max_connections`: {value}. Expected range: 1..=20");
        }
        if let Some(value) = self.db_busy_timeout_ms
            && value > 120_000
        {
            bail!("Invalid config value for `db_busy_timeout_ms`: {value}. Expected range: 0..=120000");
        }

        self.desired_collections()?;
        Ok(())
    }

    /// Parses the `[collections]` table into key → remote id.
    pub fn desired_collections(&self) -> Result<BTreeMap<i64, i64>> {
        let mut desired = BTreeMap::new();
        for (raw_key, &external_id) in &self.collections {
            let key: i64 = raw_key
                .trim()
                .parse()
                .with_context(|| format!("Invalid collection key `{raw_key}`: expected an integer"))?;
            if external_id <= 0 {
                bail!("Invalid collection id for `{raw_key}`: {external_id}. Expected a positive id");
            }
            desired.insert(key, external_id);
        }
        Ok(desired)
    }

    /// Returns the configured layout with `title_delimiter` applied.
    #[must_use]
    pub fn page_layout(&self) -> PageLayout {
        let mut layout = self.layout.clone().unwrap_or_default();
        if let Some(delimiter) = &self.title_delimiter {
            layout.title_delimiter.clone_from(delimiter);
        }
        layout
    }

    /// Returns pool options, falling back to defaults for unset values.
    #[must_use]
    pub fn database_options(&self) -> DatabaseOptions {
        let defaults = DatabaseOptions::default();
        DatabaseOptions {
            max_connections: self.db_max_connections.unwrap_or(defaults.max_connections),
            busy_timeout_ms: self.db_busy_timeout_ms.unwrap_or(defaults.busy_timeout_ms),
        }
    }

    /// Force-refresh keys from the file merged with `extra`.
    #[must_use]
    pub fn force_refresh_with(&self, extra: &[i64]) -> BTreeSet<i64> {
        self.force_refresh
            .iter()
            .chain(extra)
            .copied()
            .collect()
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path that was consulted.
    pub path: PathBuf,
    /// Parsed config, or defaults when no file was found.
    pub config: FileConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Loads `explicit` if given (it must exist), else the default file if present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        return Ok(LoadedConfig {
            path: path.to_path_buf(),
            config: load_file_config(path)?,
            loaded_from_file: true,
        });
    }

    let path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if !path.exists() {
        return Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        });
    }
    let config = load_file_config(&path)?;
    Ok(LoadedConfig {
        path,
        config,
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}
