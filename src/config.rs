//! Configuration parsing and validation.
//!
//! Configuration is loaded from a TOML file (default: `config/bathy.toml`).
//! Every section and key is optional; missing values take the defaults
//! below.
//!
//! # Example
//!
//! ```toml
//! [tides]
//! endpoint = "https://www.worldtides.info/api/v3"
//! step_minutes = 10
//! datum = "CD"
//! ttl_hours = 168
//! timeout_secs = 20
//! api_key_env = "WORLDTIDES_API_KEY"
//!
//! [cache]
//! dir = "./data/tide-cache"
//!
//! [output]
//! dir = "./out"
//! ```
//!
//! The access credential itself is never stored in the file; `api_key_env`
//! names the environment variable that holds it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DiskCache;
use crate::tides::{
    TideSettings, DEFAULT_DATUM, DEFAULT_ENDPOINT, DEFAULT_STEP_MINUTES, DEFAULT_TIMEOUT_SECS,
};

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub tides: TidesConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Tide source settings (`[tides]`).
#[derive(Debug, Deserialize, Clone)]
pub struct TidesConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_step_minutes")]
    pub step_minutes: u32,
    #[serde(default = "default_datum")]
    pub datum: String,
    /// Disk cache lifetime. Unset, zero, or negative never expires.
    #[serde(default)]
    pub ttl_hours: Option<f64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for TidesConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            step_minutes: default_step_minutes(),
            datum: default_datum(),
            ttl_hours: None,
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_step_minutes() -> u32 {
    DEFAULT_STEP_MINUTES
}
fn default_datum() -> String {
    DEFAULT_DATUM.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_api_key_env() -> String {
    "WORLDTIDES_API_KEY".to_string()
}

impl TidesConfig {
    /// Read the credential from the configured environment variable.
    pub fn credential(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn settings(&self) -> TideSettings {
        TideSettings {
            endpoint: self.endpoint.clone(),
            step_minutes: self.step_minutes,
            datum: self.datum.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Disk cache settings (`[cache]`). The disk tier is off without `dir`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Output settings (`[output]`).
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Defaults for running without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// The disk cache tier, if `[cache].dir` is set.
    pub fn disk_cache(&self) -> Option<DiskCache> {
        self.cache
            .dir
            .as_ref()
            .map(|dir| DiskCache::new(dir, self.tides.ttl_hours))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let tides = &config.tides;

    if tides.step_minutes == 0 {
        anyhow::bail!("tides.step_minutes must be > 0");
    }

    if tides.timeout_secs == 0 {
        anyhow::bail!("tides.timeout_secs must be > 0");
    }

    if tides.datum.trim().is_empty() {
        anyhow::bail!("tides.datum must not be empty");
    }

    if tides.api_key_env.trim().is_empty() {
        anyhow::bail!("tides.api_key_env must name an environment variable");
    }

    if let Some(ttl) = tides.ttl_hours {
        if !ttl.is_finite() {
            anyhow::bail!("tides.ttl_hours must be a finite number");
        }
        if ttl > 0.0 && Duration::try_from_secs_f64(ttl * 3600.0).is_err() {
            anyhow::bail!("tides.ttl_hours is too large, got {}", ttl);
        }
    }

    reqwest::Url::parse(&tides.endpoint)
        .with_context(|| format!("tides.endpoint is not a valid URL: '{}'", tides.endpoint))?;

    Ok(())
}
