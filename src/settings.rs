use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const MAIN_DOC_URL: &str = "https://docs.python.org/3/";
pub const MAIN_PEP_URL: &str = "https://peps.python.org/";

const CONFIG_FILE: &str = "pydocs";
const ENV_PREFIX: &str = "PYDOCS";
const DEFAULT_TIMEOUT_SECS: i64 = 30;

/// Runtime settings: defaults, then `pydocs.toml`, then `PYDOCS_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_dir: PathBuf,
    /// Per-request timeout; `0` disables it.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub log_level: String,
    pub docs_url: String,
    pub pep_url: String,
    /// Cached responses older than this are refetched. Unset = never expire.
    pub cache_expire_secs: Option<u64>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(config_file: &str, env: Environment) -> Result<Self> {
        Config::builder()
            .set_default("base_dir", ".")?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("user_agent", concat!("pydocs_scraper/", env!("CARGO_PKG_VERSION")))?
            .set_default("log_level", "info")?
            .set_default("docs_url", MAIN_DOC_URL)?
            .set_default("pep_url", MAIN_PEP_URL)?
            .add_source(File::with_name(config_file).required(false))
            .add_source(env)
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            n => Some(Duration::from_secs(n)),
        }
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.base_dir.join("downloads")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.base_dir.join("results")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.base_dir.join("http_cache.sqlite")
    }
}
