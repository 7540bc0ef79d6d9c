use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://workbench.poiflow.eu/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_BASE_URL: &str = "POIFLOW_BASE_URL";
const ENV_API_KEY: &str = "POIFLOW_API_KEY";
const ENV_TIMEOUT_SECS: &str = "POIFLOW_TIMEOUT_SECS";

/// Connection settings for the workbench API. The API key is checked at
/// client construction, not here; `load` tolerates a missing key so callers
/// can still merge in an explicit one.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Environment variables win over the config file; the file wins over the
    /// built-in defaults.
    pub fn load() -> Result<Self> {
        let file = read_config_file()?.unwrap_or_default();

        let base_url = env::var(ENV_BASE_URL)
            .ok()
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = env::var(ENV_API_KEY).ok().or(file.api_key).unwrap_or_default();
        let timeout_secs = env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            base_url,
            api_key,
            timeout_secs,
        })
    }
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("poiflow").join("config.toml"))
}

fn read_config_file() -> Result<Option<FileConfig>> {
    let Some(path) = config_file_path() else {
        return Ok(None);
    };
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    let parsed = toml::from_str(&text)
        .with_context(|| format!("invalid config TOML {}", path.display()))?;
    Ok(Some(parsed))
}
