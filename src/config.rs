//! Configuration: CLI flags > environment > `config.toml` > defaults.
//!
//! Only the backend base address matters to the conversation core, and its
//! absence is reported lazily when a turn is dispatched.

use crate::error::ConfigurationError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const API_URL_ENV: &str = "FAQCHAT_API_URL";
const APP_DIR: &str = "faqchat";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: Option<String>,
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            data_dir: default_data_dir(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// On-disk shape; every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    api_url: Option<String>,
    data_dir: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

/// Values supplied on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub data_dir: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

impl Config {
    /// Resolve configuration from the default config file location.
    pub fn load(overrides: Overrides) -> Result<Self, ConfigurationError> {
        let env_url = std::env::var(API_URL_ENV).ok();
        Self::resolve(default_config_path().as_deref(), env_url, overrides)
    }

    pub fn resolve(
        config_path: Option<&Path>,
        env_api_url: Option<String>,
        overrides: Overrides,
    ) -> Result<Self, ConfigurationError> {
        let file = match config_path {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };
        let defaults = Config::default();

        let api_url = overrides
            .api_url
            .or(env_api_url)
            .or(file.api_url)
            .and_then(|url| normalize_base_url(&url));

        Ok(Config {
            api_url,
            data_dir: overrides.data_dir.or(file.data_dir).unwrap_or(defaults.data_dir),
            request_timeout_secs: file
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            connect_timeout_secs: file
                .connect_timeout_secs
                .unwrap_or(defaults.connect_timeout_secs),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("faqchat.db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigurationError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(source) => {
            return Err(ConfigurationError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&raw).map_err(|source| ConfigurationError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Trim whitespace and trailing slashes; blank means unset.
fn normalize_base_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
