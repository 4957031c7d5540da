//! Client configuration.
//!
//! Stored as TOML under the user's config directory
//! (`<config_dir>/droidscan/config.toml`). A missing file means defaults.
//! The `DROIDSCAN_BASE_URL` environment variable overrides the stored base URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

pub const BASE_URL_ENV: &str = "DROIDSCAN_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REPORT_FILENAME: &str = "android_scan_report.csv";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid base URL '{0}': {1}")]
    InvalidBaseUrl(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base endpoint of the scanning service, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Per-request timeout applied by the HTTP transport.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Default file name used when saving an exported report.
    pub report_filename: String,
    /// Route requests through the proxy named by the environment (`HTTP_PROXY` etc).
    pub use_system_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("droidscan/{}", env!("CARGO_PKG_VERSION")),
            report_filename: DEFAULT_REPORT_FILENAME.to_string(),
            use_system_proxy: true,
        }
    }
}

impl ClientConfig {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join("droidscan").join("config.toml"))
    }

    /// Load the user config file and apply the environment override, then
    /// `cli_base_url`. Validation runs once, after every override.
    pub fn load_with(cli_base_url: Option<String>) -> Result<Self, ConfigError> {
        Self::resolve(
            &Self::config_path()?,
            std::env::var(BASE_URL_ENV).ok(),
            cli_base_url,
        )
    }

    /// Layer file < environment < command line for the base URL.
    pub fn resolve(
        path: &Path,
        env_base_url: Option<String>,
        cli_base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(env_base_url);
        config.apply_overrides(cli_base_url);
        config.validate()?;
        Ok(config)
    }

    /// Read a config file. A file that does not exist yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Replace the base URL when an override is present and non-blank.
    pub fn apply_overrides(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
    }

    /// The base URL must parse and use http or https.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidBaseUrl(self.base_url.clone(), e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigError::InvalidBaseUrl(
                self.base_url.clone(),
                format!("unsupported scheme '{}'", other),
            )),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
