//! Configuration loading for icalfilterd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.icalfilter/config.toml` (user)
//! 3. `/etc/icalfilter/config.toml` (system)
//!
//! Unlike an explicit `--config`, the implicit locations are optional: with
//! no file present the daemon runs on built-in defaults. Individual values
//! can then be overridden by command-line flags.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::FetchConfig;
use crate::{IcalFilterError, Result};

/// Time kept back from the request timeout for parsing and filtering.
pub const PROCESSING_RESERVE: Duration = Duration::from_millis(500);

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

/// Listener and request handling.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1).
    #[serde(default = "default_address")]
    pub address: String,
    /// Port to listen on (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Response timeout in milliseconds (default: 5000). 0 disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Upstream fetch cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Cache expiry duration in seconds (default: 300).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Maximum concurrent upstream fetches (default: 10).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_max_concurrent() -> usize {
    10
}

/// Calendar filtering.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Months of past events to keep when the request does not say (default: 3).
    #[serde(default = "default_months")]
    pub default_months: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            default_months: default_months(),
        }
    }
}

fn default_months() -> u32 {
    3
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.icalfilter/config.toml`
    /// 3. `/etc/icalfilter/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IcalFilterError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            IcalFilterError::Configuration(msg) => {
                IcalFilterError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            IcalFilterError::Configuration(format!("Failed to parse config: {e}"))
        })
    }

    /// Resolve the config file path, if any.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(IcalFilterError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".icalfilter").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/icalfilter/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// `address:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }

    /// Fetch cache settings derived from the `[cache]` section.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::new()
            .ttl(Duration::from_secs(self.cache.ttl_secs))
            .max_concurrent(self.cache.max_concurrent)
    }

    /// Deadline budget for the upstream fetch of one request.
    ///
    /// The response timeout minus [`PROCESSING_RESERVE`] when the timeout is
    /// larger than the reserve, the timeout itself otherwise, and `None`
    /// when timeouts are disabled.
    pub fn fetch_timeout(&self) -> Option<Duration> {
        let timeout = Duration::from_millis(self.server.timeout_ms);
        if timeout.is_zero() {
            return None;
        }
        if timeout > PROCESSING_RESERVE {
            Some(timeout - PROCESSING_RESERVE)
        } else {
            Some(timeout)
        }
    }
}
