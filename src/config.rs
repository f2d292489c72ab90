//! Library configuration
//!
//! The C entry points have no way to receive options, so the library reads
//! an optional TOML file named by `LIBAPPIMAGE_CONFIG` and a log filter
//! override from `LIBAPPIMAGE_LOG` the first time it is used.

use crate::error::{AppImageError, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::warn;

pub const CONFIG_ENV: &str = "LIBAPPIMAGE_CONFIG";
pub const LOG_ENV: &str = "LIBAPPIMAGE_LOG";
pub const DEFAULT_LOG_FILTER: &str = "libappimage=error,appimage=warn";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `tracing_subscriber::EnvFilter` directives
    pub log_filter: String,

    /// Colorize log output
    pub log_ansi: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_ansi: false,
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| AppImageError::Config(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppImageError::Config(format!("cannot read {:?}: {}", path.as_ref(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Resolve configuration from the environment
    ///
    /// Never fails: an unreadable or invalid file is reported and replaced by
    /// the defaults, so a broken config cannot disable the library.
    pub fn load() -> Self {
        let mut config = match env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(&path).unwrap_or_else(|e| {
                warn!("Ignoring {}: {}", CONFIG_ENV, e);
                Config::default()
            }),
            None => Config::default(),
        };

        if let Ok(filter) = env::var(LOG_ENV) {
            config.apply_log_override(&filter);
        }
        config
    }

    fn apply_log_override(&mut self, filter: &str) {
        let filter = filter.trim();
        if !filter.is_empty() {
            self.log_filter = filter.to_string();
        }
    }
}
