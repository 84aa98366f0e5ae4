//! Executor configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML config file,
//! then whatever the CLI passes in (flags and their environment fallbacks).
//! The executor itself only ever sees the resolved [`Config`].

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOST_PREFIX: &str = "/usr/local";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const MIN_HTTP_TIMEOUT_SECS: u64 = 5;
const MAX_HTTP_TIMEOUT_SECS: u64 = 300;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Resolved configuration handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The host package manager's own prefix; interpreters live in `<host_prefix>/bin`.
    pub host_prefix: PathBuf,
    /// Root under which per-package prefixes are created (`<cellar>/<name>/<version>`).
    pub cellar: PathBuf,
    /// Parent for temporary working directories (system temp dir if unset).
    pub work_root: Option<PathBuf>,
    pub keep_work_dir: bool,
    /// Refuse resources that carry no sha256.
    pub require_checksums: bool,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let host_prefix = PathBuf::from(DEFAULT_HOST_PREFIX);
        Self {
            cellar: host_prefix.join("Cellar"),
            host_prefix,
            work_root: None,
            keep_work_dir: false,
            require_checksums: false,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    host_prefix: Option<PathBuf>,
    cellar: Option<PathBuf>,
    work_root: Option<PathBuf>,
    keep_work_dir: Option<bool>,
    require_checksums: Option<bool>,
    http_timeout_secs: Option<u64>,
}

impl Config {
    /// Default location of the config file (`$XDG_CONFIG_HOME/formula/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("formula").join("config.toml"))
    }

    /// Load defaults overlaid with `path`. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if !path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigToml = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.merge(file);
        Ok(config)
    }

    fn merge(&mut self, other: ConfigToml) {
        if let Some(host_prefix) = other.host_prefix {
            // The cellar follows the host prefix unless set explicitly.
            if other.cellar.is_none() {
                self.cellar = host_prefix.join("Cellar");
            }
            self.host_prefix = host_prefix;
        }
        if let Some(cellar) = other.cellar {
            self.cellar = cellar;
        }
        if other.work_root.is_some() {
            self.work_root = other.work_root;
        }
        if let Some(keep) = other.keep_work_dir {
            self.keep_work_dir = keep;
        }
        if let Some(require) = other.require_checksums {
            self.require_checksums = require;
        }
        if let Some(secs) = other.http_timeout_secs {
            self.http_timeout_secs = secs;
        }
    }

    /// Override the host prefix, moving the cellar with it.
    pub fn with_host_prefix(mut self, host_prefix: impl Into<PathBuf>) -> Self {
        let host_prefix = host_prefix.into();
        if self.cellar == self.host_prefix.join("Cellar") {
            self.cellar = host_prefix.join("Cellar");
        }
        self.host_prefix = host_prefix;
        self
    }

    /// Per-package install prefix.
    pub fn prefix_for(&self, name: &str, version: &str) -> PathBuf {
        self.cellar.join(name).join(version)
    }

    /// HTTP timeout, clamped to a sane range.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(
            self.http_timeout_secs
                .clamp(MIN_HTTP_TIMEOUT_SECS, MAX_HTTP_TIMEOUT_SECS),
        )
    }
}
