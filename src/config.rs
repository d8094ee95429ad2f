//! TOML configuration file support.
//!
//! Precedence, lowest to highest: built-in defaults, config file, CLI
//! flags.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::cli::{Cli, OutputFormat};

const DEFAULT_INTERVAL_MS: u64 = 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// On-disk service settings. Every field is optional so a file can set only
/// what it cares about.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub cores: Option<usize>,
    pub interval_ms: Option<u64>,
    pub listen: Option<String>,
    pub format: Option<OutputFormat>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}

/// Fully resolved settings the binary runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Possible-core count; `None` means autodetect from the host.
    pub cores: Option<usize>,
    pub interval: Duration,
    pub listen: Option<String>,
    pub format: OutputFormat,
}

impl Settings {
    /// Layer CLI flags over the optional file values over defaults.
    pub fn resolve(cli: &Cli, file: Option<FileConfig>) -> Self {
        let file = file.unwrap_or_default();
        Self {
            cores: cli.cores.or(file.cores),
            interval: Duration::from_millis(
                cli.interval_ms
                    .or(file.interval_ms)
                    .unwrap_or(DEFAULT_INTERVAL_MS),
            ),
            listen: cli.listen.clone().or(file.listen),
            format: cli.format.or(file.format).unwrap_or(OutputFormat::Text),
        }
    }
}
