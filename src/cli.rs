//! CLI argument parsing for ocioso

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

/// Output format for snapshot rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table (default)
    Text,
    /// JSON for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "ocioso")]
#[command(version)]
#[command(about = "Per-core idle/run time accounting service", long_about = None)]
pub struct Cli {
    /// Number of possible cores (default: autodetect from the host)
    #[arg(long = "cores", value_name = "N")]
    pub cores: Option<usize>,

    /// Sampling and snapshot interval in milliseconds
    #[arg(long = "interval-ms", value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Serve the endpoint namespace over TCP on this address
    #[arg(long = "listen", value_name = "ADDR")]
    pub listen: Option<String>,

    /// Output format for snapshots
    #[arg(long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Print a single snapshot and exit
    #[arg(long = "once")]
    pub once: bool,

    /// Write to a reset endpoint before sampling (default scope: all cores)
    #[arg(
        long = "reset",
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub reset: Option<String>,

    /// Enable debug logging to stderr
    #[arg(long = "debug")]
    pub debug: bool,

    /// Path to a TOML config file
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["ocioso"]);
        assert_eq!(cli.cores, None);
        assert_eq!(cli.interval_ms, None);
        assert!(!cli.once);
        assert!(!cli.debug);
        assert!(cli.reset.is_none());
    }

    #[test]
    fn test_cli_parses_cores_and_interval() {
        let cli = Cli::parse_from(["ocioso", "--cores", "8", "--interval-ms", "250"]);
        assert_eq!(cli.cores, Some(8));
        assert_eq!(cli.interval_ms, Some(250));
    }

    #[test]
    fn test_cli_format_values() {
        let cli = Cli::parse_from(["ocioso", "--format", "json"]);
        assert_eq!(cli.format, Some(OutputFormat::Json));

        let cli = Cli::parse_from(["ocioso", "--format", "text"]);
        assert_eq!(cli.format, Some(OutputFormat::Text));
    }

    #[test]
    fn test_cli_reset_scope_optional() {
        let cli = Cli::parse_from(["ocioso", "--reset"]);
        assert_eq!(cli.reset.as_deref(), Some(""));

        let cli = Cli::parse_from(["ocioso", "--reset", "core1/reset"]);
        assert_eq!(cli.reset.as_deref(), Some("core1/reset"));
    }

    #[test]
    fn test_cli_once_flag() {
        let cli = Cli::parse_from(["ocioso", "--once"]);
        assert!(cli.once);
    }
}
