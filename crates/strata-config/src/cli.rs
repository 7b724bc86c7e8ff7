//! Command-line argument parsing for the Strata server.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Strata server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "strata-server", about = "Chunk entity registry server")]
pub struct CliArgs {
    /// Chunk edge length in meters.
    #[arg(long)]
    pub chunk_size: Option<f64>,

    /// Border overlap margin in meters.
    #[arg(long)]
    pub overlap_margin: Option<f64>,

    /// Cooling grace period in milliseconds.
    #[arg(long)]
    pub cooling_timeout_ms: Option<u64>,

    /// Handoff dual-visibility window in milliseconds.
    #[arg(long)]
    pub handoff_overlap_ms: Option<u64>,

    /// Interval of the cooling sweep in milliseconds.
    #[arg(long)]
    pub cooling_sweep_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(size) = args.chunk_size {
            self.registry.chunk_size = size;
        }
        if let Some(margin) = args.overlap_margin {
            self.registry.overlap_margin = margin;
        }
        if let Some(ms) = args.cooling_timeout_ms {
            self.registry.cooling_timeout_ms = ms;
        }
        if let Some(ms) = args.handoff_overlap_ms {
            self.registry.handoff_overlap_time_ms = ms;
        }
        if let Some(ms) = args.cooling_sweep_ms {
            self.server.cooling_sweep_interval_ms = ms;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            chunk_size: Some(128.0),
            handoff_overlap_ms: Some(500),
            log_level: Some("debug".to_string()),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.registry.chunk_size, 128.0);
        assert_eq!(config.registry.handoff_overlap_time_ms, 500);
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults
        assert_eq!(config.registry.overlap_margin, 8.0);
        assert_eq!(config.server.cooling_sweep_interval_ms, 5_000);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from([
            "strata-server",
            "--overlap-margin",
            "4",
            "--cooling-sweep-ms",
            "250",
        ]);
        assert_eq!(args.overlap_margin, Some(4.0));
        assert_eq!(args.cooling_sweep_ms, Some(250));
        assert!(args.config.is_none());
    }
}
