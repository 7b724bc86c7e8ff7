//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const APP_NAME: &str = "strata";

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Chunk registry settings.
    pub registry: RegistryConfig,
    /// Host tick intervals.
    pub server: ServerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Chunk grid geometry and the timing windows of the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Edge length of a square chunk in meters.
    pub chunk_size: f64,
    /// Distance from a chunk edge within which an entity is visible to the neighbor.
    pub overlap_margin: f64,
    /// Grace period a Cooling chunk waits before demotion, in milliseconds.
    pub cooling_timeout_ms: u64,
    /// Dual-visibility window of an ownership handoff, in milliseconds.
    pub handoff_overlap_time_ms: u64,
}

/// Intervals of the externally driven ticks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// How often the cooling sweep runs, in milliseconds.
    pub cooling_sweep_interval_ms: u64,
    /// How often dirty entities are flushed to persistence, in milliseconds.
    pub persistence_interval_ms: u64,
    /// How often registry statistics are logged, in milliseconds.
    pub stats_interval_ms: u64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64.0,
            overlap_margin: 8.0,
            cooling_timeout_ms: 30_000,
            handoff_overlap_time_ms: 200,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cooling_sweep_interval_ms: 5_000,
            persistence_interval_ms: 10_000,
            stats_interval_ms: 30_000,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Derived values ---

impl RegistryConfig {
    /// Cooling grace period as a [`Duration`].
    pub fn cooling_timeout(&self) -> Duration {
        Duration::from_millis(self.cooling_timeout_ms)
    }

    /// Handoff dual-visibility window as a [`Duration`].
    pub fn handoff_overlap_time(&self) -> Duration {
        Duration::from_millis(self.handoff_overlap_time_ms)
    }

    /// Checks that the grid geometry is usable.
    ///
    /// The margin bands of opposite edges must not cross, otherwise an entity
    /// could be near both edges of the same axis at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.chunk_size.is_finite() && self.chunk_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "chunk_size must be positive, got {}",
                self.chunk_size
            )));
        }
        if !(self.overlap_margin.is_finite() && self.overlap_margin >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "overlap_margin must be non-negative, got {}",
                self.overlap_margin
            )));
        }
        if self.overlap_margin * 2.0 > self.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "overlap_margin {} exceeds half of chunk_size {}",
                self.overlap_margin, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Validates every section that has range constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registry.validate()?;
        if self.server.cooling_sweep_interval_ms == 0
            || self.server.persistence_interval_ms == 0
            || self.server.stats_interval_ms == 0
        {
            return Err(ConfigError::Invalid(
                "server tick intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform config directory for the server, e.g. `~/.config/strata` on Linux.
///
/// Falls back to `./strata` when the OS exposes no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("chunk_size: 64.0"));
        assert!(ron_str.contains("handoff_overlap_time_ms: 200"));
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(registry: (chunk_size: 32.0, overlap_margin: 4.0))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.registry.chunk_size, 32.0);
        assert_eq!(config.registry.cooling_timeout_ms, 30_000);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.registry.chunk_size = 128.0;
        config.server.stats_interval_ms = 1_000;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.registry.cooling_timeout_ms = 5_000;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().registry.cooling_timeout_ms, 5_000);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_registry_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_margin_wider_than_half_chunk_rejected() {
        let config = RegistryConfig {
            chunk_size: 16.0,
            overlap_margin: 9.0,
            ..RegistryConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_non_positive_chunk_size_rejected() {
        let config = RegistryConfig {
            chunk_size: 0.0,
            ..RegistryConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let mut config = Config::default();
        config.server.cooling_sweep_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations_follow_millis() {
        let config = RegistryConfig::default();
        assert_eq!(config.handoff_overlap_time(), Duration::from_millis(200));
        assert_eq!(config.cooling_timeout(), Duration::from_secs(30));
    }
}
