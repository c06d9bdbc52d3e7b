//! Studio configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Missing config files are not an error.

use crate::audio::SAMPLE_RATE;
use crate::error::ConfigError;
use crate::library::StoreFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name used under the platform data directory.
const APP_DIR: &str = "stagebox";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub audio: AudioConfig,
    pub library: LibraryConfig,
    pub scheduler: SchedulerConfig,
}

/// Audio output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Gain applied to the final mix before clipping.
    pub master_gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            master_gain: 0.8,
        }
    }
}

/// Song library settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Library file; None uses the platform data directory.
    pub path: Option<PathBuf>,
    /// On-disk format of the library file.
    pub format: StoreFormat,
}

impl LibraryConfig {
    /// Returns the library file location.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| default_library_path(self.format))
    }
}

/// Preview scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How far ahead of the clock events are handed to the engine.
    pub lookahead_ms: u64,
    /// How often the host should call `update()`.
    /// Must stay well below the lookahead or events will arrive late.
    pub tick_interval_ms: u64,
    /// Previews stop on their own after this long.
    pub max_preview_secs: u64,
}

impl SchedulerConfig {
    pub fn lookahead(&self) -> Duration {
        Duration::from_millis(self.lookahead_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn max_preview(&self) -> Duration {
        Duration::from_secs(self.max_preview_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: 100,
            tick_interval_ms: 25,
            max_preview_secs: 30,
        }
    }
}

impl StudioConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or a field has the wrong type
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values the engine and scheduler cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "audio.sample_rate must be positive".to_string(),
            ));
        }
        let gain = self.audio.master_gain;
        if !gain.is_finite() || gain < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "audio.master_gain must be a non-negative number, got {}",
                gain
            )));
        }
        if self.scheduler.lookahead_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.lookahead_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads a configuration file, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Returns the per-user directory holding the library and config.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Returns the default library file for a format.
pub fn default_library_path(format: StoreFormat) -> PathBuf {
    data_dir().join(format!("library.{}", format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StudioConfig::default();
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.scheduler.lookahead(), Duration::from_millis(100));
        assert_eq!(config.scheduler.max_preview(), Duration::from_secs(30));
        assert!(config.scheduler.tick_interval() < config.scheduler.lookahead());
        assert_eq!(config.library.format, StoreFormat::Json);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = StudioConfig::from_json(
            r#"{ "scheduler": { "max_preview_secs": 10 }, "library": { "format": "binary" } }"#,
        )
        .unwrap();
        assert_eq!(config.scheduler.max_preview_secs, 10);
        assert_eq!(config.scheduler.lookahead_ms, 100);
        assert_eq!(config.library.format, StoreFormat::Binary);
        assert_eq!(config.audio, AudioConfig::default());
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            StudioConfig::from_json(r#"{ "audio": { "sample_rate": "fast" } }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unusable_values_are_rejected() {
        for json in [
            r#"{ "audio": { "sample_rate": 0 } }"#,
            r#"{ "audio": { "master_gain": -0.5 } }"#,
            r#"{ "scheduler": { "lookahead_ms": 0 } }"#,
        ] {
            assert!(
                matches!(StudioConfig::from_json(json), Err(ConfigError::Invalid(_))),
                "accepted {}",
                json
            );
        }

        let mut config = StudioConfig::default();
        config.audio.master_gain = f32::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(StudioConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "audio": { "sample_rate": 0 } }"#).unwrap();
        assert!(matches!(
            StudioConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StudioConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, StudioConfig::default());
    }

    #[test]
    fn test_library_path_resolution() {
        let mut library = LibraryConfig::default();
        assert!(library.resolved_path().ends_with("stagebox/library.json"));

        library.path = Some(PathBuf::from("/tmp/songs.bin"));
        assert_eq!(library.resolved_path(), PathBuf::from("/tmp/songs.bin"));
    }
}
