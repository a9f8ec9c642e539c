//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Encoding engine settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Default composition parameters.
    #[serde(default)]
    pub composition: CompositionDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How engine sessions are spawned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Path or name of the ffmpeg binary.
    pub ffmpeg_path: PathBuf,

    /// Thread count for the video session (`None` lets ffmpeg decide).
    pub video_threads: Option<u32>,

    /// Thread count for the audio session.
    pub audio_threads: Option<u32>,

    /// Parent directory for session scratch areas (system temp when unset).
    pub scratch_dir: Option<PathBuf>,

    /// ffmpeg `-loglevel` passed to every request. Progress lines need at
    /// least `info`.
    pub log_level: String,
}

/// Default parameters for a composition call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionDefaults {
    /// Output frame rate.
    pub framerate: u32,

    /// Skip generating clips for uncovered timeline ranges.
    pub exclude_empty: bool,

    /// Fill color for uncovered ranges.
    pub empty_color: String,

    /// Codec for generated clips.
    pub video_codec: String,

    /// Pixel format for generated clips.
    pub pixel_format: String,

    /// Audio codec for the silent track attached to filler clips.
    pub audio_codec: String,

    /// Share of overall progress attributed to the video track [0.0, 1.0].
    pub video_weight: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipweave=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            video_threads: None,
            audio_threads: Some(1),
            scratch_dir: None,
            log_level: "verbose".to_string(),
        }
    }
}

impl Default for CompositionDefaults {
    fn default() -> Self {
        Self {
            framerate: 25,
            exclude_empty: false,
            empty_color: "black".to_string(),
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            video_weight: 0.8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipweave").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_single_thread_audio() {
        let config = AppConfig::default();
        assert_eq!(config.engine.audio_threads, Some(1));
        assert_eq!(config.engine.video_threads, None);
        assert_eq!(config.composition.framerate, 25);
        assert!(!config.composition.exclude_empty);
    }

    #[test]
    fn test_partial_config_fills_missing_sections() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"logging":{"level":"debug","json":true,"file":null}}"#)
                .unwrap();
        assert_eq!(parsed.logging.level, "debug");
        assert!(parsed.logging.json);
        assert_eq!(parsed.engine.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert!((parsed.composition.video_weight - 0.8).abs() < 1e-9);
    }
}
