//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where exported clips are written by the CLI.
    pub output_dir: PathBuf,

    /// Default recording settings.
    pub recording: RecordingDefaults,

    /// Default export settings.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Live composite canvas width.
    pub canvas_width: u32,

    /// Live composite canvas height.
    pub canvas_height: u32,

    /// Live composite frame rate.
    pub fps: u32,

    /// Hard cap on a single recording, in seconds.
    pub max_duration_secs: u64,

    /// Pre-record countdown, in seconds. Zero disables it.
    pub countdown_secs: u64,

    /// Encoder slice interval in milliseconds.
    pub slice_interval_ms: u64,

    /// Gain applied to display (system) audio before mixing.
    pub display_audio_gain: f32,

    /// Gain applied to the microphone before mixing.
    pub mic_gain: f32,

    /// Audio sample rate for the mix graph.
    pub audio_sample_rate: u32,

    /// Default webcam overlay edge length in canvas pixels.
    pub webcam_size: u32,

    /// Default webcam overlay distance from the canvas corner.
    pub webcam_padding: u32,

    /// Record the live composite as the primary video instead of the raw screen.
    pub composite_primary: bool,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Output canvas width.
    pub width: u32,

    /// Output canvas height.
    pub height: u32,

    /// Render loop rate.
    pub fps: u32,

    /// Layout id used when none is requested.
    pub layout: String,

    /// Background id used when none is requested.
    pub background: String,

    /// Upper bound on the duration probe, in milliseconds.
    pub duration_probe_timeout_ms: u64,

    /// Camera/screen drift tolerated before the camera is re-seeked.
    pub drift_tolerance_ms: f64,

    /// Container/codec string handed to the output encoder.
    pub mime_type: String,

    /// Target video bitrate for the output encoder.
    pub video_bits_per_second: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipcast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            recording: RecordingDefaults::default(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            canvas_width: 1920,
            canvas_height: 1080,
            fps: 60,
            max_duration_secs: 120,
            countdown_secs: 3,
            slice_interval_ms: 1000,
            display_audio_gain: 0.7,
            mic_gain: 1.5,
            audio_sample_rate: 48000,
            webcam_size: 320,
            webcam_padding: 20,
            composite_primary: false,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 60,
            layout: "screen-camera-br".to_string(),
            background: "none".to_string(),
            duration_probe_timeout_ms: 5000,
            drift_tolerance_ms: 100.0,
            mime_type: "video/webm;codecs=vp9,opus".to_string(),
            video_bits_per_second: 5_000_000,
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
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
                    Ok(config) => match config.validate() {
                        Ok(()) => return config,
                        Err(e) => {
                            tracing::warn!("Ignoring invalid config at {:?}: {}", config_path, e);
                        }
                    },
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

    /// Reject values the engines cannot run with.
    pub fn validate(&self) -> Result<(), crate::error::ClipcastError> {
        let rec = &self.recording;
        if rec.canvas_width == 0 || rec.canvas_height == 0 {
            return Err(crate::error::ClipcastError::config(
                "recording canvas must be non-empty",
            ));
        }
        if rec.fps == 0 || self.export.fps == 0 {
            return Err(crate::error::ClipcastError::config("fps must be positive"));
        }
        if rec.max_duration_secs == 0 {
            return Err(crate::error::ClipcastError::config(
                "max_duration_secs must be positive",
            ));
        }
        if self.export.width == 0 || self.export.height == 0 {
            return Err(crate::error::ClipcastError::config(
                "export canvas must be non-empty",
            ));
        }
        Ok(())
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
    base.join("clipcast").join("config.json")
}

/// Default directory for exported clips.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("clipcast").join("exports")
}
