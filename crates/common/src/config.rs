//! Application configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{TelevidError, TelevidResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory under which per-job workspaces are created.
    pub work_dir: PathBuf,

    /// External engine programs.
    pub engine: EngineConfig,

    /// Default render limits and encoder settings.
    pub render: RenderDefaults,

    /// Font asset id -> font file. Relative paths resolve against `font_dir`.
    pub fonts: BTreeMap<String, PathBuf>,

    /// Base directory for relative font paths.
    pub font_dir: PathBuf,

    /// Optional JSON style sheet extending the built-in styles.
    pub style_sheet: Option<PathBuf>,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// External programs invoked by the orchestrator and the probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Transcoder program (name on PATH or absolute path).
    pub ffmpeg: String,

    /// Probe program (name on PATH or absolute path).
    pub ffprobe: String,

    /// Seconds between SIGTERM and a hard kill when stopping the engine.
    pub terminate_grace_secs: f64,

    /// Seconds allowed for a probe invocation.
    pub probe_timeout_secs: u64,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Wall-clock limit for one transcode.
    pub timeout_secs: u64,

    /// Largest output file accepted (bytes, 0 = unlimited).
    pub max_output_bytes: u64,

    /// Extra attempts for transient engine failures (0 = no retry).
    pub max_retries: u32,

    /// Backoff before the first retry, doubled per attempt.
    pub retry_backoff_ms: u64,

    /// Reject cues whose text is empty.
    pub require_text: bool,

    /// Encoder settings.
    pub encoder: EncoderSettings,
}

/// Video/audio encoder parameters handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Video codec (e.g., "libx264").
    pub video_codec: String,

    /// Encoder preset.
    pub preset: String,

    /// Constant rate factor.
    pub crf: u8,

    /// Output pixel format.
    pub pix_fmt: String,

    /// Audio handling.
    pub audio: AudioMode,
}

/// What to do with the source audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum AudioMode {
    /// Stream-copy the source audio untouched.
    Copy,
    /// Re-encode with the given codec and bitrate.
    Encode { codec: String, bitrate_kbps: u32 },
    /// Drop audio.
    None,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "televid_render_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("televid"),
            engine: EngineConfig::default(),
            render: RenderDefaults::default(),
            fonts: default_fonts(),
            font_dir: PathBuf::from("fonts"),
            style_sheet: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            terminate_grace_secs: 2.0,
            probe_timeout_secs: 30,
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            max_output_bytes: 0,
            max_retries: 0,
            retry_backoff_ms: 500,
            require_text: true,
            encoder: EncoderSettings::default(),
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 18,
            pix_fmt: "yuv420p".to_string(),
            audio: AudioMode::Copy,
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

fn default_fonts() -> BTreeMap<String, PathBuf> {
    let mut fonts = BTreeMap::new();
    fonts.insert(
        "default".to_string(),
        PathBuf::from("ZalandoSans-Medium.ttf"),
    );
    fonts
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Errors are returned, not swallowed.
    pub fn load_from(path: &Path) -> TelevidResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TelevidError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            TelevidError::config(format!("Failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Reject settings no render could work with.
    pub fn validate(&self) -> TelevidResult<()> {
        if self.engine.ffmpeg.trim().is_empty() || self.engine.ffprobe.trim().is_empty() {
            return Err(TelevidError::config("engine programs must not be empty"));
        }
        if self.render.timeout_secs == 0 {
            return Err(TelevidError::config("render.timeout_secs must be positive"));
        }
        if self.engine.terminate_grace_secs < 0.0 || !self.engine.terminate_grace_secs.is_finite()
        {
            return Err(TelevidError::config(
                "engine.terminate_grace_secs must be a non-negative number",
            ));
        }
        if self.render.encoder.crf > 51 {
            return Err(TelevidError::config("render.encoder.crf must be in 0..=51"));
        }
        Ok(())
    }

    /// Font asset map with relative paths resolved against `font_dir`.
    pub fn resolved_fonts(&self) -> BTreeMap<String, PathBuf> {
        self.fonts
            .iter()
            .map(|(id, path)| {
                let resolved = if path.is_absolute() {
                    path.clone()
                } else {
                    self.font_dir.join(path)
                };
                (id.clone(), resolved)
            })
            .collect()
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
    base.join("televid").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_worker_constants() {
        let config = AppConfig::default();
        assert_eq!(config.render.timeout_secs, 300);
        assert_eq!(config.render.encoder.pix_fmt, "yuv420p");
        assert!(config.fonts.contains_key("default"));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"render": {"timeout_secs": 12}}"#).unwrap();
        assert_eq!(parsed.render.timeout_secs, 12);
        assert_eq!(parsed.engine.ffmpeg, "ffmpeg");
        assert_eq!(parsed.render.encoder.audio, AudioMode::Copy);
    }

    #[test]
    fn test_audio_mode_serialization() {
        let mode = AudioMode::Encode {
            codec: "aac".to_string(),
            bitrate_kbps: 192,
        };
        let json = serde_json::to_string(&mode).unwrap();
        assert_eq!(json, r#"{"mode":"encode","codec":"aac","bitrate_kbps":192}"#);
    }

    #[test]
    fn test_resolved_fonts_join_relative_paths() {
        let mut config = AppConfig::default();
        config.font_dir = PathBuf::from("/srv/fonts");
        config
            .fonts
            .insert("abs".to_string(), PathBuf::from("/opt/Other.ttf"));

        let fonts = config.resolved_fonts();
        assert_eq!(
            fonts["default"],
            PathBuf::from("/srv/fonts/ZalandoSans-Medium.ttf")
        );
        assert_eq!(fonts["abs"], PathBuf::from("/opt/Other.ttf"));
    }

    #[test]
    fn test_save_and_load_round_trip_rejects_invalid() {
        let dir = std::env::temp_dir().join(format!("televid_config_test_{}", std::process::id()));
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.render.timeout_secs = 42;
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap().render.timeout_secs, 42);

        config.render.timeout_secs = 0;
        config.save_to(&path).unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(TelevidError::Config { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
