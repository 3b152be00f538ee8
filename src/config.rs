use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::pipeline::AudioFormat;

fn default_step_timeout_secs() -> u64 {
    600
}

fn default_short_duration_secs() -> u32 {
    30
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory receiving every artifact handed back to the caller
    pub output_dir: PathBuf,
    /// Directory for intermediate artifacts that never leave the runner
    pub temp_dir: PathBuf,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
    /// Prefix prepended to artifact file names in manifest download references
    pub download_base: String,
    /// Age after which `clean` removes files from the output and temp directories
    pub max_file_age_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_binary_path: String,
    /// Video encoder used whenever a step re-encodes video
    pub video_codec: String,
    /// Audio encoder used whenever a step re-encodes audio into a video container
    pub audio_codec: String,
    /// Encoder speed preset (ultrafast, fast, medium, slow, veryslow)
    pub preset: String,
    /// Constant rate factor (0-51, lower = better quality)
    pub crf: u8,
    /// Audio bitrate for every audio encode
    pub audio_bitrate: String,
    /// Wall-clock limit for one transcoder invocation
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Default length of the short clip
    #[serde(default = "default_short_duration_secs")]
    pub short_duration_secs: u32,
    /// Default codec family for the extracted audio artifact
    #[serde(default)]
    pub audio_format: AudioFormat,
    /// Run enhance, extract_audio and create_short concurrently
    #[serde(default)]
    pub parallel_siblings: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            temp_dir: PathBuf::from("temp"),
            log_dir: PathBuf::from("logs"),
            download_base: "/download/".to_string(),
            max_file_age_secs: 3600,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            probe_binary_path: "ffprobe".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "fast".to_string(),
            crf: 23,
            audio_bitrate: "192k".to_string(),
            step_timeout_secs: default_step_timeout_secs(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            short_duration_secs: default_short_duration_secs(),
            audio_format: AudioFormat::default(),
            parallel_siblings: false,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| PipelineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            short_duration_secs = 15
            audio_format = "aac"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.short_duration_secs, 15);
        assert_eq!(config.pipeline.audio_format, AudioFormat::Aac);
        assert!(!config.pipeline.parallel_siblings);
        assert_eq!(config.media.binary_path, "ffmpeg");
        assert_eq!(config.storage.download_base, "/download/");
    }

    #[test]
    fn test_partial_sections_keep_remaining_defaults() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            output_dir = "/srv/vidpipe/out"

            [media]
            crf = 18
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.output_dir, PathBuf::from("/srv/vidpipe/out"));
        assert_eq!(config.storage.temp_dir, PathBuf::from("temp"));
        assert_eq!(config.storage.max_file_age_secs, 3600);
        assert_eq!(config.media.crf, 18);
        assert_eq!(config.media.binary_path, "ffmpeg");
        assert_eq!(config.media.step_timeout_secs, 600);
    }

    #[test]
    fn test_malformed_file_is_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidpipe.toml");
        std::fs::write(&path, "[media]\ncrf = \"high\"\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Toml(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidpipe.toml");

        let mut config = Config::default();
        config.media.crf = 18;
        config.media.step_timeout_secs = 42;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.media.crf, 18);
        assert_eq!(loaded.media.step_timeout_secs, 42);
        assert_eq!(loaded.storage.output_dir, PathBuf::from("outputs"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
