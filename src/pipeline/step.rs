//! Step catalog
//!
//! Every transformation the pipeline knows about is a [`StepKind`]. The set is
//! closed: names outside it are rejected before a job starts. Declaration order
//! is execution order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Enhance,
    RemoveWatermark,
    ExtractAudio,
    CreateShort,
    ReplaceAudio,
}

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::Enhance,
        StepKind::RemoveWatermark,
        StepKind::ExtractAudio,
        StepKind::CreateShort,
        StepKind::ReplaceAudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Enhance => "enhance",
            StepKind::RemoveWatermark => "remove_watermark",
            StepKind::ExtractAudio => "extract_audio",
            StepKind::CreateShort => "create_short",
            StepKind::ReplaceAudio => "replace_audio",
        }
    }

    /// Role of the artifact this step contributes to the manifest
    pub fn role(&self) -> ArtifactRole {
        match self {
            StepKind::Enhance => ArtifactRole::Enhanced,
            StepKind::RemoveWatermark => ArtifactRole::NoWatermark,
            StepKind::ExtractAudio => ArtifactRole::Audio,
            StepKind::CreateShort => ArtifactRole::Short,
            StepKind::ReplaceAudio => ArtifactRole::Final,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        StepKind::ALL
            .into_iter()
            .find(|step| step.as_str() == name)
            .ok_or_else(|| PipelineError::UnknownStep(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    Enhanced,
    NoWatermark,
    Audio,
    Short,
    Final,
}

impl ArtifactRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactRole::Enhanced => "enhanced",
            ArtifactRole::NoWatermark => "no_watermark",
            ArtifactRole::Audio => "audio",
            ArtifactRole::Short => "short",
            ArtifactRole::Final => "final",
        }
    }

    /// Short tag embedded in artifact file names
    pub fn file_tag(&self) -> &'static str {
        match self {
            ArtifactRole::NoWatermark => "nowm",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Aac,
}

impl AudioFormat {
    pub fn encoder(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "libmp3lame",
            AudioFormat::Aac => "aac",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "m4a",
        }
    }
}

impl FromStr for AudioFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "aac" | "m4a" => Ok(AudioFormat::Aac),
            _ => Err(PipelineError::Config(format!(
                "Invalid audio format '{}'. Valid formats: mp3, aac",
                s
            ))),
        }
    }
}

/// Filters applied by the enhance step. Each one toggles independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceOptions {
    pub denoise: bool,
    pub sharpen: bool,
    pub color_correct: bool,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            denoise: true,
            sharpen: true,
            color_correct: true,
        }
    }
}

impl EnhanceOptions {
    pub const DENOISE_FILTER: &'static str = "hqdn3d=1.5:1.5:6:6";
    pub const SHARPEN_FILTER: &'static str = "unsharp=5:5:0.8:3:3:0.4";
    pub const COLOR_FILTER: &'static str = "eq=contrast=1.05:brightness=0.02:saturation=1.05";

    /// Comma-joined filter graph, or `None` when every filter is disabled
    pub fn filter_chain(&self) -> Option<String> {
        let filters: Vec<&str> = [
            (self.denoise, Self::DENOISE_FILTER),
            (self.sharpen, Self::SHARPEN_FILTER),
            (self.color_correct, Self::COLOR_FILTER),
        ]
        .into_iter()
        .filter_map(|(enabled, filter)| enabled.then_some(filter))
        .collect();

        if filters.is_empty() {
            None
        } else {
            Some(filters.join(","))
        }
    }
}

/// Per-job step configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepParams {
    #[serde(default)]
    pub enhance: EnhanceOptions,
    /// Falls back to the configured default when unset
    pub audio_format: Option<AudioFormat>,
    /// Falls back to the configured default when unset
    pub short_duration_secs: Option<u32>,
    /// Replacement audio for `replace_audio`
    pub voice: Option<PathBuf>,
}

/// One fully resolved transcoder invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StepSpec {
    Enhance {
        input: PathBuf,
        output: PathBuf,
        options: EnhanceOptions,
    },
    ExtractAudio {
        input: PathBuf,
        output: PathBuf,
        format: AudioFormat,
    },
    CreateShort {
        input: PathBuf,
        output: PathBuf,
        duration_secs: u32,
    },
    ReplaceAudio {
        video: PathBuf,
        audio: PathBuf,
        output: PathBuf,
    },
}

impl StepSpec {
    pub fn step(&self) -> StepKind {
        match self {
            StepSpec::Enhance { .. } => StepKind::Enhance,
            StepSpec::ExtractAudio { .. } => StepKind::ExtractAudio,
            StepSpec::CreateShort { .. } => StepKind::CreateShort,
            StepSpec::ReplaceAudio { .. } => StepKind::ReplaceAudio,
        }
    }

    pub fn output(&self) -> &Path {
        match self {
            StepSpec::Enhance { output, .. }
            | StepSpec::ExtractAudio { output, .. }
            | StepSpec::CreateShort { output, .. }
            | StepSpec::ReplaceAudio { output, .. } => output,
        }
    }

    /// Reject parameters the transcoder would choke on before spawning it
    pub fn validate(&self) -> crate::error::Result<()> {
        if let StepSpec::CreateShort { duration_secs: 0, .. } = self {
            return Err(PipelineError::InvalidParameter {
                step: StepKind::CreateShort,
                message: "short clip duration must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
