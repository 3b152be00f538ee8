use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{PipelineError, Result};
use super::commands::MediaCommandBuilder;

// ffprobe -print_format json output, only the fields we read
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

/// Container-level facts about one media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub format_name: Option<String>,
    pub video_streams: usize,
    pub audio_streams: usize,
    pub codecs: Vec<String>,
}

impl MediaInfo {
    pub fn parse(json: &str) -> Result<Self> {
        let output: ProbeOutput = serde_json::from_str(json)?;

        let format = output
            .format
            .ok_or_else(|| PipelineError::Probe("ffprobe output has no format section".to_string()))?;

        let duration_secs = format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let count = |kind: &str| {
            output
                .streams
                .iter()
                .filter(|s| s.codec_type.as_deref() == Some(kind))
                .count()
        };

        Ok(Self {
            duration_secs,
            format_name: format.format_name,
            video_streams: count("video"),
            audio_streams: count("audio"),
            codecs: output
                .streams
                .iter()
                .filter_map(|s| s.codec_name.clone())
                .collect(),
        })
    }

    pub fn stream_count(&self) -> usize {
        self.video_streams + self.audio_streams
    }
}

/// ffprobe wrapper
pub struct MediaProbe {
    builder: MediaCommandBuilder,
    timeout: Duration,
}

impl MediaProbe {
    pub fn new(builder: MediaCommandBuilder, timeout: Duration) -> Self {
        Self { builder, timeout }
    }

    pub async fn inspect(&self, path: &Path) -> Result<MediaInfo> {
        debug!("Probing {}", path.display());

        let json = self
            .builder
            .probe(path)
            .capture(self.timeout)
            .await
            .map_err(|e| PipelineError::Probe(e.to_string()))?;

        MediaInfo::parse(&json)
    }
}
