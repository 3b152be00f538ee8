use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::{StepKind, StepSpec};
use super::{CommandError, MediaCommand, MediaCommandBuilder, MediaProbe, Transcoder};

// Version checks and probes are quick; they never get the full step budget.
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Concrete transcoder (FFmpeg-based)
pub struct FfmpegTranscoder {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegTranscoder {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(config.clone());

        Self {
            config,
            command_builder,
        }
    }

    fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.config.step_timeout_secs)
    }

    /// Translate a resolved step into the ffmpeg command line that runs it
    pub fn command_for(&self, spec: &StepSpec) -> MediaCommand {
        match spec {
            StepSpec::Enhance {
                input,
                output,
                options,
            } => self.command_builder.enhance(input, output, options),
            StepSpec::ExtractAudio {
                input,
                output,
                format,
            } => self.command_builder.extract_audio(input, output, *format),
            StepSpec::CreateShort {
                input,
                output,
                duration_secs,
            } => self.command_builder.create_short(input, output, *duration_secs),
            StepSpec::ReplaceAudio {
                video,
                audio,
                output,
            } => self.command_builder.replace_audio(video, audio, output),
        }
    }

    /// Probe helper sharing this transcoder's binaries
    pub fn probe(&self) -> MediaProbe {
        MediaProbe::new(MediaCommandBuilder::new(self.config.clone()), QUERY_TIMEOUT)
    }
}

fn step_error(step: StepKind, error: CommandError) -> PipelineError {
    match error {
        CommandError::Timeout { timeout, .. } => PipelineError::StepTimeout { step, timeout },
        other => PipelineError::StepFailed {
            step,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn invoke(&self, spec: &StepSpec) -> Result<PathBuf> {
        spec.validate()?;

        let step = spec.step();
        let output = spec.output().to_path_buf();

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let command = self.command_for(spec);
        info!("Running {} -> {}", step, output.display());

        command
            .execute(self.step_timeout())
            .await
            .map_err(|e| step_error(step, e))?;

        // ffmpeg occasionally exits 0 without writing anything (e.g. no mappable streams)
        let written = fs::metadata(&output).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(PipelineError::StepFailed {
                step,
                message: format!("transcoder produced no output at {}", output.display()),
            });
        }

        debug!("{} wrote {} bytes", step, written);
        Ok(output)
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder
            .version_check()
            .capture(QUERY_TIMEOUT)
            .await
            .map_err(|e| PipelineError::Config(format!("Media processor not available: {}", e)))?;

        info!("Media processor is available");
        Ok(())
    }

    async fn version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let stdout = self
            .command_builder
            .version_check()
            .capture(QUERY_TIMEOUT)
            .await
            .map_err(|e| PipelineError::Config(format!("Media processor version check failed: {}", e)))?;

        Ok(stdout
            .lines()
            .next()
            .unwrap_or("Unknown version")
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ArtifactRole, AudioFormat, Job};

    fn missing_binary() -> FfmpegTranscoder {
        FfmpegTranscoder::new(MediaConfig {
            binary_path: "/nonexistent/ffmpeg".to_string(),
            ..MediaConfig::default()
        })
    }

    #[test]
    fn test_command_for_dispatches_per_step() {
        let transcoder = FfmpegTranscoder::new(MediaConfig::default());
        let spec = StepSpec::ExtractAudio {
            input: PathBuf::from("in.mp4"),
            output: PathBuf::from("out.m4a"),
            format: AudioFormat::Aac,
        };

        let cmd = transcoder.command_for(&spec);
        assert_eq!(cmd.description, "Audio extraction");
        assert!(cmd.args.windows(2).any(|w| w[0] == "-c:a" && w[1] == "aac"));
    }

    #[test]
    fn test_final_for_webm_upload_muxes_opus() {
        let job = Job::new("uploads/upload.webm", Default::default());
        let output = job
            .artifact_path(std::path::Path::new("outputs"), ArtifactRole::Final, &job.container_extension())
            .unwrap();
        let spec = StepSpec::ReplaceAudio {
            video: PathBuf::from("temp/upload_nowm.webm"),
            audio: PathBuf::from("voice.wav"),
            output,
        };

        let cmd = FfmpegTranscoder::new(MediaConfig::default()).command_for(&spec);
        assert!(cmd.args.last().unwrap().ends_with(".webm"));
        assert!(cmd.args.windows(2).any(|w| w[0] == "-c:a" && w[1] == "libopus"));
        assert!(cmd.args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "copy"));
    }

    #[test]
    fn test_timeout_maps_to_step_timeout() {
        let err = step_error(
            StepKind::Enhance,
            CommandError::Timeout {
                description: "Video enhancement".to_string(),
                timeout: Duration::from_millis(1500),
            },
        );
        assert!(matches!(err, PipelineError::StepTimeout { step: StepKind::Enhance, .. }));
        assert_eq!(err.to_string(), "Step enhance timed out after 1.5s");
    }

    #[tokio::test]
    async fn test_invalid_parameter_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let spec = StepSpec::CreateShort {
            input: dir.path().join("in.mp4"),
            output: dir.path().join("short.mp4"),
            duration_secs: 0,
        };

        let err = missing_binary().invoke(&spec).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_step_failure() {
        let dir = tempfile::tempdir().unwrap();
        let spec = StepSpec::Enhance {
            input: dir.path().join("in.mp4"),
            output: dir.path().join("nested").join("out.mp4"),
            options: Default::default(),
        };

        let err = missing_binary().invoke(&spec).await.unwrap_err();
        assert!(matches!(err, PipelineError::StepFailed { step: StepKind::Enhance, .. }));
        assert!(missing_binary().check_availability().await.is_err());
    }
}
