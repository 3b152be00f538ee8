// Transcoder abstraction
//
// The pipeline never talks to ffmpeg directly. Every step goes through the
// narrow `Transcoder` trait so the backend can be swapped or mocked:
// - commands: argument assembly and process execution
// - processor: ffmpeg-backed implementation
// - probe: ffprobe-backed inspection

pub mod commands;
pub mod probe;
pub mod processor;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub use commands::*;
pub use probe::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::pipeline::StepSpec;

/// External media tool driven by the pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run one step and return the path of the artifact it wrote
    async fn invoke(&self, spec: &StepSpec) -> Result<PathBuf>;

    /// Check if the transcoder binary can be executed
    async fn check_availability(&self) -> Result<()>;

    /// First line of the transcoder's version banner
    async fn version_info(&self) -> Result<String>;
}

/// Factory for creating transcoder instances
pub struct TranscoderFactory;

impl TranscoderFactory {
    /// Create the default transcoder implementation (FFmpeg-based)
    pub fn create_transcoder(config: MediaConfig) -> Arc<dyn Transcoder> {
        Arc::new(processor::FfmpegTranscoder::new(config))
    }
}
