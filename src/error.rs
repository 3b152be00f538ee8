use std::time::Duration;
use thiserror::Error;

use crate::pipeline::StepKind;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Step {step} failed: {message}")]
    StepFailed { step: StepKind, message: String },

    #[error("Step {step} timed out after {timeout:?}")]
    StepTimeout { step: StepKind, timeout: Duration },

    #[error("Invalid parameter for {step}: {message}")]
    InvalidParameter { step: StepKind, message: String },

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// True for errors that reject the whole job rather than a single step.
    pub fn is_job_level(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidInput(_) | PipelineError::UnknownStep(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
