use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use super::step::{ArtifactRole, StepKind};

/// One pipeline invocation over one input file
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub input: PathBuf,
    pub steps: BTreeSet<StepKind>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new<P: Into<PathBuf>>(input: P, steps: BTreeSet<StepKind>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input: input.into(),
            steps,
            created_at: Utc::now(),
        }
    }

    /// Parse step names, failing on the first name outside the catalog.
    /// An empty name is outside the catalog too.
    pub fn parse_steps<I, S>(names: I) -> Result<BTreeSet<StepKind>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().parse::<StepKind>())
            .collect()
    }

    pub fn requested(&self, step: StepKind) -> bool {
        self.steps.contains(&step)
    }

    /// Per-job token embedded in every artifact name
    pub fn token(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    fn stem(&self) -> Result<String> {
        self.input
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "Invalid video filename: {}",
                    self.input.display()
                ))
            })
    }

    /// File extension of the input container, `mp4` when the input has none
    pub fn container_extension(&self) -> String {
        self.input
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "mp4".to_string())
    }

    /// Deterministic artifact file name: `{stem}_{tag}_{timestamp}_{token}.{ext}`
    pub fn artifact_name(&self, role: ArtifactRole, extension: &str) -> Result<String> {
        Ok(format!(
            "{}_{}_{}_{}.{}",
            self.stem()?,
            role.file_tag(),
            self.created_at.timestamp(),
            self.token(),
            extension
        ))
    }

    pub fn artifact_path(&self, dir: &Path, role: ArtifactRole, extension: &str) -> Result<PathBuf> {
        Ok(dir.join(self.artifact_name(role, extension)?))
    }
}
