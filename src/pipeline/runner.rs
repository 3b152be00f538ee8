use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::media::Transcoder;
use super::job::Job;
use super::manifest::{ArtifactRef, Manifest};
use super::step::{ArtifactRole, StepKind, StepParams, StepSpec};

/// Job submission: source file, requested step names and their parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub input: PathBuf,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub params: StepParams,
}

/// Files written for the caller. Removed again on drop unless the job commits.
#[derive(Debug, Default)]
struct JobOutputs {
    paths: Vec<PathBuf>,
    committed: bool,
}

impl JobOutputs {
    fn track(&mut self, path: &Path) {
        self.paths.push(path.to_path_buf());
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for JobOutputs {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed output of failed job: {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

/// The watermark-cleaned video every `final` is built from
enum Basis {
    Exposed(PathBuf),
    Intermediate(TempPath),
}

impl Basis {
    fn path(&self) -> &Path {
        match self {
            Basis::Exposed(path) => path.as_path(),
            Basis::Intermediate(temp) => &**temp,
        }
    }

    fn release(self) {
        if let Basis::Intermediate(temp) = self {
            let path = temp.to_path_buf();
            match temp.close() {
                Ok(()) => debug!("Removed intermediate artifact {}", path.display()),
                Err(e) => warn!("Failed to remove intermediate artifact {}: {}", path.display(), e),
            }
        }
    }
}

pub struct PipelineRunner {
    config: Config,
    transcoder: Arc<dyn Transcoder>,
}

impl PipelineRunner {
    pub fn new(config: Config, transcoder: Arc<dyn Transcoder>) -> Self {
        Self { config, transcoder }
    }

    /// Run a job from step names. Unknown names reject the job before anything runs.
    pub async fn run(&self, request: &JobRequest) -> Result<Manifest> {
        let steps = Job::parse_steps(&request.steps).inspect_err(|e| {
            error!("Rejected job for {}: {}", request.input.display(), e);
        })?;

        self.run_steps(&request.input, steps, &request.params).await
    }

    pub async fn run_steps(
        &self,
        input: &Path,
        steps: BTreeSet<StepKind>,
        params: &StepParams,
    ) -> Result<Manifest> {
        validate_input(input).await.inspect_err(|e| {
            error!("Rejected job for {}: {}", input.display(), e);
        })?;

        let job = Job::new(input, steps);
        info!(
            "Starting job {} for {} (steps: {:?})",
            job.id,
            input.display(),
            job.steps.iter().map(StepKind::as_str).collect::<Vec<_>>()
        );

        let storage = &self.config.storage;
        fs::create_dir_all(&storage.output_dir).await?;
        fs::create_dir_all(&storage.temp_dir).await?;

        let mut outputs = JobOutputs::default();
        let mut manifest = Manifest::new(job.id, input.display().to_string(), job.created_at);

        let basis = match self.build_basis(&job, &mut outputs).await {
            Ok(basis) => basis,
            Err(e) => {
                error!("Job {} failed: {} could not be produced: {}", job.id, ArtifactRole::Final, e);
                return Err(e);
            }
        };
        if let Basis::Exposed(path) = &basis {
            self.record(&mut manifest, ArtifactRole::NoWatermark, path);
        }

        let siblings = self.sibling_specs(&job, params)?;
        for spec in &siblings {
            outputs.track(spec.output());
        }

        for (step, result) in self.run_siblings(&job, siblings).await {
            match result {
                Ok(path) => self.record(&mut manifest, step.role(), &path),
                Err(e) => {
                    manifest.failures.insert(step, e.to_string());
                }
            }
        }

        let final_path = job.artifact_path(
            &storage.output_dir,
            ArtifactRole::Final,
            &job.container_extension(),
        )?;
        outputs.track(&final_path);

        if let Err(e) = self
            .build_final(&job, params, basis.path(), &final_path, &mut manifest)
            .await
        {
            error!("Job {} failed: {} could not be produced: {}", job.id, ArtifactRole::Final, e);
            return Err(e);
        }
        self.record(&mut manifest, ArtifactRole::Final, &final_path);

        basis.release();
        outputs.commit();

        if manifest.is_complete() {
            info!("Job {} completed successfully", job.id);
        } else {
            warn!(
                "Job {} completed with {} failed step(s): {:?}",
                job.id,
                manifest.failures.len(),
                manifest.failures.keys().collect::<Vec<_>>()
            );
        }

        Ok(manifest)
    }

    fn record(&self, manifest: &mut Manifest, role: ArtifactRole, path: &Path) {
        manifest
            .downloads
            .insert(role, ArtifactRef::new(path, &self.config.storage.download_base));
    }

    /// Produce the watermark-cleaned video. It is a caller-visible artifact only
    /// when `remove_watermark` was requested, otherwise it lives in the temp dir.
    async fn build_basis(&self, job: &Job, outputs: &mut JobOutputs) -> Result<Basis> {
        let extension = job.container_extension();

        if job.requested(StepKind::RemoveWatermark) {
            let path = job.artifact_path(
                &self.config.storage.output_dir,
                ArtifactRole::NoWatermark,
                &extension,
            )?;
            outputs.track(&path);
            remove_watermark(job, &job.input, &path).await?;
            return Ok(Basis::Exposed(path));
        }

        let temp = tempfile::Builder::new()
            .prefix(&format!("{}_nowm_", job.token()))
            .suffix(&format!(".{}", extension))
            .tempfile_in(&self.config.storage.temp_dir)?
            .into_temp_path();
        remove_watermark(job, &job.input, &temp).await?;
        Ok(Basis::Intermediate(temp))
    }

    /// Specs for the requested steps that read the original input directly
    fn sibling_specs(&self, job: &Job, params: &StepParams) -> Result<Vec<StepSpec>> {
        let output_dir = &self.config.storage.output_dir;
        let mut specs = Vec::new();

        if job.requested(StepKind::Enhance) {
            specs.push(StepSpec::Enhance {
                input: job.input.clone(),
                output: job.artifact_path(output_dir, ArtifactRole::Enhanced, "mp4")?,
                options: params.enhance,
            });
        }

        if job.requested(StepKind::ExtractAudio) {
            let format = params
                .audio_format
                .unwrap_or(self.config.pipeline.audio_format);
            specs.push(StepSpec::ExtractAudio {
                input: job.input.clone(),
                output: job.artifact_path(output_dir, ArtifactRole::Audio, format.extension())?,
                format,
            });
        }

        if job.requested(StepKind::CreateShort) {
            specs.push(StepSpec::CreateShort {
                input: job.input.clone(),
                output: job.artifact_path(output_dir, ArtifactRole::Short, "mp4")?,
                duration_secs: params
                    .short_duration_secs
                    .unwrap_or(self.config.pipeline.short_duration_secs),
            });
        }

        Ok(specs)
    }

    async fn run_siblings(&self, job: &Job, specs: Vec<StepSpec>) -> Vec<(StepKind, Result<PathBuf>)> {
        if self.config.pipeline.parallel_siblings && specs.len() > 1 {
            debug!("Job {}: running {} sibling steps concurrently", job.id, specs.len());
            let mut specs = specs.into_iter();
            let (a, b, c) = tokio::join!(
                self.run_optional(job, specs.next()),
                self.run_optional(job, specs.next()),
                self.run_optional(job, specs.next()),
            );
            return [a, b, c].into_iter().flatten().collect();
        }

        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            let step = spec.step();
            results.push((step, self.run_step(job, spec).await));
        }
        results
    }

    async fn run_optional(&self, job: &Job, spec: Option<StepSpec>) -> Option<(StepKind, Result<PathBuf>)> {
        let spec = spec?;
        let step = spec.step();
        Some((step, self.run_step(job, spec).await))
    }

    /// One isolated transcoder step. A failure is logged and returned, and any
    /// partial output is removed.
    async fn run_step(&self, job: &Job, spec: StepSpec) -> Result<PathBuf> {
        let step = spec.step();
        info!("Job {}: starting {}", job.id, step);

        let result = match spec.validate() {
            Ok(()) => self.transcoder.invoke(&spec).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(path) => {
                info!("Job {}: {} completed -> {}", job.id, step, path.display());
                Ok(path)
            }
            Err(e) => {
                error!("Job {}: {} failed: {}", job.id, step, e);
                if let Err(remove_err) = fs::remove_file(spec.output()).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            "Job {}: failed to remove partial output {}: {}",
                            job.id,
                            spec.output().display(),
                            remove_err
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// `final` = basis + replacement audio when possible, otherwise a copy of the basis
    async fn build_final(
        &self,
        job: &Job,
        params: &StepParams,
        basis: &Path,
        final_path: &Path,
        manifest: &mut Manifest,
    ) -> Result<()> {
        if job.requested(StepKind::ReplaceAudio) {
            match resolve_voice(params.voice.as_deref()).await {
                Ok(voice) => {
                    let spec = StepSpec::ReplaceAudio {
                        video: basis.to_path_buf(),
                        audio: voice,
                        output: final_path.to_path_buf(),
                    };
                    match self.run_step(job, spec).await {
                        Ok(_) => return Ok(()),
                        Err(e) => {
                            warn!("Job {}: falling back to unmodified audio for {}", job.id, ArtifactRole::Final);
                            manifest.failures.insert(StepKind::ReplaceAudio, e.to_string());
                        }
                    }
                }
                Err(e) => {
                    warn!("Job {}: {}, skipping {}", job.id, e, StepKind::ReplaceAudio);
                    manifest.failures.insert(StepKind::ReplaceAudio, e.to_string());
                }
            }
        }

        fs::copy(basis, final_path).await?;
        Ok(())
    }
}

async fn validate_input(input: &Path) -> Result<()> {
    let metadata = fs::metadata(input).await.map_err(|e| {
        PipelineError::InvalidInput(format!("{}: {}", input.display(), e))
    })?;

    if !metadata.is_file() {
        return Err(PipelineError::InvalidInput(format!(
            "{} is not a regular file",
            input.display()
        )));
    }

    fs::File::open(input).await.map_err(|e| {
        PipelineError::InvalidInput(format!("{} is not readable: {}", input.display(), e))
    })?;

    Ok(())
}

async fn resolve_voice(voice: Option<&Path>) -> Result<PathBuf> {
    let voice = voice.ok_or_else(|| {
        PipelineError::DependencyUnavailable("no replacement audio supplied".to_string())
    })?;

    match fs::metadata(voice).await {
        Ok(metadata) if metadata.is_file() => Ok(voice.to_path_buf()),
        _ => Err(PipelineError::DependencyUnavailable(format!(
            "replacement audio not found: {}",
            voice.display()
        ))),
    }
}

/// Watermark removal. Currently a byte copy: one video in, one video out, same
/// container. A real implementation must keep that contract.
async fn remove_watermark(job: &Job, input: &Path, output: &Path) -> Result<()> {
    info!("Job {}: running watermark removal (copy-through)", job.id);

    fs::copy(input, output).await.map_err(|e| {
        error!("Job {}: {} failed: {}", job.id, StepKind::RemoveWatermark, e);
        PipelineError::StepFailed {
            step: StepKind::RemoveWatermark,
            message: e.to_string(),
        }
    })?;

    Ok(())
}
