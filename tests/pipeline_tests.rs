//! Pipeline behavior through the public API with an in-process transcoder

use assert_fs::prelude::*;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use vidpipe::config::Config;
use vidpipe::error::{PipelineError, Result};
use vidpipe::media::Transcoder;
use vidpipe::pipeline::{ArtifactRole, JobRequest, PipelineRunner, StepKind, StepParams, StepSpec};

/// Writes `<step>:<input bytes>` so outputs stay traceable to their source
#[derive(Default)]
struct TaggingTranscoder {
    calls: AtomicUsize,
}

#[async_trait]
impl Transcoder for TaggingTranscoder {
    async fn invoke(&self, spec: &StepSpec) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let source = match spec {
            StepSpec::Enhance { input, .. }
            | StepSpec::ExtractAudio { input, .. }
            | StepSpec::CreateShort { input, .. } => input,
            StepSpec::ReplaceAudio { video, .. } => video,
        };
        let mut bytes = format!("{}:", spec.step()).into_bytes();
        bytes.extend(tokio::fs::read(source).await?);
        tokio::fs::write(spec.output(), bytes).await?;
        Ok(spec.output().to_path_buf())
    }

    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }

    async fn version_info(&self) -> Result<String> {
        Ok("tagging transcoder".to_string())
    }
}

fn runner_in(root: &assert_fs::TempDir, transcoder: Arc<TaggingTranscoder>) -> PipelineRunner {
    let mut config = Config::default();
    config.storage.output_dir = root.path().join("outputs");
    config.storage.temp_dir = root.path().join("temp");
    PipelineRunner::new(config, transcoder)
}

#[tokio::test]
async fn siblings_read_the_original_input() {
    let root = assert_fs::TempDir::new().unwrap();
    let input = root.child("lecture.mov");
    input.write_binary(b"ORIGINAL").unwrap();

    let runner = runner_in(&root, Arc::new(TaggingTranscoder::default()));
    let request = JobRequest {
        input: input.path().to_path_buf(),
        steps: vec!["enhance".into(), "extract_audio".into(), "create_short".into()],
        params: StepParams::default(),
    };

    let manifest = runner.run(&request).await.unwrap();

    for (role, step) in [
        (ArtifactRole::Enhanced, StepKind::Enhance),
        (ArtifactRole::Audio, StepKind::ExtractAudio),
        (ArtifactRole::Short, StepKind::CreateShort),
    ] {
        let bytes = std::fs::read(&manifest.get(role).unwrap().path).unwrap();
        assert_eq!(bytes, format!("{}:ORIGINAL", step).into_bytes());
    }

    // final keeps the source container when built from the cleaned copy
    let final_ref = manifest.get(ArtifactRole::Final).unwrap();
    assert_eq!(final_ref.path.extension().unwrap(), "mov");
    assert_eq!(std::fs::read(&final_ref.path).unwrap(), b"ORIGINAL");
    assert_eq!(std::fs::read(input.path()).unwrap(), b"ORIGINAL");
}

#[tokio::test]
async fn concurrent_jobs_do_not_collide() {
    let root = assert_fs::TempDir::new().unwrap();
    let input = root.child("clip.mp4");
    input.write_binary(b"clip").unwrap();
    let voice = root.child("voice.mp3");
    voice.write_binary(b"voice").unwrap();

    let transcoder = Arc::new(TaggingTranscoder::default());
    let runner = runner_in(&root, transcoder.clone());
    let steps: BTreeSet<StepKind> = StepKind::ALL.into_iter().collect();
    let params = StepParams {
        voice: Some(voice.path().to_path_buf()),
        ..StepParams::default()
    };

    let (a, b, c) = tokio::join!(
        runner.run_steps(input.path(), steps.clone(), &params),
        runner.run_steps(input.path(), steps.clone(), &params),
        runner.run_steps(input.path(), steps.clone(), &params),
    );

    let mut seen = BTreeSet::new();
    for manifest in [a.unwrap(), b.unwrap(), c.unwrap()] {
        assert_eq!(manifest.downloads.len(), 5);
        for reference in manifest.downloads.values() {
            assert!(seen.insert(reference.path.clone()), "duplicate {:?}", reference.path);
            assert!(reference.path.exists());
        }
    }
    // enhance, extract_audio, create_short and replace_audio per job
    assert_eq!(transcoder.calls.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn unknown_step_never_reaches_the_transcoder() {
    let root = assert_fs::TempDir::new().unwrap();
    let input = root.child("clip.mp4");
    input.write_binary(b"clip").unwrap();

    let transcoder = Arc::new(TaggingTranscoder::default());
    let runner = runner_in(&root, transcoder.clone());
    let request = JobRequest {
        input: input.path().to_path_buf(),
        steps: vec!["create_short".into(), "colorize".into()],
        params: StepParams::default(),
    };

    let err = runner.run(&request).await.unwrap_err();
    assert!(matches!(err, PipelineError::UnknownStep(_)));
    assert_eq!(transcoder.calls.load(Ordering::SeqCst), 0);
    assert!(!root.path().join("outputs").exists());
}

#[tokio::test]
async fn manifest_serializes_for_the_download_collaborator() {
    let root = assert_fs::TempDir::new().unwrap();
    let input = root.child("clip.mp4");
    input.write_binary(b"clip").unwrap();

    let runner = runner_in(&root, Arc::new(TaggingTranscoder::default()));
    let request: JobRequest = serde_json::from_value(serde_json::json!({
        "input": input.path(),
        "steps": ["remove_watermark", "replace_audio"],
    }))
    .unwrap();

    let manifest = runner.run(&request).await.unwrap();
    let json = serde_json::to_value(&manifest).unwrap();

    let url = json["downloads"]["final"]["download_url"].as_str().unwrap();
    assert!(url.starts_with("/download/clip_final_"));
    assert!(json["downloads"].get("enhanced").is_none());
    assert!(
        json["failures"]["replace_audio"]
            .as_str()
            .unwrap()
            .contains("no replacement audio")
    );
}
