// Job pipeline
//
// One input file goes through a fixed step catalog. Each requested step
// writes its own artifact; failures are isolated per step and surface in
// the manifest instead of aborting the job.
// - step: catalog, parameters and resolved transcoder invocations
// - job: identity and artifact naming
// - manifest: what the caller gets back
// - runner: orchestration and cleanup

pub mod job;
pub mod manifest;
pub mod runner;
pub mod step;

pub use job::Job;
pub use manifest::{ArtifactRef, Manifest};
pub use runner::{JobRequest, PipelineRunner};
pub use step::*;
