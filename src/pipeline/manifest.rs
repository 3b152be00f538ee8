use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::step::{ArtifactRole, StepKind};

/// Retrievable reference to one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub download_url: String,
}

impl ArtifactRef {
    pub fn new(path: &Path, download_base: &str) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            download_url: format!("{}{}", download_base, file_name),
        }
    }
}

/// What a finished job hands back to its caller.
///
/// Roles for steps that were never requested are absent from `downloads`;
/// steps that were requested but failed show up in `failures` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub job_id: Uuid,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub downloads: BTreeMap<ArtifactRole, ArtifactRef>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub failures: BTreeMap<StepKind, String>,
}

impl Manifest {
    pub fn new(job_id: Uuid, source: String, created_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            source,
            created_at,
            downloads: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    pub fn get(&self, role: ArtifactRole) -> Option<&ArtifactRef> {
        self.downloads.get(&role)
    }

    pub fn roles(&self) -> Vec<ArtifactRole> {
        self.downloads.keys().copied().collect()
    }

    pub fn failure(&self, step: StepKind) -> Option<&str> {
        self.failures.get(&step).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url_uses_file_name() {
        let reference = ArtifactRef::new(Path::new("outputs/a_final_1_deadbeef.mp4"), "/download/");
        assert_eq!(reference.download_url, "/download/a_final_1_deadbeef.mp4");
    }

    #[test]
    fn test_json_shape() {
        let mut manifest = Manifest::new(Uuid::nil(), "clip.mp4".to_string(), Utc::now());
        manifest.downloads.insert(
            ArtifactRole::NoWatermark,
            ArtifactRef::new(Path::new("out/clip_nowm.mp4"), "/download/"),
        );

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            value["downloads"]["no_watermark"]["download_url"],
            "/download/clip_nowm.mp4"
        );
        assert!(value["downloads"].get("final").is_none());
        assert!(value.get("failures").is_none());

        manifest
            .failures
            .insert(StepKind::CreateShort, "boom".to_string());
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["failures"]["create_short"], "boom");
        assert!(!manifest.is_complete());
    }
}
