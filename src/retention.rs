use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Remove regular files older than `max_age` directly inside each directory.
///
/// Missing directories are skipped. Files that cannot be inspected or removed
/// are logged and left in place. Returns the number of files removed.
pub fn sweep_expired(dirs: &[PathBuf], max_age: Duration) -> u64 {
    let now = SystemTime::now();
    let mut removed = 0;

    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let modified = match entry.metadata().map(|m| m.modified()) {
                Ok(Ok(modified)) => modified,
                Ok(Err(e)) => {
                    warn!("Cannot read modification time of {}: {}", path.display(), e);
                    continue;
                }
                Err(e) => {
                    warn!("Cannot read metadata of {}: {}", path.display(), e);
                    continue;
                }
            };

            // Clock skew can put mtime in the future; treat that as brand new.
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age < max_age {
                continue;
            }

            match std::fs::remove_file(path) {
                Ok(()) => {
                    info!("Removed expired file {} (age {}s)", path.display(), age.as_secs());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove expired file {}: {}", path.display(), e),
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_age_removes_everything_but_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.mp4"), b"c").unwrap();

        let removed = sweep_expired(&[dir.path().to_path_buf()], Duration::ZERO);

        assert_eq!(removed, 2);
        assert!(!dir.path().join("a.mp4").exists());
        assert!(dir.path().join("nested").join("c.mp4").exists());
    }

    #[test]
    fn test_recent_files_survive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fresh.mp4"), b"fresh").unwrap();

        let removed = sweep_expired(
            &[dir.path().to_path_buf(), dir.path().join("missing")],
            Duration::from_secs(3600),
        );

        assert_eq!(removed, 0);
        assert!(dir.path().join("fresh.mp4").exists());
    }
}
