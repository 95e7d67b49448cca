use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Deletes regular files under `dir` whose modification time is more than
/// `max_age` before `now`. Missing directories are skipped; per-file failures
/// are logged and do not stop the sweep.
pub fn sweep_expired(dir: &Path, max_age: Duration, now: SystemTime) -> Vec<PathBuf> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "sweep target missing; skipping");
        return Vec::new();
    }
    let mut removed = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|entry| match entry {
        Ok(entry) => Some(entry),
        Err(err) => {
            warn!("skipping unreadable entry: {err}");
            None
        }
    }) {
        if !entry.file_type().is_file() {
            continue;
        }
        let modified = match entry.metadata().map(|meta| meta.modified()) {
            Ok(Ok(modified)) => modified,
            Ok(Err(err)) => {
                warn!(path = %entry.path().display(), "no modification time: {err}");
                continue;
            }
            Err(err) => {
                warn!(path = %entry.path().display(), "failed to stat: {err}");
                continue;
            }
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age <= max_age {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                info!(path = %entry.path().display(), age = ?age, "removed expired output");
                removed.push(entry.into_path());
            }
            Err(err) => warn!(path = %entry.path().display(), "failed to remove: {err}"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_only_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        fs::write(nested.join("b.png"), b"b").unwrap();

        let now = SystemTime::now();
        assert!(sweep_expired(dir.path(), Duration::from_secs(600), now).is_empty());

        let later = now + Duration::from_secs(3600);
        let mut removed = sweep_expired(dir.path(), Duration::from_secs(600), later);
        removed.sort();
        assert_eq!(removed, vec![dir.path().join("a.png"), nested.join("b.png")]);
        assert!(nested.is_dir());
    }

    #[test]
    fn missing_dir_is_noop() {
        let removed = sweep_expired(
            Path::new("/definitely/not/here"),
            Duration::from_secs(1),
            SystemTime::now(),
        );
        assert!(removed.is_empty());
    }
}
