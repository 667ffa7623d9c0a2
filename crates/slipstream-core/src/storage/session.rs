use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::telemetry::Snapshot;

/// Archives every completed run as a timestamped JSON file under a
/// per-day directory, independent of whether the run improved any best
/// split. The ghost file only ever keeps the latest run; the archive is
/// where the rest go.
pub struct RunArchive {
    base_dir: PathBuf,
}

impl RunArchive {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn archive_run(&self, frames: &[Snapshot]) -> Result<PathBuf> {
        let now: DateTime<Local> = Local::now();
        let day_dir = self.base_dir.join(now.format("%Y-%m-%d").to_string());
        fs::create_dir_all(&day_dir)?;

        let path = day_dir.join(format!("run_{}.json", now.format("%H%M%S")));
        let content = serde_json::to_string_pretty(frames)?;
        fs::write(&path, content)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_writes_dated_file() {
        let dir = TempDir::new().unwrap();
        let archive = RunArchive::new(dir.path());

        let frames = vec![
            Snapshot::light(Some(0), Some(0.0)),
            Snapshot::light(Some(750), Some(100.0)),
        ];
        let path = archive.archive_run(&frames).unwrap();

        assert!(path.starts_with(dir.path()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("run_"));

        let content = fs::read_to_string(&path).unwrap();
        let back: Vec<Snapshot> = serde_json::from_str(&content).unwrap();
        assert_eq!(back, frames);
    }
}
