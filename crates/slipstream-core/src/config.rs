//! Application configuration
//!
//! JSON file with full defaults: a missing file or a missing key never
//! blocks startup, and saving writes the complete current state back.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::memory::layout::timing;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Executable name of the game process.
    pub process_name: String,
    /// Module whose code is signature-scanned (normally the executable
    /// itself).
    pub module_name: String,
    /// Directory ghost files are kept in.
    pub ghost_dir: PathBuf,
    /// Ghost restored as active on startup.
    pub last_ghost_path: Option<PathBuf>,
    /// Ceiling rate of the snapshot poll thread (ms between captures).
    pub poll_interval_ms: u64,
    /// Cadence of the session-recording loop (ms).
    pub session_interval_ms: u64,
    /// Whether completed runs are archived alongside the ghost updates.
    pub archive_runs: bool,
    /// Directory for archived runs.
    pub archive_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process_name: "Asphalt9_Steam_x64_rtl.exe".to_string(),
            module_name: "Asphalt9_Steam_x64_rtl.exe".to_string(),
            ghost_dir: PathBuf::from("ghosts"),
            last_ghost_path: None,
            poll_interval_ms: timing::SNAPSHOT_POLL_INTERVAL_MS,
            session_interval_ms: timing::SESSION_POLL_INTERVAL_MS,
            archive_runs: true,
            archive_dir: PathBuf::from("runs"),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Config = serde_json::from_str(&content)?;
        debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Load, or fall back to defaults when the file is absent or broken.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                debug!(
                    "Using default config ({}: {})",
                    path.as_ref().display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.last_ghost_path = Some(PathBuf::from("ghosts/downtown.json"));
        config.archive_runs = false;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(
            loaded.last_ghost_path.as_deref(),
            Some(Path::new("ghosts/downtown.json"))
        );
        assert!(!loaded.archive_runs);
        assert_eq!(loaded.process_name, config.process_name);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"poll_interval_ms": 4}"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.poll_interval_ms, 4);
        assert_eq!(loaded.ghost_dir, PathBuf::from("ghosts"));
    }

    #[test]
    fn test_missing_file_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_or_default(dir.path().join("none.json"));
        assert_eq!(config.process_name, "Asphalt9_Steam_x64_rtl.exe");
    }
}
