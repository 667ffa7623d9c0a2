use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::telemetry::Snapshot;

/// User-configured split boundary: the named region ends where
/// `race_completion` (percent) is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDefinition {
    pub name: String,
    pub race_completion: f64,
}

/// One comparison point in the assembled best-splits timeline. Only the
/// two fields the live delta needs; richer frame data stays in
/// `race_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestSplit {
    pub timer_value: i64,
    pub race_completion_pct: f64,
}

/// On-disk ghost file.
///
/// `best_splits` is always a concatenation of per-region best
/// sub-sequences, each re-based so its region timeline starts at 0.
/// `race_data` always mirrors the last completed run, whether or not it
/// improved anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GhostDocument {
    pub splits: Vec<SplitDefinition>,
    pub best_splits: Vec<BestSplit>,
    pub race_data: Vec<Snapshot>,
}

impl GhostDocument {
    /// Load a ghost from disk.
    ///
    /// A missing file and a structurally broken one are distinct, typed
    /// failures: silently starting a fresh ghost would throw away the
    /// user's best times.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::GhostNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let document: GhostDocument =
            serde_json::from_str(&content).map_err(|e| Error::GhostMalformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        info!(
            "Loaded ghost {} ({} frames, {} best-split points)",
            path.display(),
            document.race_data.len(),
            document.best_splits.len()
        );
        Ok(document)
    }

    /// Create a new empty ghost on disk with the given splits.
    pub fn create<P: AsRef<Path>>(path: P, splits: Vec<SplitDefinition>) -> Result<Self> {
        let document = GhostDocument {
            splits,
            ..Default::default()
        };
        document.save(&path)?;
        info!("Created ghost {}", path.as_ref().display());
        Ok(document)
    }

    /// Persist to disk, creating parent directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
