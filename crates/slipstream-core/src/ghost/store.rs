use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::ghost::compare::{interpolate, merge_best_splits};
use crate::ghost::document::{GhostDocument, SplitDefinition};
use crate::telemetry::Snapshot;

/// Holds the one active ghost used for live comparison. The presentation
/// layer selects which ghost is active via `load_ghost`/`create_ghost`;
/// everything else goes through this surface and never touches the file
/// layout directly.
#[derive(Debug, Default)]
pub struct GhostStore {
    active: Option<GhostDocument>,
    active_path: Option<PathBuf>,
}

impl GhostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a ghost file and make it the active comparison target.
    pub fn load_ghost<P: AsRef<Path>>(&mut self, path: P) -> Result<&GhostDocument> {
        let document = GhostDocument::load(&path)?;
        self.active = Some(document);
        self.active_path = Some(path.as_ref().to_path_buf());
        Ok(self.active.as_ref().unwrap())
    }

    /// Create a fresh ghost file and make it active.
    pub fn create_ghost<P: AsRef<Path>>(
        &mut self,
        path: P,
        splits: Vec<SplitDefinition>,
    ) -> Result<&GhostDocument> {
        let document = GhostDocument::create(&path, splits)?;
        self.active = Some(document);
        self.active_path = Some(path.as_ref().to_path_buf());
        Ok(self.active.as_ref().unwrap())
    }

    /// Flush a finished run into the ghost at `path`: `race_data` is
    /// replaced wholesale, best splits are recomputed region by region,
    /// and the result is persisted and made active.
    ///
    /// A missing or unreadable file starts from an empty document here —
    /// unlike `load_ghost`, this is the write path and refusing to save
    /// the run would lose data the user just produced.
    pub fn save_race_data<P: AsRef<Path>>(&mut self, path: P, frames: &[Snapshot]) -> Result<()> {
        let path = path.as_ref();
        let mut document = match GhostDocument::load(path) {
            Ok(document) => document,
            Err(e) if e.is_ghost_not_found() => GhostDocument::default(),
            Err(Error::GhostMalformed { message, .. }) => {
                warn!(
                    "Existing ghost {} is malformed ({}), starting fresh",
                    path.display(),
                    message
                );
                GhostDocument::default()
            }
            Err(e) => return Err(e),
        };

        document.best_splits = merge_best_splits(&document.best_splits, frames, &document.splits);
        document.race_data = frames.to_vec();
        document.save(path)?;

        info!(
            "Saved run to {} ({} frames, {} best-split points)",
            path.display(),
            frames.len(),
            document.best_splits.len()
        );

        self.active = Some(document);
        self.active_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Splits of the active ghost; empty when none is loaded.
    pub fn get_splits(&self) -> Vec<SplitDefinition> {
        self.active
            .as_ref()
            .map(|g| g.splits.clone())
            .unwrap_or_default()
    }

    /// Replace the active ghost's splits and persist. Stored best splits
    /// keep their old region layout until the next run is saved.
    pub fn set_splits(&mut self, splits: Vec<SplitDefinition>) -> Result<()> {
        let (Some(active), Some(path)) = (self.active.as_mut(), self.active_path.as_ref()) else {
            return Ok(());
        };
        active.splits = splits;
        active.save(path)
    }

    /// Ghost timer at the given live progress, from the active ghost's
    /// best splits. `None` when no ghost is active or it has no best
    /// splits yet.
    pub fn interpolate_ghost_timer(&self, race_completion_pct: f64) -> Option<f64> {
        let active = self.active.as_ref()?;
        interpolate(&active.best_splits, race_completion_pct)
    }

    pub fn active(&self) -> Option<&GhostDocument> {
        self.active.as_ref()
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active_path.as_deref()
    }
}
