//! Main application object
//!
//! `Slipstream` owns one process attachment and everything layered on it:
//! the extractor with its hook session, the race lifecycle, the active
//! ghost, and the run archive. The presentation layer talks to this
//! surface only — never to raw addresses or signatures. The whole object
//! is rebuilt on re-attachment, which is what invalidates the old hook
//! session's records.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::ghost::{GhostDocument, GhostStore, SplitDefinition};
use crate::hook::SignatureSet;
use crate::memory::ProcessMemory;
use crate::storage::RunArchive;
use crate::telemetry::{
    Capture, Extractor, InstallReport, RaceLifecycle, Snapshot, default_start_predicate,
};

pub struct Slipstream<P: ProcessMemory> {
    extractor: Arc<Extractor<P>>,
    lifecycle: RaceLifecycle,
    ghosts: GhostStore,
    archive: Option<RunArchive>,
}

impl<P: ProcessMemory> Slipstream<P> {
    pub fn new(extractor: Extractor<P>, config: &Config) -> Self {
        let archive = config
            .archive_runs
            .then(|| RunArchive::new(&config.archive_dir));
        Self {
            extractor: Arc::new(extractor),
            lifecycle: RaceLifecycle::new(),
            ghosts: GhostStore::new(),
            archive,
        }
    }

    pub fn extractor(&self) -> &Extractor<P> {
        &self.extractor
    }

    /// Shared handle for the poll thread; captures are serialized inside
    /// the extractor, so concurrent use stays coherent.
    pub fn extractor_handle(&self) -> Arc<Extractor<P>> {
        Arc::clone(&self.extractor)
    }

    pub fn is_attached(&self) -> bool {
        self.extractor.is_attached()
    }

    /// Install trampolines from the signature table. Must run before the
    /// poll threads start; the extractor serializes it against captures
    /// either way.
    pub fn install_hooks(&self, signatures: &SignatureSet) -> Result<InstallReport> {
        self.extractor.install_hooks(signatures)
    }

    pub fn capture(&self) -> Capture {
        self.extractor.capture()
    }

    pub fn get_snapshot(&self) -> Snapshot {
        self.extractor.get_snapshot()
    }

    /// Block (polling) until a race starts, `cancel` is set, or the
    /// process disappears.
    pub fn wait_for_race_start(&self, cancel: &AtomicBool) -> bool {
        self.extractor
            .wait_for_race_start(&default_start_predicate(), cancel)
    }

    /// One step of the session-recording loop: capture, advance the
    /// lifecycle, and hand back a completed run when this step finished
    /// one. Process loss resets the lifecycle (discarding any partial
    /// session) and reports nothing.
    pub fn poll_session(&mut self) -> Option<Vec<Snapshot>> {
        if !self.extractor.is_attached() {
            self.lifecycle.reset();
            return None;
        }
        let capture = self.extractor.capture();
        self.lifecycle.advance(&capture)
    }

    /// Persist a completed run: archived (when enabled), then merged into
    /// the ghost at `path`.
    pub fn save_race_data<Q: AsRef<Path>>(&mut self, path: Q, frames: &[Snapshot]) -> Result<()> {
        if let Some(archive) = &self.archive {
            match archive.archive_run(frames) {
                Ok(archived) => debug!("Archived run to {}", archived.display()),
                Err(e) => warn!("Run archive failed: {}", e),
            }
        }
        self.ghosts.save_race_data(path, frames)
    }

    pub fn load_ghost<Q: AsRef<Path>>(&mut self, path: Q) -> Result<&GhostDocument> {
        self.ghosts.load_ghost(path)
    }

    pub fn create_ghost<Q: AsRef<Path>>(
        &mut self,
        path: Q,
        splits: Vec<SplitDefinition>,
    ) -> Result<&GhostDocument> {
        self.ghosts.create_ghost(path, splits)
    }

    pub fn get_splits(&self) -> Vec<SplitDefinition> {
        self.ghosts.get_splits()
    }

    pub fn set_splits(&mut self, splits: Vec<SplitDefinition>) -> Result<()> {
        self.ghosts.set_splits(splits)
    }

    pub fn interpolate_ghost_timer(&self, race_completion_pct: f64) -> Option<f64> {
        self.ghosts.interpolate_ghost_timer(race_completion_pct)
    }

    pub fn ghosts(&self) -> &GhostStore {
        &self.ghosts
    }
}

#[cfg(target_os = "windows")]
impl Slipstream<crate::memory::ProcessHandle> {
    /// Attach to the running game process named in the config.
    pub fn attach(config: &Config) -> Result<Self> {
        let process =
            crate::memory::ProcessHandle::find_and_open(&config.process_name, &config.module_name)?;
        Ok(Self::new(Extractor::new(process), config))
    }
}
