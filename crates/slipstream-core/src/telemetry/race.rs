//! Race lifecycle tracking
//!
//! A state machine over repeated captures: Idle (no base pointer) ->
//! Waiting (base live, polling for a start) -> Recording (appending every
//! frame) -> back to Idle once the run completes or is lost. Start and end
//! detection are injected predicates so better signals can replace the
//! current stand-ins without touching the machine.

use tracing::{debug, info, warn};

use crate::telemetry::extractor::Capture;
use crate::telemetry::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePhase {
    Idle,
    Waiting,
    Recording,
}

/// A named condition over the latest capture.
///
/// `provisional` predicates are proxies chosen for lack of a verified
/// signal; anything consuming one must treat it as replaceable, not as
/// ground truth.
#[derive(Clone, Copy)]
pub struct Predicate {
    name: &'static str,
    provisional: bool,
    check: fn(&Capture) -> bool,
}

impl Predicate {
    pub const fn verified(name: &'static str, check: fn(&Capture) -> bool) -> Self {
        Self {
            name,
            provisional: false,
            check,
        }
    }

    pub const fn provisional(name: &'static str, check: fn(&Capture) -> bool) -> Self {
        Self {
            name,
            provisional: true,
            check,
        }
    }

    pub fn eval(&self, capture: &Capture) -> bool {
        (self.check)(capture)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional
    }
}

/// Stand-in start signal: the race struct exists and reports a progress
/// value. A dedicated race-active flag should replace this once found.
pub fn default_start_predicate() -> Predicate {
    Predicate::provisional("base-live-and-progress-reported", |capture| {
        capture.base != 0
            && capture
                .snapshot
                .race_completion_pct
                .is_some_and(|p| p >= 0.0)
    })
}

/// Stand-in end signal: progress reached the finish line. A dedicated
/// end-of-race flag should replace this once found.
pub fn default_end_predicate() -> Predicate {
    Predicate::provisional("progress-at-finish", |capture| {
        capture
            .snapshot
            .race_completion_pct
            .is_some_and(|p| p >= 100.0)
    })
}

pub struct RaceLifecycle {
    phase: RacePhase,
    frames: Vec<Snapshot>,
    start: Predicate,
    end: Predicate,
}

impl RaceLifecycle {
    pub fn new() -> Self {
        Self::with_predicates(default_start_predicate(), default_end_predicate())
    }

    pub fn with_predicates(start: Predicate, end: Predicate) -> Self {
        if start.is_provisional() {
            debug!("Race start predicate '{}' is a provisional stand-in", start.name());
        }
        if end.is_provisional() {
            debug!("Race end predicate '{}' is a provisional stand-in", end.name());
        }
        Self {
            phase: RacePhase::Idle,
            frames: Vec::new(),
            start,
            end,
        }
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Feed the latest capture through the machine. Returns the completed
    /// session's frames when this capture ended a recording.
    pub fn advance(&mut self, capture: &Capture) -> Option<Vec<Snapshot>> {
        match self.phase {
            RacePhase::Idle => {
                if capture.base != 0 {
                    debug!("Race struct live, waiting for start");
                    self.phase = RacePhase::Waiting;
                }
                None
            }
            RacePhase::Waiting => {
                if capture.base == 0 {
                    self.phase = RacePhase::Idle;
                } else if self.start.eval(capture) {
                    info!("Race started, recording");
                    self.phase = RacePhase::Recording;
                    self.frames.clear();
                    self.frames.push(capture.snapshot.clone());
                }
                None
            }
            RacePhase::Recording => {
                if capture.base == 0 {
                    // Struct freed without an end signal (race quit, menu
                    // exit): a torn run has no best-split semantics.
                    warn!(
                        "Race struct lost mid-recording, discarding {} frames",
                        self.frames.len()
                    );
                    self.frames.clear();
                    self.phase = RacePhase::Idle;
                    return None;
                }

                self.frames.push(capture.snapshot.clone());
                if self.end.eval(capture) {
                    info!("Race ended after {} frames", self.frames.len());
                    self.phase = RacePhase::Idle;
                    return Some(std::mem::take(&mut self.frames));
                }
                None
            }
        }
    }

    /// Process loss: drop the session rather than flushing a torn race,
    /// and start over from Idle on the next attachment.
    pub fn reset(&mut self) {
        if self.phase == RacePhase::Recording {
            warn!(
                "Process lost mid-recording, discarding {} frames",
                self.frames.len()
            );
        }
        self.frames.clear();
        self.phase = RacePhase::Idle;
    }
}

impl Default for RaceLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
