//! # slipstream-core
//!
//! Core library for the Slipstream race telemetry tracker.
//!
//! This crate provides:
//! - Windows process memory access behind an explicit capability trait
//! - Signature scanning and pointer-capture trampoline injection
//! - Coherent telemetry snapshots with physics-tick deduplication
//! - Race lifecycle tracking over captured frames
//! - Ghost files with per-region best-split comparison
//!
//! The live process capability is Windows-only; everything above it is
//! platform-neutral and tested against a mock process.

pub mod config;
pub mod error;
pub mod ghost;
pub mod hook;
pub mod memory;
pub mod retry;
pub mod slipstream;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result};
pub use ghost::{BestSplit, GhostDocument, GhostStore, SplitDefinition, interpolate, merge_best_splits};
pub use hook::{
    CaptureRegister, HookSession, HookSignature, SignatureScanner, SignatureSet, TrampolineRecord,
    builtin_signatures, format_pattern, inject_pointer_capture, load_signatures, parse_pattern,
    save_signatures,
};
pub use memory::{ModuleRange, ProcessMemory, Protection, ReadMemory};
#[cfg(target_os = "windows")]
pub use memory::ProcessHandle;
pub use retry::{ExponentialBackoff, FixedDelay, NoRetry, RetryStrategy};
pub use slipstream::Slipstream;
pub use storage::RunArchive;
pub use telemetry::{
    Capture, DriftState, Extractor, InstallReport, NitroState, Predicate, RaceLifecycle,
    RacePhase, Snapshot, Vec3, Velocity,
};
