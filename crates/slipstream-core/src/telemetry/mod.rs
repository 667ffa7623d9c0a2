mod enums;
mod extractor;
mod race;
mod snapshot;

pub use enums::{DriftState, NitroState};
pub use extractor::{Capture, Extractor, InstallReport};
pub use race::{
    Predicate, RaceLifecycle, RacePhase, default_end_predicate, default_start_predicate,
};
pub use snapshot::{Snapshot, Vec3, Velocity};
