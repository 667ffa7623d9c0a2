//! Memory layout constants for the game's race-data structures
//!
//! This module centralizes the struct offsets read through the captured
//! base pointers. The values come from the community offset tables and are
//! versioned alongside the hook signatures: adding a field means adding a
//! constant here and one typed reader in the extractor, nothing else.

/// Offsets inside the race-data struct (base captured by the timer hook).
pub mod race {
    /// Race timer, 4-byte integer (ms or engine ticks, unverified unit).
    pub const TIMER: u64 = 0xA0;

    /// Race completion, float.
    pub const PROGRESS: u64 = 0x1D8;

    /// Engine RPM, float.
    pub const RPM: u64 = 0x1B8;

    /// Current gear, 4-byte integer. Shares the timer offset: the gearbox
    /// hook fires with its register pointing at a different sub-struct.
    pub const GEAR: u64 = 0xA0;
}

/// Offsets inside the checkpoint struct (base captured by the checkpoint hook).
pub mod checkpoint {
    /// Current checkpoint number, 4-byte integer at the struct head.
    pub const NUMBER: u64 = 0;
}

/// Timing constants for polling and rate limiting
pub mod timing {
    /// Ceiling interval between snapshot captures on the poll thread (ms).
    pub const SNAPSHOT_POLL_INTERVAL_MS: u64 = 1;

    /// Interval between race-start condition checks (ms).
    pub const RACE_START_POLL_INTERVAL_MS: u64 = 100;

    /// Cadence of the session-recording loop (ms).
    pub const SESSION_POLL_INTERVAL_MS: u64 = 5;

    /// Delay between attach attempts when the game is not running (s).
    pub const ATTACH_RETRY_BASE_SECS: u64 = 2;
}
