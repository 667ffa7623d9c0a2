//! Display decodes for raw state flags
//!
//! The flag values are provisional: observed in captures, not confirmed
//! against game code. The snapshot keeps the raw integers; these enums
//! exist only so the CLI can label them, and unknown values must always
//! survive as raw numbers.

use strum::{Display, FromRepr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(i32)]
pub enum NitroState {
    Idle = 0,
    Charged = 1,
    Boosting = 2,
    Depleted = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(i32)]
pub enum DriftState {
    Grounded = 0,
    Drifting = 1,
}
