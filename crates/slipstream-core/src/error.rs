use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Module not found in target process: {0}")]
    ModuleNotFound(String),

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Failed to write process memory at address {address:#x}: {message}")]
    MemoryWriteFailed { address: u64, message: String },

    #[error("Failed to allocate {size} bytes in target process: {message}")]
    AllocationFailed { size: usize, message: String },

    #[error("Failed to change page protection at address {address:#x}: {message}")]
    ProtectionChangeFailed { address: u64, message: String },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Injection failed: {0}")]
    InjectionFailed(String),

    #[error("Ghost file not found: {0}")]
    GhostNotFound(PathBuf),

    #[error("Ghost file malformed: {path}: {message}")]
    GhostMalformed { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is any flavor of remote memory fault.
    ///
    /// Used by callers that must degrade to "field unavailable" rather
    /// than propagate (snapshot field reads).
    pub fn is_memory_fault(&self) -> bool {
        matches!(
            self,
            Error::MemoryReadFailed { .. } | Error::MemoryWriteFailed { .. }
        )
    }

    /// Check if this error means the ghost file simply does not exist yet.
    pub fn is_ghost_not_found(&self) -> bool {
        matches!(self, Error::GhostNotFound(_))
    }
}
