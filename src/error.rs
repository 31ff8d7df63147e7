//! Error types for Unlockr
//!
//! Run-level errors using thiserror. Title and achievement errors live next to
//! the session module and never surface here; they become report data.

use thiserror::Error;

use crate::classifier::PolicyError;
use crate::discovery::DiscoveryError;
use crate::scan::ScanError;

/// Errors that stop a run from starting or completing
#[derive(Debug, Error)]
pub enum EngineError {
    /// Client library could not be located
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The pool cannot run any worker with this limit
    #[error("Invalid concurrency limit: {0}")]
    InvalidConcurrency(usize),

    /// Library snapshot could not be read
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Library scan against the web API failed
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    /// Protection policy could not be built
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, EngineError>;
