//! Error types for BioScan Vitals
//!
//! Insufficient data and tracking loss are not errors: estimators fall back to
//! resting-state constants and sessions abort back to idle. What remains here
//! is caller misuse, invalid configuration and I/O.

use thiserror::Error;

/// Errors that can occur while configuring, driving or persisting scans
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid scan configuration: {0}")]
    InvalidConfig(String),

    #[error("Wellness index out of range [1, 100]: {0}")]
    InvalidWellnessIndex(i64),

    #[error("Age bucket must not be empty")]
    EmptyAgeBucket,

    #[error("Session is not completed (state: {0})")]
    SessionNotCompleted(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("History store lock poisoned")]
    LockPoisoned,
}
