//! Error types for FlexTrack step tracking

use thiserror::Error;

/// Errors surfaced by the tracker.
///
/// Reconciliation anomalies and invalid lifecycle transitions are not errors;
/// they are absorbed where they happen and only logged.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("No step counter or accelerometer available, tracking unavailable")]
    SensorUnavailable,

    #[error("Tracker worker has stopped")]
    WorkerStopped,
}
