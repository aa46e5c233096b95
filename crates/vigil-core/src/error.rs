//! Error types for Vigil

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scan operations.
///
/// Every variant is fatal for the scan that raised it; there is no
/// partial-success mode.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Invalid scanner configuration, reported before any scan work begins
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rule-definition file could not be read or is malformed
    #[error("Rule load error in {path}: {message}")]
    RuleLoad { path: String, message: String },

    /// Resource source failed or yielded an unusable record
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// An evaluator failed instead of returning evidence or nothing
    #[error("Evaluation of rule {rule_id} against {resource_id} failed: {message}")]
    Evaluation {
        rule_id: String,
        resource_id: String,
        message: String,
    },

    /// A report artifact could not be persisted
    #[error("Failed to write report {}: {source}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ScanError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        ScanError::Configuration(message.into())
    }

    /// Shorthand for a discovery error
    pub fn discovery(message: impl Into<String>) -> Self {
        ScanError::Discovery(message.into())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Serialization(err.to_string())
    }
}

/// Result type alias for scan operations
pub type Result<T> = std::result::Result<T, ScanError>;
