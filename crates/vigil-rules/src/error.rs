//! Error types for rule construction and evaluation

use std::path::PathBuf;
use thiserror::Error;
use vigil_core::ScanError;

/// Result type for rule operations
pub type RuleResult<T> = std::result::Result<T, RuleError>;

/// Errors that can occur while building, loading or evaluating rules
#[derive(Debug, Error)]
pub enum RuleError {
    /// Rule file could not be read
    #[error("Failed to read rule file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rule file is not valid YAML or a record is malformed
    #[error("Failed to parse rule file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Condition uses an operator the evaluator does not know
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Rule definition failed validation
    #[error("Rule validation failed: {0}")]
    Validation(String),

    /// Evaluator failed instead of returning evidence or nothing
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl From<walkdir::Error> for RuleError {
    fn from(e: walkdir::Error) -> Self {
        let path = e.path().map(PathBuf::from).unwrap_or_default();
        RuleError::Io {
            path,
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        }
    }
}

impl From<RuleError> for ScanError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::Io { path, source } => ScanError::RuleLoad {
                path: path.display().to_string(),
                message: source.to_string(),
            },
            RuleError::Parse { path, message } => ScanError::RuleLoad {
                path: path.display().to_string(),
                message,
            },
            RuleError::UnsupportedOperator(_) | RuleError::Validation(_) => ScanError::RuleLoad {
                path: "<inline>".to_string(),
                message: err.to_string(),
            },
            RuleError::Evaluation(message) => ScanError::Evaluation {
                rule_id: "<unknown>".to_string(),
                resource_id: "<unknown>".to_string(),
                message,
            },
        }
    }
}
