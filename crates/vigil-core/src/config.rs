//! Scanner configuration

use crate::error::{Result, ScanError};
use crate::report::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Runtime configuration for a scan.
///
/// Constructed once before a scan and never mutated while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Subscription or tenant identifier
    pub subscription_id: String,

    /// Directory the report artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Extra rule-definition files or directories
    #[serde(default)]
    pub rulesets: Vec<PathBuf>,

    /// Only run rules at or above this severity
    #[serde(default = "default_threshold")]
    pub severity_threshold: Severity,

    /// Only evaluate resources carrying all of these tags
    #[serde(default)]
    pub tag_filters: BTreeMap<String, String>,

    /// Maximum number of resources evaluated at once
    #[serde(default = "default_concurrency")]
    pub concurrent_requests: usize,

    /// Only evaluate resources in these resource groups
    #[serde(default)]
    pub include_resource_groups: Vec<String>,

    /// Never evaluate resources in these resource groups
    #[serde(default)]
    pub exclude_resource_groups: Vec<String>,

    /// Copy rule compliance mappings onto findings
    #[serde(default = "default_true")]
    pub enable_compliance_mapping: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_threshold() -> Severity {
    Severity::Low
}

fn default_concurrency() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl ScannerConfig {
    /// Create a configuration with defaults for everything but the subscription
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            output_dir: default_output_dir(),
            rulesets: Vec::new(),
            severity_threshold: default_threshold(),
            tag_filters: BTreeMap::new(),
            concurrent_requests: default_concurrency(),
            include_resource_groups: Vec::new(),
            exclude_resource_groups: Vec::new(),
            enable_compliance_mapping: true,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_ruleset(mut self, path: impl Into<PathBuf>) -> Self {
        self.rulesets.push(path.into());
        self
    }

    pub fn with_severity_threshold(mut self, severity: Severity) -> Self {
        self.severity_threshold = severity;
        self
    }

    pub fn with_tag_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag_filters.insert(key.into(), value.into());
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrent_requests = limit;
        self
    }

    /// Check invariants that must hold before a scan starts
    pub fn validate(&self) -> Result<()> {
        if self.subscription_id.trim().is_empty() {
            return Err(ScanError::config("subscription id must not be empty"));
        }
        if self.concurrent_requests == 0 {
            return Err(ScanError::config(
                "concurrent_requests must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Load configuration from a YAML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScanError::config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let parsed = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            // Assume YAML for other extensions
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| {
            ScanError::config(format!("{}: {}", path.display(), message))
        })
    }
}

/// Parse `key=value` tag filters.
///
/// Splits on the first `=` and trims both halves.
pub fn parse_tag_filters<S: AsRef<str>>(values: &[S]) -> Result<BTreeMap<String, String>> {
    let mut filters = BTreeMap::new();
    for value in values {
        let value = value.as_ref();
        let (key, tag_value) = value
            .split_once('=')
            .ok_or_else(|| ScanError::config(format!("Invalid tag filter format: {}", value)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ScanError::config(format!(
                "Invalid tag filter format: {}",
                value
            )));
        }
        filters.insert(key.to_string(), tag_value.trim().to_string());
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ScannerConfig::new("sub");
        assert_eq!(config.output_dir, PathBuf::from("reports"));
        assert_eq!(config.concurrent_requests, 10);
        assert_eq!(config.severity_threshold, Severity::Low);
        assert!(config.enable_compliance_mapping);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let err = ScannerConfig::new("sub").with_concurrency(0).validate().unwrap_err();
        assert!(matches!(err, ScanError::Configuration(_)));
    }

    #[test]
    fn test_parse_tag_filters() {
        let filters = parse_tag_filters(&["env = prod", "owner=team=ai"]).unwrap();
        assert_eq!(filters.get("env").map(String::as_str), Some("prod"));
        assert_eq!(filters.get("owner").map(String::as_str), Some("team=ai"));

        let err = parse_tag_filters(&["missing-separator"]).unwrap_err();
        assert!(err.to_string().contains("missing-separator"));
        assert!(parse_tag_filters(&["=value"]).is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "subscription_id: abc\nseverity_threshold: high\nconcurrent_requests: 4\ntag_filters:\n  env: prod"
        )
        .unwrap();

        let config = ScannerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.subscription_id, "abc");
        assert_eq!(config.severity_threshold, Severity::High);
        assert_eq!(config.concurrent_requests, 4);
        assert_eq!(config.tag_filters.len(), 1);
        assert_eq!(config.output_dir, PathBuf::from("reports"));
    }

    #[test]
    fn test_from_json_file_rejects_bad_severity() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"subscription_id": "abc", "severity_threshold": "urgent"}}"#).unwrap();

        let err = ScannerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ScanError::Configuration(_)));
    }
}
