//! Report types for security findings and scan results

use crate::config::ScannerConfig;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Severity level of a rule and the findings it produces
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Severity {
    /// Low severity, should be reviewed
    Low,
    /// Medium severity, should be addressed
    #[default]
    Medium,
    /// High severity, requires prompt attention
    High,
    /// Critical severity, requires immediate action
    Critical,
}

impl Severity {
    /// All severities, lowest first
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(format!(
                "Unknown severity '{}' (expected LOW, MEDIUM, HIGH or CRITICAL)",
                s
            )),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Violation evidence returned by an evaluator.
///
/// Always carries a human-readable `message`; any further keys are
/// flattened next to it when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub message: String,

    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Evidence {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Attach an additional detail
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// Framework name to control id, kept in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplianceMap(Vec<(String, String)>);

impl ComplianceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the control for a framework, replacing an earlier entry in place
    pub fn insert(&mut self, framework: impl Into<String>, control: impl Into<String>) {
        let framework = framework.into();
        let control = control.into();
        match self.0.iter_mut().find(|(f, _)| *f == framework) {
            Some(entry) => entry.1 = control,
            None => self.0.push((framework, control)),
        }
    }

    pub fn get(&self, framework: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(f, _)| f == framework)
            .map(|(_, control)| control.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, c)| (f.as_str(), c.as_str()))
    }
}

impl std::ops::Index<&str> for ComplianceMap {
    type Output = String;

    fn index(&self, framework: &str) -> &String {
        match self.0.iter().find(|(f, _)| f == framework) {
            Some((_, control)) => control,
            None => panic!("no compliance mapping for {}", framework),
        }
    }
}

impl<'a> IntoIterator for &'a ComplianceMap {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ComplianceMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ComplianceMap::new();
        for (framework, control) in iter {
            map.insert(framework, control);
        }
        map
    }
}

impl Serialize for ComplianceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for ComplianceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ComplianceVisitor;

        impl<'de> Visitor<'de> for ComplianceVisitor {
            type Value = ComplianceMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of framework names to control ids")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ComplianceMap, A::Error> {
                let mut map = ComplianceMap::new();
                while let Some((framework, control)) = access.next_entry::<String, String>()? {
                    map.insert(framework, control);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ComplianceVisitor)
    }
}

/// A rule firing against a specific resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub title: String,
    pub severity: Severity,
    pub resource_id: String,
    pub resource_name: String,
    pub resource_type: String,
    pub message: String,

    /// Framework name to control id, copied from the rule
    #[serde(default)]
    pub compliance: ComplianceMap,

    #[serde(default)]
    pub remediation: String,

    /// Raw evidence payload
    pub evidence: Evidence,
}

/// Summary statistics for a scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of findings produced
    pub total_findings: usize,

    /// Findings grouped by severity
    pub by_severity: BTreeMap<Severity, usize>,

    /// Distinct resources with at least one finding
    pub unique_resources: usize,
}

impl Summary {
    /// Count for a single severity
    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    /// Check if the scan produced critical findings
    pub fn has_critical_findings(&self) -> bool {
        self.count(Severity::Critical) > 0
    }
}

/// The persisted report: what the JSON artifact contains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub config: ScannerConfig,
    pub summary: Summary,
    pub findings: Vec<Finding>,
}

impl ScanReport {
    pub fn new(config: ScannerConfig, summary: Summary, findings: Vec<Finding>) -> Self {
        Self {
            generated_at: chrono::Utc::now(),
            config,
            summary,
            findings,
        }
    }
}

/// Kind of report artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Machine-readable structured report
    Json,
    /// Human-readable prose report
    Markdown,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Json => write!(f, "JSON"),
            ArtifactKind::Markdown => write!(f, "Markdown"),
        }
    }
}

/// Location of a persisted report artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// Result of a completed scan
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub summary: Summary,
    pub findings: Vec<Finding>,
    pub artifacts: Vec<ReportArtifact>,
}

impl ScanOutcome {
    /// Path of the artifact of the given kind
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Path> {
        self.artifacts
            .iter()
            .find(|a| a.kind == kind)
            .map(|a| a.path.as_path())
    }
}
