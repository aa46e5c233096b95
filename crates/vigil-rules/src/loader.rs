//! Declarative rule loading
//!
//! Rule files hold a YAML sequence of rule records (a single record is
//! accepted as a one-element sequence). JSON files are read the same way.

use crate::builtin::builtin_rules;
use crate::condition::Condition;
use crate::error::{RuleError, RuleResult};
use crate::rule::{Evaluator, Rule, RuleSet, DEFAULT_CONDITION_MESSAGE};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::{Path, PathBuf};
use vigil_core::{ComplianceMap, Severity};
use walkdir::WalkDir;

/// One rule record as written in a rule file
#[derive(Debug, Deserialize)]
struct RuleDefinition {
    #[serde(deserialize_with = "scalar_string")]
    rule_id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    resource_types: Option<Vec<String>>,
    #[serde(default)]
    condition: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    remediation: Option<String>,
    #[serde(default, deserialize_with = "scalar_mapping")]
    compliance: Option<ComplianceMap>,
}

/// Render a YAML scalar as text; `6.1` and `1001` are ids too
fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_yaml::Value::deserialize(deserializer)?;
    scalar_text(&value).ok_or_else(|| D::Error::custom("expected a string or number"))
}

fn scalar_mapping<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ComplianceMap>, D::Error> {
    let Some(mapping) = Option::<serde_yaml::Mapping>::deserialize(deserializer)? else {
        return Ok(None);
    };

    mapping
        .iter()
        .map(|(framework, control)| match (scalar_text(framework), scalar_text(control)) {
            (Some(framework), Some(control)) => Ok((framework, control)),
            _ => Err(D::Error::custom(
                "compliance entries must map a framework name to a control id",
            )),
        })
        .collect::<Result<ComplianceMap, D::Error>>()
        .map(Some)
}

impl RuleDefinition {
    fn into_rule(self) -> RuleResult<Rule> {
        let severity = match self.severity.as_deref() {
            Some(level) => level.parse::<Severity>().map_err(RuleError::Validation)?,
            None => Severity::Medium,
        };

        let condition = match self.condition {
            None | Some(Value::Null) => None,
            Some(ref value) => Some(Condition::from_value(value)?),
        };

        let evaluator = Evaluator::Condition {
            condition,
            message: self
                .message
                .unwrap_or_else(|| DEFAULT_CONDITION_MESSAGE.to_string()),
        };

        let mut rule = Rule::new(self.rule_id, self.title, severity, evaluator)
            .with_description(self.description.unwrap_or_default())
            .with_remediation(self.remediation.unwrap_or_default());
        rule.resource_types = self.resource_types.unwrap_or_default();
        rule.compliance = self.compliance.unwrap_or_default();
        Ok(rule)
    }
}

/// Parse the rule records in a document.
///
/// `origin` is only used for error messages.
pub fn parse_rules(content: &str, origin: &Path) -> RuleResult<Vec<Rule>> {
    let parse_error = |message: String| RuleError::Parse {
        path: origin.to_path_buf(),
        message,
    };

    let document: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;

    let records = match document {
        serde_yaml::Value::Null => Vec::new(),
        serde_yaml::Value::Sequence(items) => items,
        record @ serde_yaml::Value::Mapping(_) => vec![record],
        _ => {
            return Err(parse_error(
                "expected a rule record or a list of rule records".to_string(),
            ))
        }
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_yaml::from_value::<RuleDefinition>(record)
                .map_err(|e| e.to_string())
                .and_then(|definition| definition.into_rule().map_err(|e| e.to_string()))
                .map_err(|message| parse_error(format!("record {}: {}", index + 1, message)))
        })
        .collect()
}

/// Load all rules defined in a single file
pub fn load_rule_file(path: &Path) -> RuleResult<Vec<Rule>> {
    let content = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = parse_rules(&content, path)?;
    tracing::debug!("Loaded {} rules from {}", rules.len(), path.display());
    Ok(rules)
}

/// Load rules from each path in order.
///
/// A directory contributes every `.yml`, `.yaml` and `.json` file beneath
/// it, in sorted path order. Any unreadable or malformed file fails the
/// whole load.
pub fn load_rule_files<P: AsRef<Path>>(paths: &[P]) -> RuleResult<Vec<Rule>> {
    let mut loaded = Vec::new();

    for path in paths {
        for file in discover_rule_files(path.as_ref())? {
            loaded.extend(load_rule_file(&file)?);
        }
    }

    Ok(loaded)
}

/// Build the full rule set: built-ins, then rule files, then extras
pub fn load_rules<P: AsRef<Path>>(
    rule_paths: &[P],
    extra_rules: impl IntoIterator<Item = Rule>,
) -> RuleResult<RuleSet> {
    let loaded = load_rule_files(rule_paths)?;
    Ok(RuleSet::assemble(builtin_rules(), loaded, extra_rules))
}

/// Rule files a path stands for: the path itself, or the rule files in a directory
pub fn discover_rule_files(path: &Path) -> RuleResult<Vec<PathBuf>> {
    if path.is_dir() {
        rule_files_in(path)
    } else {
        Ok(vec![path.to_path_buf()])
    }
}

fn rule_files_in(dir: &Path) -> RuleResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(ext) = path.extension() {
            if ext == "yml" || ext == "yaml" || ext == "json" {
                files.push(path.to_path_buf());
            }
        }
    }
    Ok(files)
}
