//! Declarative condition trees
//!
//! A condition is either a leaf `{field, operator, value}` triple resolved
//! against a resource, or an `all`/`any` combination of nested conditions.
//! All string comparisons are case-insensitive.

use crate::error::{RuleError, RuleResult};
use serde::Serialize;
use serde_json::{json, Value};
use vigil_core::Resource;

/// Comparison applied by a leaf condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    Exists,
    NotExists,
}

impl std::str::FromStr for Operator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equals" => Ok(Operator::Equals),
            "not_equals" => Ok(Operator::NotEquals),
            "in" => Ok(Operator::In),
            "exists" => Ok(Operator::Exists),
            "not_exists" => Ok(Operator::NotExists),
            _ => Err(RuleError::UnsupportedOperator(s.to_string())),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Equals => write!(f, "equals"),
            Operator::NotEquals => write!(f, "not_equals"),
            Operator::In => write!(f, "in"),
            Operator::Exists => write!(f, "exists"),
            Operator::NotExists => write!(f, "not_exists"),
        }
    }
}

/// A condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Compare the value at a dotted field path
    Match {
        field: String,
        operator: Operator,
        value: Value,
    },
    /// Every nested condition must hold
    All(Vec<Condition>),
    /// At least one nested condition must hold
    Any(Vec<Condition>),
}

impl Condition {
    /// Build a leaf condition, validating the operand for `in`
    pub fn leaf(field: impl Into<String>, operator: Operator, value: Value) -> RuleResult<Self> {
        if operator == Operator::In && !matches!(value, Value::Array(_) | Value::String(_)) {
            return Err(RuleError::Validation(
                "operator 'in' requires a list or string value".to_string(),
            ));
        }
        Ok(Condition::Match {
            field: field.into(),
            operator,
            value,
        })
    }

    /// Parse a condition from its data representation
    pub fn from_value(value: &Value) -> RuleResult<Self> {
        let map = value.as_object().ok_or_else(|| {
            RuleError::Validation("condition must be a mapping".to_string())
        })?;

        if let Some(nested) = map.get("all") {
            return Ok(Condition::All(parse_list(nested, "all")?));
        }
        if let Some(nested) = map.get("any") {
            return Ok(Condition::Any(parse_list(nested, "any")?));
        }

        let field = map
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| RuleError::Validation("condition requires a 'field'".to_string()))?;

        let operator = match map.get("operator") {
            None | Some(Value::Null) => Operator::Equals,
            Some(Value::String(op)) => op.parse()?,
            Some(other) => return Err(RuleError::UnsupportedOperator(other.to_string())),
        };

        Self::leaf(
            field,
            operator,
            map.get("value").cloned().unwrap_or(Value::Null),
        )
    }

    /// Evaluate the condition against a resource
    pub fn matches(&self, resource: &Resource) -> bool {
        match self {
            Condition::Match {
                field,
                operator,
                value,
            } => {
                let current = resource.lookup(field);
                match operator {
                    Operator::Equals => values_equal(current, value),
                    Operator::NotEquals => !values_equal(current, value),
                    Operator::In => contained_in(current, value),
                    Operator::Exists => current.is_some(),
                    Operator::NotExists => current.is_none(),
                }
            }
            Condition::All(conditions) => conditions.iter().all(|c| c.matches(resource)),
            Condition::Any(conditions) => conditions.iter().any(|c| c.matches(resource)),
        }
    }

    /// Data representation, used as finding evidence
    pub fn to_value(&self) -> Value {
        match self {
            Condition::Match {
                field,
                operator,
                value,
            } => json!({
                "field": field,
                "operator": operator.to_string(),
                "value": value,
            }),
            Condition::All(conditions) => {
                json!({ "all": conditions.iter().map(Condition::to_value).collect::<Vec<_>>() })
            }
            Condition::Any(conditions) => {
                json!({ "any": conditions.iter().map(Condition::to_value).collect::<Vec<_>>() })
            }
        }
    }
}

fn parse_list(value: &Value, key: &str) -> RuleResult<Vec<Condition>> {
    let items = value.as_array().ok_or_else(|| {
        RuleError::Validation(format!("'{}' must be a list of conditions", key))
    })?;
    items.iter().map(Condition::from_value).collect()
}

/// Render a value for comparison: strings verbatim, everything else as JSON
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn values_equal(current: Option<&Value>, expected: &Value) -> bool {
    match (current, expected) {
        (None, Value::Null) => true,
        (None, _) | (Some(_), Value::Null) => false,
        (Some(current), expected) => {
            stringify(current).to_lowercase() == stringify(expected).to_lowercase()
        }
    }
}

fn contained_in(current: Option<&Value>, expected: &Value) -> bool {
    match expected {
        Value::Array(items) => items.iter().any(|item| values_equal(current, item)),
        Value::String(haystack) => current
            .map(|c| {
                haystack
                    .to_lowercase()
                    .contains(&stringify(c).to_lowercase())
            })
            .unwrap_or(false),
        _ => false,
    }
}
