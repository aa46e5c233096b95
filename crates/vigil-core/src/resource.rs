//! Discovered cloud resources

use crate::error::{Result, ScanError};
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Discriminators assigned by the built-in discovery categories
pub mod discriminators {
    /// Managed LLM service accounts
    pub const AZURE_OPENAI: &str = "azure_openai";
    /// Machine learning workspaces
    pub const ML_WORKSPACES: &str = "ml_workspaces";
    /// General cognitive-services accounts
    pub const COGNITIVE_SERVICES: &str = "cognitive_services";
}

/// A discovered cloud resource.
///
/// Wraps the raw record returned by a resource source. `id` and
/// `resource_type` are mandatory; `name` and `properties` fall back to
/// empty values so well-formed rows never fail evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    id: String,
    name: String,
    resource_type: String,
    data: Map<String, Value>,
}

impl Resource {
    /// Build a resource from a raw JSON record
    pub fn from_value(value: Value) -> Result<Self> {
        let mut data = match value {
            Value::Object(map) => map,
            other => {
                return Err(ScanError::discovery(format!(
                    "resource record must be an object, got {}",
                    kind_of(&other)
                )))
            }
        };

        let id = required_string(&data, "id")?;
        let resource_type = required_string(&data, "resource_type")?;
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if !matches!(data.get("properties"), Some(Value::Object(_))) {
            data.insert("properties".to_string(), Value::Object(Map::new()));
        }

        Ok(Self {
            id,
            name,
            resource_type,
            data,
        })
    }

    /// Tag a raw row with a discriminator and build the resource
    pub fn tagged(mut row: Map<String, Value>, resource_type: &str) -> Result<Self> {
        row.insert(
            "resource_type".to_string(),
            Value::String(resource_type.to_string()),
        );
        Self::from_value(Value::Object(row))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Discriminator assigned by the resource source
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The `properties` sub-mapping (always present)
    pub fn properties(&self) -> &Map<String, Value> {
        static EMPTY: OnceLock<Map<String, Value>> = OnceLock::new();
        self.data
            .get("properties")
            .and_then(Value::as_object)
            .unwrap_or_else(|| EMPTY.get_or_init(Map::new))
    }

    /// Look up a single property by key
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties().get(key).filter(|v| !v.is_null())
    }

    /// Tags attached to the resource, if any
    pub fn tags(&self) -> Option<&Map<String, Value>> {
        self.data.get("tags").and_then(Value::as_object)
    }

    /// Resource group parsed from an ARM-style id
    pub fn resource_group(&self) -> Option<&str> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"(?i)/resourcegroups/([^/]+)").expect("resource group pattern is valid")
        });
        pattern
            .captures(&self.id)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Resolve a dotted path by walking nested mappings.
    ///
    /// Any segment that is absent or not a mapping yields `None`, as does
    /// an explicit JSON null.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.data.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        (!current.is_null()).then_some(current)
    }

    /// Raw record as received from the source
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

fn required_string(data: &Map<String, Value>, key: &str) -> Result<String> {
    match data.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ScanError::discovery(format!(
            "resource field '{}' must be a string, got {}",
            key,
            kind_of(other)
        ))),
        None => Err(ScanError::discovery(format!(
            "resource record is missing '{}'",
            key
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
