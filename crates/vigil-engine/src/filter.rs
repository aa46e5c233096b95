//! Pre-evaluation resource filters

use serde_json::Value;
use vigil_core::{Resource, ScannerConfig};

/// Decides whether a discovered resource is evaluated at all.
///
/// Tag filters require every configured key to be present with an equal
/// value. Resource-group filters compare the group parsed from the
/// resource id. All comparisons ignore case.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    tags: Vec<(String, String)>,
    include_groups: Vec<String>,
    exclude_groups: Vec<String>,
}

impl ResourceFilter {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            tags: config
                .tag_filters
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
                .collect(),
            include_groups: lowercase_all(&config.include_resource_groups),
            exclude_groups: lowercase_all(&config.exclude_resource_groups),
        }
    }

    /// True when nothing is filtered
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.include_groups.is_empty() && self.exclude_groups.is_empty()
    }

    pub fn accepts(&self, resource: &Resource) -> bool {
        self.matches_tags(resource) && self.matches_group(resource)
    }

    fn matches_tags(&self, resource: &Resource) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        let Some(tags) = resource.tags() else {
            return false;
        };

        self.tags.iter().all(|(key, expected)| {
            tags.iter().any(|(k, v)| {
                k.to_lowercase() == *key && tag_value(v).to_lowercase() == *expected
            })
        })
    }

    fn matches_group(&self, resource: &Resource) -> bool {
        if self.include_groups.is_empty() && self.exclude_groups.is_empty() {
            return true;
        }
        let group = resource.resource_group().map(str::to_lowercase);

        if let Some(group) = &group {
            if self.exclude_groups.contains(group) {
                return false;
            }
        }
        if self.include_groups.is_empty() {
            return true;
        }
        group.map_or(false, |g| self.include_groups.contains(&g))
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

fn tag_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
