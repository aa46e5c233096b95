//! File-backed resource inventory (JSON, JSON Lines)
//!
//! Reads rows exported from a resource-graph query. Rows that already
//! carry a `resource_type` are yielded first, in file order. The remaining
//! rows are swept once per category, so every row of one category is
//! yielded before the next category starts.

use crate::category::CATEGORIES;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use vigil_core::{Resource, ResourceSource, ResourceStream, Result, ScanError};

/// On-disk layout of an inventory file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryFormat {
    /// A JSON array of rows, or a single row object
    Json,
    /// One JSON row per line
    JsonLines,
}

impl InventoryFormat {
    /// Pick the format from the file extension
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") | Some("ndjson") => InventoryFormat::JsonLines,
            _ => InventoryFormat::Json,
        }
    }
}

/// Resource source reading an exported inventory file
#[derive(Debug, Clone)]
pub struct InventorySource {
    path: PathBuf,
    format: InventoryFormat,
}

impl InventorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = InventoryFormat::detect(&path);
        Self { path, format }
    }

    pub fn with_format(mut self, format: InventoryFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_rows(&self, content: &str) -> Result<Vec<Map<String, Value>>> {
        let values = match self.format {
            InventoryFormat::Json => {
                let value: Value = serde_json::from_str(content).map_err(|e| {
                    ScanError::discovery(format!("{}: {}", self.path.display(), e))
                })?;
                match value {
                    Value::Array(rows) => rows,
                    row @ Value::Object(_) => vec![row],
                    _ => {
                        return Err(ScanError::discovery(format!(
                            "{}: expected a JSON object or array",
                            self.path.display()
                        )))
                    }
                }
            }
            InventoryFormat::JsonLines => content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(number, line)| {
                    serde_json::from_str(line).map_err(|e| {
                        ScanError::discovery(format!(
                            "{}:{}: {}",
                            self.path.display(),
                            number + 1,
                            e
                        ))
                    })
                })
                .collect::<Result<Vec<Value>>>()?,
        };

        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| match value {
                Value::Object(row) => Ok(row),
                _ => Err(ScanError::discovery(format!(
                    "{}: row {} is not an object",
                    self.path.display(),
                    index + 1
                ))),
            })
            .collect()
    }
}

/// Order rows for yielding: pre-tagged rows, then one sweep per category
fn classify_rows(rows: Vec<Map<String, Value>>) -> Vec<Result<Resource>> {
    let (tagged, untagged): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .partition(|row| row.get("resource_type").map_or(false, Value::is_string));

    let mut items: Vec<Result<Resource>> = tagged
        .into_iter()
        .map(|row| Resource::from_value(Value::Object(row)))
        .collect();

    for row in &untagged {
        let arm_type = row.get("type").and_then(Value::as_str).unwrap_or_default();
        if !CATEGORIES.iter().any(|c| c.matches(arm_type)) {
            let id = row.get("id").and_then(Value::as_str).unwrap_or("<no id>");
            let arm_type = if arm_type.is_empty() { "<no type>" } else { arm_type };
            tracing::debug!("Skipping unclassified row {} ({})", id, arm_type);
        }
    }

    for category in CATEGORIES.iter() {
        for row in &untagged {
            let arm_type = row.get("type").and_then(Value::as_str).unwrap_or_default();
            if category.matches(arm_type) {
                items.push(Resource::tagged(row.clone(), category.discriminator));
            }
        }
    }

    items
}

#[async_trait]
impl ResourceSource for InventorySource {
    fn name(&self) -> &str {
        "inventory"
    }

    async fn open(&self) -> Result<ResourceStream> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ScanError::discovery(format!("failed to read {}: {}", self.path.display(), e))
        })?;

        let rows = self.parse_rows(&content)?;
        tracing::debug!("Read {} inventory rows from {}", rows.len(), self.path.display());

        Ok(stream::iter(classify_rows(rows)).boxed())
    }
}
