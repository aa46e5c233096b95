//! In-memory resource source

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use vigil_core::{Resource, ResourceSource, ResourceStream, Result, ScanError};

/// Yields a fixed list of resources.
///
/// Optionally fails after a number of items, to exercise mid-stream
/// discovery errors.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    resources: Vec<Resource>,
    fail_after: Option<(usize, String)>,
}

impl StaticSource {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self {
            resources,
            fail_after: None,
        }
    }

    /// Build from raw records; every record must be a valid resource
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Result<Self> {
        let resources = values
            .into_iter()
            .map(Resource::from_value)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(resources))
    }

    /// Yield a discovery error once `count` resources have been produced
    pub fn fail_after(mut self, count: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((count, message.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[async_trait]
impl ResourceSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn open(&self) -> Result<ResourceStream> {
        let mut items: Vec<Result<Resource>> = Vec::with_capacity(self.resources.len() + 1);
        match &self.fail_after {
            Some((count, message)) => {
                items.extend(self.resources.iter().take(*count).cloned().map(Ok));
                items.push(Err(ScanError::discovery(message.clone())));
            }
            None => items.extend(self.resources.iter().cloned().map(Ok)),
        }
        Ok(stream::iter(items).boxed())
    }
}
