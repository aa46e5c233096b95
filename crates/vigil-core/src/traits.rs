//! Collaborator interfaces injected into the scanner.
//!
//! Each capability the scanner depends on has its own trait so that
//! implementations are chosen once, at construction time.

use crate::error::Result;
use crate::report::{Finding, ReportArtifact, ScanReport};
use crate::resource::Resource;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy, finite sequence of discovered resources.
///
/// An `Err` item is fatal for the scan consuming the stream.
pub type ResourceStream = BoxStream<'static, Result<Resource>>;

/// Produces the resources a scan evaluates
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &str;

    /// Start discovery. The returned stream is consumed once.
    async fn open(&self) -> Result<ResourceStream>;
}

/// Persists a completed scan report
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Write every artifact, failing if any of them cannot be persisted
    async fn write(&self, report: &ScanReport) -> Result<Vec<ReportArtifact>>;
}

/// Progress reporting abstraction for UI/CLI
pub trait ProgressReporter: Send + Sync {
    /// Called when a resource has been accepted for evaluation
    fn resource_discovered(&self, resource: &Resource);

    /// Called when a finding is produced
    fn finding_discovered(&self, finding: &Finding);

    /// Called when a resource's evaluation unit completes
    fn resource_evaluated(&self, resource_id: &str, findings: usize);
}
