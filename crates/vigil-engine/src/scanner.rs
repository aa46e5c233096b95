//! Scan orchestration
//!
//! Pulls resources from the source, evaluates each one as an independent
//! unit on the tokio runtime, and hands the aggregated report to the sink.
//! The number of in-flight units is bounded by a semaphore; a permit is
//! acquired before a unit is spawned and released when it finishes.

use crate::filter::ResourceFilter;
use crate::report::{summarize, FileReportSink};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};
use vigil_core::{
    Finding, ProgressReporter, ReportSink, Resource, ResourceSource, Result, ScanError,
    ScanOutcome, ScanReport, ScannerConfig, Severity,
};
use vigil_rules::{load_rules, Rule, RuleSet};

/// Builder for a configured [`Scanner`]
pub struct ScannerBuilder {
    config: ScannerConfig,
    source: Option<Arc<dyn ResourceSource>>,
    sink: Option<Arc<dyn ReportSink>>,
    extra_rules: Vec<Rule>,
    progress: Option<Arc<dyn ProgressReporter>>,
    ordered: bool,
}

impl ScannerBuilder {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            config,
            source: None,
            sink: None,
            extra_rules: Vec::new(),
            progress: None,
            ordered: false,
        }
    }

    /// Set the resource source (required)
    pub fn source(mut self, source: impl ResourceSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Set the report sink; defaults to files in the configured output directory
    pub fn sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Append a programmatic rule after the built-in and loaded rules
    pub fn extra_rule(mut self, rule: Rule) -> Self {
        self.extra_rules.push(rule);
        self
    }

    pub fn extra_rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.extra_rules.extend(rules);
        self
    }

    /// Set progress reporter
    pub fn progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Merge findings in discovery order instead of completion order
    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// Validate the configuration and assemble the rule set.
    ///
    /// Nothing is queried from the source until [`Scanner::scan`].
    pub fn build(self) -> Result<Scanner> {
        self.config.validate()?;

        let source = self
            .source
            .ok_or_else(|| ScanError::config("no resource source configured"))?;

        let rules = load_rules(&self.config.rulesets, self.extra_rules)?;
        for rule_id in rules.duplicate_ids() {
            warn!("Duplicate rule id {}: every copy will be evaluated", rule_id);
        }
        debug!("Assembled rule set with {} rules", rules.len());

        let sink: Arc<dyn ReportSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(FileReportSink::new(self.config.output_dir.clone())),
        };

        Ok(Scanner {
            filter: ResourceFilter::from_config(&self.config),
            config: Arc::new(self.config),
            rules: Arc::new(rules),
            source,
            sink,
            progress: self.progress,
            ordered: self.ordered,
        })
    }
}

/// A configured scan, ready to run
pub struct Scanner {
    config: Arc<ScannerConfig>,
    rules: Arc<RuleSet>,
    filter: ResourceFilter,
    source: Arc<dyn ResourceSource>,
    sink: Arc<dyn ReportSink>,
    progress: Option<Arc<dyn ProgressReporter>>,
    ordered: bool,
}

impl Scanner {
    pub fn builder(config: ScannerConfig) -> ScannerBuilder {
        ScannerBuilder::new(config)
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Run the scan and persist the report.
    ///
    /// Any discovery, evaluation or report failure aborts the scan; no
    /// partial report is produced.
    pub async fn scan(&self) -> Result<ScanOutcome> {
        info!(
            "Starting scan of subscription {} with {} rules (source: {}, concurrency: {})",
            self.config.subscription_id,
            self.rules.len(),
            self.source.name(),
            self.config.concurrent_requests
        );

        let findings = self.evaluate_all().await?;
        let summary = summarize(&findings);
        let report = ScanReport::new(self.config.as_ref().clone(), summary.clone(), findings);
        let artifacts = self.sink.write(&report).await?;

        info!(
            "Scan completed: {} findings across {} resources",
            summary.total_findings, summary.unique_resources
        );

        Ok(ScanOutcome {
            summary,
            findings: report.findings,
            artifacts,
        })
    }

    async fn evaluate_all(&self) -> Result<Vec<Finding>> {
        let mut stream = self.source.open().await?;
        let semaphore = Arc::new(Semaphore::new(self.config.concurrent_requests));
        // Dropping the set on an early return aborts outstanding units.
        let mut units: JoinSet<(usize, Result<Vec<Finding>>)> = JoinSet::new();
        let mut slots = Slots::default();
        let mut filtered = 0usize;

        while let Some(item) = stream.next().await {
            let resource = item?;

            if !self.filter.accepts(&resource) {
                debug!("Skipping {} ({}): filtered out", resource.id(), resource.resource_type());
                filtered += 1;
                continue;
            }
            if let Some(progress) = &self.progress {
                progress.resource_discovered(&resource);
            }

            while let Some(joined) = units.try_join_next() {
                slots.fill(joined)?;
            }

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| ScanError::discovery("evaluation pool closed"))?;

            let index = slots.reserve();
            let unit = Unit {
                rules: Arc::clone(&self.rules),
                threshold: self.config.severity_threshold,
                with_compliance: self.config.enable_compliance_mapping,
                progress: self.progress.clone(),
            };
            units.spawn(async move {
                let _permit = permit;
                (index, unit.run(resource).await)
            });
        }

        while let Some(joined) = units.join_next().await {
            slots.fill(joined)?;
        }

        debug!(
            "Evaluated {} resources ({} filtered out)",
            slots.len(),
            filtered
        );
        Ok(slots.into_findings(self.ordered))
    }
}

/// One resource evaluated against every applicable rule
struct Unit {
    rules: Arc<RuleSet>,
    threshold: Severity,
    with_compliance: bool,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl Unit {
    async fn run(self, resource: Resource) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for rule in self.rules.applicable(resource.resource_type(), self.threshold) {
            let evidence = rule
                .evaluate(&resource)
                .await
                .map_err(|e| ScanError::Evaluation {
                    rule_id: rule.rule_id.clone(),
                    resource_id: resource.id().to_string(),
                    message: e.to_string(),
                })?;

            if let Some(evidence) = evidence {
                let finding = rule.to_finding(&resource, evidence, self.with_compliance);
                if let Some(progress) = &self.progress {
                    progress.finding_discovered(&finding);
                }
                findings.push(finding);
            }
        }

        debug!("Evaluated {}: {} findings", resource.id(), findings.len());
        if let Some(progress) = &self.progress {
            progress.resource_evaluated(resource.id(), findings.len());
        }
        Ok(findings)
    }
}

/// Per-unit result slots, keyed by discovery index
#[derive(Default)]
struct Slots {
    slots: Vec<Option<Vec<Finding>>>,
    completed: Vec<usize>,
}

impl Slots {
    fn reserve(&mut self) -> usize {
        self.slots.push(None);
        self.slots.len() - 1
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn fill(
        &mut self,
        joined: std::result::Result<(usize, Result<Vec<Finding>>), JoinError>,
    ) -> Result<()> {
        let (index, findings) = joined.map_err(|e| ScanError::Evaluation {
            rule_id: "<unit>".to_string(),
            resource_id: "<unknown>".to_string(),
            message: format!("evaluation unit failed: {}", e),
        })?;
        self.slots[index] = Some(findings?);
        self.completed.push(index);
        Ok(())
    }

    fn into_findings(mut self, ordered: bool) -> Vec<Finding> {
        let order = if ordered {
            (0..self.slots.len()).collect()
        } else {
            std::mem::take(&mut self.completed)
        };
        order
            .into_iter()
            .filter_map(|index| self.slots[index].take())
            .flatten()
            .collect()
    }
}
