//! Posture scan command

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use vigil_core::{
    parse_tag_filters, ArtifactKind, Finding, ProgressReporter, Resource, ScannerConfig, Severity,
};
use vigil_engine::{render_text, Scanner};
use vigil_source::InventorySource;

#[derive(Args)]
pub struct ScanArgs {
    /// Subscription ID (overrides the config file)
    #[arg(long)]
    subscription_id: Option<String>,

    /// Exported resource inventory (JSON array, object, or JSON Lines)
    #[arg(long, required = true)]
    inventory: PathBuf,

    /// Configuration file (YAML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to store generated reports
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Additional rule file or directory
    #[arg(long = "ruleset")]
    rulesets: Vec<PathBuf>,

    /// Only run rules at or above this severity (LOW, MEDIUM, HIGH, CRITICAL)
    #[arg(long)]
    severity_threshold: Option<Severity>,

    /// Tag filter formatted as key=value
    #[arg(long = "tag-filter")]
    tag_filters: Vec<String>,

    /// Maximum number of resources evaluated at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Only scan these resource groups
    #[arg(long = "include-resource-group")]
    include_resource_groups: Vec<String>,

    /// Skip these resource groups
    #[arg(long = "exclude-resource-group")]
    exclude_resource_groups: Vec<String>,

    /// Report findings in discovery order
    #[arg(long)]
    ordered: bool,

    /// Exit with status 1 when critical findings are reported
    #[arg(long)]
    fail_on_critical: bool,
}

/// Logs findings as they are produced
struct LogProgress;

impl ProgressReporter for LogProgress {
    fn resource_discovered(&self, resource: &Resource) {
        tracing::debug!("Discovered {} ({})", resource.id(), resource.resource_type());
    }

    fn finding_discovered(&self, finding: &Finding) {
        info!(
            "[{}] {} on {}",
            finding.severity, finding.rule_id, finding.resource_id
        );
    }

    fn resource_evaluated(&self, resource_id: &str, findings: usize) {
        tracing::debug!("Finished {} ({} findings)", resource_id, findings);
    }
}

/// Merge the config file (if any) with command-line overrides
fn build_config(args: &ScanArgs) -> anyhow::Result<ScannerConfig> {
    let mut config = match &args.config {
        Some(path) => ScannerConfig::from_file(path)?,
        None => ScannerConfig::new(String::new()),
    };

    if let Some(subscription_id) = &args.subscription_id {
        config.subscription_id = subscription_id.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }
    if let Some(threshold) = args.severity_threshold {
        config.severity_threshold = threshold;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrent_requests = concurrency;
    }

    config.rulesets.extend(args.rulesets.iter().cloned());
    config.tag_filters.extend(parse_tag_filters(&args.tag_filters)?);
    config
        .include_resource_groups
        .extend(args.include_resource_groups.iter().cloned());
    config
        .exclude_resource_groups
        .extend(args.exclude_resource_groups.iter().cloned());

    Ok(config)
}

pub fn run(args: ScanArgs, format: &str) -> anyhow::Result<()> {
    let config = build_config(&args)?;

    let scanner = Scanner::builder(config)
        .source(InventorySource::new(&args.inventory))
        .progress(Arc::new(LogProgress))
        .ordered(args.ordered)
        .build()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(scanner.scan())?;

    // Output results
    match format {
        "text" => println!("{}", render_text(&outcome)),
        _ => {
            println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
            if let Some(path) = outcome.artifact(ArtifactKind::Json) {
                println!("JSON report: {}", path.display());
            }
            if let Some(path) = outcome.artifact(ArtifactKind::Markdown) {
                println!("Markdown report: {}", path.display());
            }
        }
    }

    // Exit with error code if critical findings
    if args.fail_on_critical && outcome.summary.has_critical_findings() {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ScanArgs,
    }

    fn parse(argv: &[&str]) -> ScanArgs {
        let mut full = vec!["vigil", "--inventory", "inventory.json"];
        full.extend_from_slice(argv);
        TestCli::parse_from(full).args
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = parse(&[
            "--subscription-id",
            "sub-1",
            "--severity-threshold",
            "high",
            "--tag-filter",
            "env = prod",
            "--concurrency",
            "4",
            "--ruleset",
            "rules/",
            "--exclude-resource-group",
            "sandbox",
        ]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.subscription_id, "sub-1");
        assert_eq!(config.severity_threshold, Severity::High);
        assert_eq!(config.tag_filters["env"], "prod");
        assert_eq!(config.concurrent_requests, 4);
        assert_eq!(config.rulesets, vec![PathBuf::from("rules/")]);
        assert_eq!(config.exclude_resource_groups, vec!["sandbox".to_string()]);
        assert_eq!(config.output_dir, PathBuf::from("reports"));
    }

    #[test]
    fn test_invalid_tag_filter_is_rejected() {
        let args = parse(&["--subscription-id", "sub-1", "--tag-filter", "novalue"]);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_config_file_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.yaml");
        std::fs::write(
            &path,
            "subscription_id: from-file\nconcurrent_requests: 2\nenable_compliance_mapping: false\n",
        )
        .unwrap();

        let args = parse(&["--config", path.to_str().unwrap(), "--concurrency", "8"]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.subscription_id, "from-file");
        assert_eq!(config.concurrent_requests, 8);
        assert!(!config.enable_compliance_mapping);
    }
}
