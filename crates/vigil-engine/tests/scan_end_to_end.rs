//! End-to-end scans over in-memory and file-backed inventories

use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::{
    ArtifactKind, Evidence, Resource, ScanError, ScanOutcome, ScannerConfig, Severity,
};
use vigil_engine::{Scanner, JSON_REPORT_NAME, MARKDOWN_REPORT_NAME};
use vigil_rules::{Evaluator, Rule};
use vigil_source::{InventorySource, StaticSource};

fn openai(id: &str, access: &str) -> Value {
    json!({
        "id": format!("/subscriptions/sub/resourceGroups/ai/providers/Microsoft.CognitiveServices/accounts/{}", id),
        "name": id,
        "resource_type": "azure_openai",
        "properties": {"publicNetworkAccess": access}
    })
}

fn workspace(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": id,
        "resource_type": "ml_workspaces",
        "properties": {"encryption": {"status": status}}
    })
}

async fn run(config: ScannerConfig, source: StaticSource, extra: Vec<Rule>) -> vigil_core::Result<ScanOutcome> {
    Scanner::builder(config)
        .source(source)
        .extra_rules(extra)
        .build()?
        .scan()
        .await
}

fn finding_keys(outcome: &ScanOutcome) -> BTreeSet<(String, String)> {
    outcome
        .findings
        .iter()
        .map(|f| (f.rule_id.clone(), f.resource_id.clone()))
        .collect()
}

#[tokio::test]
async fn single_public_openai_account_yields_one_finding() {
    let dir = tempfile::tempdir().unwrap();
    let config = ScannerConfig::new("sub").with_output_dir(dir.path());
    let source = StaticSource::from_values(vec![openai("oai", "Enabled")]).unwrap();

    let outcome = run(config, source, Vec::new()).await.unwrap();

    assert_eq!(outcome.summary.total_findings, 1);
    assert_eq!(outcome.findings[0].rule_id, "OPENAI-001");
    assert_eq!(outcome.findings[0].severity, Severity::Critical);
    assert_eq!(outcome.findings[0].compliance["OWASP-LLM"], "LLM02");
    assert_eq!(
        outcome.artifact(ArtifactKind::Json),
        Some(dir.path().join(JSON_REPORT_NAME).as_path())
    );

    let json = std::fs::read_to_string(dir.path().join(JSON_REPORT_NAME)).unwrap();
    let positions: Vec<_> = ["\"OWASP-LLM\"", "\"NIST-AI-RMF\"", "\"MITRE-ATLAS\""]
        .iter()
        .map(|framework| json.find(framework).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn custom_rule_file_fires_on_matching_resource() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("custom.yaml");
    std::fs::write(
        &rules,
        "- rule_id: CUSTOM-001\n  title: x\n  resource_types: [azure_openai]\n  condition:\n    field: id\n    operator: exists\n",
    )
    .unwrap();

    let config = ScannerConfig::new("sub")
        .with_output_dir(dir.path().join("reports"))
        .with_ruleset(&rules);
    let source = StaticSource::from_values(vec![openai("oai", "Disabled")]).unwrap();

    let outcome = run(config, source, Vec::new()).await.unwrap();
    let ids: Vec<_> = outcome.findings.iter().map(|f| f.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["CUSTOM-001"]);
    assert_eq!(outcome.findings[0].message, "Condition matched.");
}

#[tokio::test]
async fn empty_stream_still_writes_both_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = ScannerConfig::new("sub").with_output_dir(dir.path());

    let outcome = run(config, StaticSource::default(), Vec::new()).await.unwrap();

    assert_eq!(outcome.summary.total_findings, 0);
    assert!(dir.path().join(JSON_REPORT_NAME).is_file());
    let markdown = std::fs::read_to_string(dir.path().join(MARKDOWN_REPORT_NAME)).unwrap();
    assert!(markdown.contains("- **Total Findings**: 0"));
}

#[tokio::test]
async fn malformed_rule_file_fails_before_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("bad.yaml");
    std::fs::write(&rules, "- title: missing id\n").unwrap();

    let inventory = dir.path().join("never-read.json");
    let result = Scanner::builder(ScannerConfig::new("sub").with_ruleset(&rules))
        .source(InventorySource::new(&inventory))
        .build();

    assert!(matches!(result, Err(ScanError::RuleLoad { .. })));
}

#[tokio::test]
async fn failing_source_aborts_without_report() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("reports");
    let config = ScannerConfig::new("sub").with_output_dir(&output);
    let source = StaticSource::from_values(vec![openai("a", "Enabled"), openai("b", "Enabled")])
        .unwrap()
        .fail_after(1, "query throttled");

    let err = run(config, source, Vec::new()).await.unwrap_err();

    assert!(matches!(err, ScanError::Discovery(_)));
    assert!(!output.join(JSON_REPORT_NAME).exists());
    assert!(!output.join(MARKDOWN_REPORT_NAME).exists());
}

#[tokio::test]
async fn empty_resource_types_never_fire() {
    let dir = tempfile::tempdir().unwrap();
    let config = ScannerConfig::new("sub").with_output_dir(dir.path());
    let untyped = Rule::new(
        "UNTYPED",
        "applies to nothing",
        Severity::Critical,
        Evaluator::Condition {
            condition: None,
            message: "always".to_string(),
        },
    );
    let source = StaticSource::from_values(vec![openai("a", "Disabled"), workspace("w", "Enabled")])
        .unwrap();

    let outcome = run(config, source, vec![untyped]).await.unwrap();
    assert_eq!(outcome.summary.total_findings, 0);
}

#[tokio::test]
async fn summary_invariants_hold() {
    let dir = tempfile::tempdir().unwrap();
    let config = ScannerConfig::new("sub").with_output_dir(dir.path());
    let source = StaticSource::from_values(vec![
        openai("a", "Enabled"),
        openai("b", "Disabled"),
        workspace("w1", "Disabled"),
        workspace("w2", "Enabled"),
        json!({"id": "cog", "resource_type": "cognitive_services", "properties": {}}),
    ])
    .unwrap();

    let outcome = run(config, source, Vec::new()).await.unwrap();
    let summary = &outcome.summary;

    assert_eq!(summary.total_findings, outcome.findings.len());
    assert_eq!(summary.by_severity.values().sum::<usize>(), summary.total_findings);
    assert!(summary.unique_resources <= summary.total_findings);
    assert_eq!(summary.count(Severity::Critical), 1);
    assert_eq!(summary.count(Severity::High), 1);
    assert_eq!(summary.count(Severity::Medium), 1);
}

#[tokio::test]
async fn concurrency_cap_is_never_exceeded() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tracked = {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        Rule::new(
            "TRACKED",
            "tracks concurrency",
            Severity::Low,
            Evaluator::from_fn(move |resource: Resource| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(Some(Evidence::new(resource.id().to_string())))
                }
            }),
        )
        .with_resource_type("custom")
    };

    let dir = tempfile::tempdir().unwrap();
    let config = ScannerConfig::new("sub")
        .with_output_dir(dir.path())
        .with_concurrency(3);
    let source = StaticSource::from_values(
        (0..20).map(|i| json!({"id": format!("r{}", i), "resource_type": "custom"})),
    )
    .unwrap();

    let outcome = run(config, source, vec![tracked]).await.unwrap();

    assert_eq!(outcome.summary.total_findings, 20);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 3, "peak concurrency was {}", peak);
}

#[tokio::test]
async fn raising_the_cap_keeps_the_same_findings() {
    let records = || {
        (0..12).flat_map(|i| {
            vec![
                openai(&format!("oai{}", i), if i % 2 == 0 { "Enabled" } else { "Disabled" }),
                workspace(&format!("ws{}", i), if i % 3 == 0 { "Disabled" } else { "Enabled" }),
            ]
        })
    };

    let dir = tempfile::tempdir().unwrap();
    let mut results = Vec::new();
    for cap in [1, 4, 32] {
        let config = ScannerConfig::new("sub")
            .with_output_dir(dir.path().join(cap.to_string()))
            .with_concurrency(cap);
        let source = StaticSource::from_values(records()).unwrap();
        results.push(finding_keys(&run(config, source, Vec::new()).await.unwrap()));
    }

    assert_eq!(results[0].len(), 10);
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
}

#[tokio::test]
async fn inventory_source_and_filters() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = dir.path().join("inventory.json");
    let rows = json!([
        {
            "id": "/subscriptions/s/resourceGroups/prod/providers/Microsoft.CognitiveServices/accounts/a",
            "name": "a",
            "type": "Microsoft.CognitiveServices/accounts",
            "tags": {"env": "prod"},
            "properties": {"publicNetworkAccess": "Enabled", "disableSoftDelete": true}
        },
        {
            "id": "/subscriptions/s/resourceGroups/dev/providers/Microsoft.CognitiveServices/accounts/b",
            "name": "b",
            "type": "Microsoft.CognitiveServices/accounts",
            "tags": {"env": "dev"},
            "properties": {"publicNetworkAccess": "Enabled"}
        }
    ]);
    std::fs::write(&inventory, rows.to_string()).unwrap();

    let config = ScannerConfig::new("sub")
        .with_output_dir(dir.path().join("reports"))
        .with_tag_filter("Env", "PROD");

    let outcome = Scanner::builder(config)
        .source(InventorySource::new(&inventory))
        .ordered(true)
        .build()
        .unwrap()
        .scan()
        .await
        .unwrap();

    let ids: Vec<_> = outcome.findings.iter().map(|f| f.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["OPENAI-001", "COGNITIVE-002"]);
    assert_eq!(outcome.summary.unique_resources, 1);
    assert!(outcome.findings.iter().all(|f| f.resource_name == "a"));

    let report: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("reports").join(JSON_REPORT_NAME)).unwrap(),
    )
    .unwrap();
    assert_eq!(report["config"]["tag_filters"]["Env"], json!("PROD"));
}
