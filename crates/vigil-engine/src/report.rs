//! Aggregation and report output

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use vigil_core::{
    ArtifactKind, Finding, ReportArtifact, ReportSink, Result, ScanError, ScanOutcome, ScanReport,
    Severity, Summary,
};

/// File name of the structured artifact
pub const JSON_REPORT_NAME: &str = "scan-report.json";
/// File name of the prose artifact
pub const MARKDOWN_REPORT_NAME: &str = "scan-report.md";

/// Compute summary statistics over a list of findings
pub fn summarize(findings: &[Finding]) -> Summary {
    let mut by_severity: BTreeMap<Severity, usize> = BTreeMap::new();
    for finding in findings {
        *by_severity.entry(finding.severity).or_insert(0) += 1;
    }

    let unique_resources = findings
        .iter()
        .map(|f| f.resource_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    Summary {
        total_findings: findings.len(),
        by_severity,
        unique_resources,
    }
}

/// Format the report as pretty-printed JSON
pub fn render_json(report: &ScanReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Format the report as Markdown prose
pub fn render_markdown(report: &ScanReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push("# AI Cloud Security Scan Report\n".to_string());
    lines.push(format!("_Generated: {}_\n", report.generated_at.to_rfc3339()));

    let summary = &report.summary;
    lines.push("## Summary\n".to_string());
    lines.push(format!("- **Total Findings**: {}", summary.total_findings));
    let by_severity = if summary.by_severity.is_empty() {
        "none".to_string()
    } else {
        summary
            .by_severity
            .iter()
            .map(|(severity, count)| format!("{}: {}", severity, count))
            .collect::<Vec<_>>()
            .join(", ")
    };
    lines.push(format!("- **By Severity**: {}", by_severity));
    lines.push(format!("- **Unique Resources**: {}", summary.unique_resources));

    lines.push("\n## Findings\n".to_string());
    for finding in &report.findings {
        lines.push(format!("### {} - {}", finding.rule_id, finding.title));
        lines.push(format!("- Severity: {}", finding.severity));
        lines.push(format!("- Resource: `{}`", finding.resource_id));
        lines.push(format!("- Message: {}", finding.message));
        if !finding.compliance.is_empty() {
            lines.push("- Compliance Mapping:".to_string());
            for (framework, control) in &finding.compliance {
                lines.push(format!("  - {}: {}", framework, control));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Format a scan outcome for the console
pub fn render_text(outcome: &ScanOutcome) -> String {
    let mut output = String::new();

    output.push_str(&format!("Vigil Scan Summary\n{}\n\n", "=".repeat(18)));

    let summary = &outcome.summary;
    output.push_str(&format!("Total Findings: {}\n", summary.total_findings));
    output.push_str(&format!("Unique Resources: {}\n\n", summary.unique_resources));

    output.push_str("Findings by Severity\n--------------------\n");
    for severity in Severity::ALL.iter().rev() {
        output.push_str(&format!("{}: {}\n", severity, summary.count(*severity)));
    }
    output.push('\n');

    if !outcome.findings.is_empty() {
        output.push_str("Findings\n--------\n\n");
        for finding in &outcome.findings {
            output.push_str(&format!("[{}] {} {}\n", finding.severity, finding.rule_id, finding.title));
            output.push_str(&format!("Resource: {}\n", finding.resource_id));
            output.push_str(&format!("Message: {}\n", finding.message));
            if !finding.remediation.is_empty() {
                output.push_str(&format!("Remediation: {}\n", finding.remediation));
            }
            output.push('\n');
        }
    }

    if !outcome.artifacts.is_empty() {
        output.push_str("Reports\n-------\n");
        for artifact in &outcome.artifacts {
            output.push_str(&format!("{}: {}\n", artifact.kind, artifact.path.display()));
        }
    }

    output
}

/// Writes the JSON and Markdown artifacts into a directory
#[derive(Debug, Clone)]
pub struct FileReportSink {
    output_dir: PathBuf,
}

impl FileReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    async fn write(&self, report: &ScanReport) -> Result<Vec<ReportArtifact>> {
        let rendered = vec![
            (ArtifactKind::Json, JSON_REPORT_NAME, render_json(report)?),
            (
                ArtifactKind::Markdown,
                MARKDOWN_REPORT_NAME,
                render_markdown(report),
            ),
        ];
        let output_dir = self.output_dir.clone();

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&output_dir).map_err(|source| ScanError::ReportWrite {
                path: output_dir.clone(),
                source,
            })?;

            let staged = rendered
                .into_iter()
                .map(|(kind, name, content)| {
                    let path = output_dir.join(name);
                    let file = stage(&path, content.as_bytes())?;
                    Ok((kind, path, file))
                })
                .collect::<Result<Vec<_>>>()?;

            persist_all(staged)
        })
        .await
        .map_err(|e| ScanError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
    }
}

fn report_error(path: &Path) -> impl Fn(std::io::Error) -> ScanError + '_ {
    move |source| ScanError::ReportWrite {
        path: path.to_path_buf(),
        source,
    }
}

/// Write and sync a temporary file next to `path`
fn stage(path: &Path, content: &[u8]) -> Result<NamedTempFile> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut file = NamedTempFile::new_in(dir).map_err(report_error(path))?;
    file.write_all(content).map_err(report_error(path))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(report_error(path))?;
    }
    file.as_file().sync_all().map_err(report_error(path))?;
    Ok(file)
}

/// Rename every staged file into place, or none of them
fn persist_all(staged: Vec<(ArtifactKind, PathBuf, NamedTempFile)>) -> Result<Vec<ReportArtifact>> {
    let mut artifacts: Vec<ReportArtifact> = Vec::with_capacity(staged.len());

    for (kind, path, file) in staged {
        if let Err(e) = file.persist(&path) {
            for written in &artifacts {
                if let Err(remove) = std::fs::remove_file(&written.path) {
                    tracing::warn!("Failed to remove {}: {}", written.path.display(), remove);
                }
            }
            return Err(report_error(&path)(e.error));
        }
        tracing::debug!("Wrote {} report to {}", kind, path.display());
        artifacts.push(ReportArtifact { kind, path });
    }

    Ok(artifacts)
}
