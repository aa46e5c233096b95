//! Rule commands

use clap::{Args, Subcommand};
use std::path::PathBuf;
use vigil_core::Severity;
use vigil_rules::{discover_rule_files, load_rule_file, load_rules, Rule};

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List the built-in rules and any loaded rule files
    List(ListArgs),

    /// Validate rule files
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Additional rule file or directory
    #[arg(short, long = "ruleset")]
    rulesets: Vec<PathBuf>,

    /// Only show rules at or above this severity
    #[arg(long)]
    severity: Option<Severity>,

    /// Show full rule details
    #[arg(short, long)]
    details: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Rule paths to validate
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Show every valid file, not only failures
    #[arg(short, long)]
    details: bool,
}

pub fn run(cmd: RulesCommands) -> anyhow::Result<()> {
    match cmd {
        RulesCommands::List(args) => list_rules(args),
        RulesCommands::Validate(args) => validate_rules(args),
    }
}

fn list_rules(args: ListArgs) -> anyhow::Result<()> {
    let ruleset = load_rules(&args.rulesets, Vec::new())?;
    println!("Loaded {} rules\n", ruleset.len());

    let min_severity = args.severity.unwrap_or(Severity::Low);
    let rules: Vec<&Rule> = ruleset.iter().filter(|r| r.severity >= min_severity).collect();

    println!("Showing {} rules (after filters)\n", rules.len());

    for rule in rules {
        let severity_color = match rule.severity {
            Severity::Critical => "\x1b[91m",
            Severity::High => "\x1b[93m",
            Severity::Medium => "\x1b[33m",
            Severity::Low => "\x1b[36m",
        };
        let reset = "\x1b[0m";

        println!(
            "[{}{}{}] {} - {}",
            severity_color, rule.severity, reset, rule.rule_id, rule.title
        );

        if args.details {
            if !rule.description.is_empty() {
                println!("  Description: {}", rule.description);
            }
            if rule.resource_types.is_empty() {
                println!("  Resource types: (none, never fires)");
            } else {
                println!("  Resource types: {}", rule.resource_types.join(", "));
            }
            println!("  Evaluator: {}", rule.evaluator.kind());
            if !rule.remediation.is_empty() {
                println!("  Remediation: {}", rule.remediation);
            }
            for (framework, control) in &rule.compliance {
                println!("  {}: {}", framework, control);
            }
            println!();
        }
    }

    for rule_id in ruleset.duplicate_ids() {
        eprintln!("warning: rule id {} is defined more than once", rule_id);
    }

    Ok(())
}

fn validate_rules(args: ValidateArgs) -> anyhow::Result<()> {
    let mut total = 0;
    let mut valid = 0;
    let mut invalid = 0;

    for path in &args.paths {
        let files = match discover_rule_files(path) {
            Ok(files) => files,
            Err(e) => {
                invalid += 1;
                println!("✗ {} - {}", path.display(), e);
                continue;
            }
        };

        for file in files {
            total += 1;
            match load_rule_file(&file) {
                Ok(rules) => {
                    valid += 1;
                    if args.details {
                        println!("✓ {} - {} rules", file.display(), rules.len());
                    }
                }
                Err(e) => {
                    invalid += 1;
                    println!("✗ {} - {}", file.display(), e);
                }
            }
        }
    }

    println!();
    println!("Validation Summary:");
    println!("  Total:   {}", total);
    println!("  Valid:   {}", valid);
    println!("  Invalid: {}", invalid);

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}
