//! Built-in cloud AI security checks

use crate::rule::{Evaluator, Rule};
use serde_json::Value;
use vigil_core::discriminators::{AZURE_OPENAI, COGNITIVE_SERVICES, ML_WORKSPACES};
use vigil_core::{Evidence, Resource, Severity};

/// All built-in rules, in their fixed declared order
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "OPENAI-001",
            "Disable public access",
            Severity::Critical,
            Evaluator::Builtin(public_network_enabled),
        )
        .with_description("Azure OpenAI accounts must restrict public network access.")
        .with_resource_type(AZURE_OPENAI)
        .with_remediation(
            "Configure Azure OpenAI account to use private endpoints or set publicNetworkAccess to Disabled.",
        )
        .with_compliance("OWASP-LLM", "LLM02")
        .with_compliance("NIST-AI-RMF", "GOVERN-MAP-1")
        .with_compliance("MITRE-ATLAS", "AML.T0051"),
        Rule::new(
            "ML-001",
            "Encryption at rest",
            Severity::High,
            Evaluator::Builtin(missing_customer_managed_key),
        )
        .with_description("Azure ML workspaces should enforce customer-managed keys.")
        .with_resource_type(ML_WORKSPACES)
        .with_remediation("Configure workspace encryption with customer-managed keys.")
        .with_compliance("OWASP-LLM", "LLM03")
        .with_compliance("NIST-AI-RMF", "MEASURE-1")
        .with_compliance("MITRE-ATLAS", "AML.T0020"),
        Rule::new(
            "COGNITIVE-002",
            "Soft delete must remain enabled",
            Severity::Medium,
            Evaluator::Builtin(soft_delete_disabled),
        )
        .with_description("Cognitive Services accounts must enable soft delete for resiliency.")
        .with_resource_type(COGNITIVE_SERVICES)
        .with_remediation("Enable soft delete in Azure portal or API.")
        .with_compliance("OWASP-LLM", "LLM08")
        .with_compliance("NIST-AI-RMF", "MANAGE-3")
        .with_compliance("MITRE-ATLAS", "AML.T0024"),
    ]
}

fn public_network_enabled(resource: &Resource) -> Option<Evidence> {
    let access = resource.property("publicNetworkAccess")?;
    let enabled = access
        .as_str()
        .map(|s| s.eq_ignore_ascii_case("enabled"))
        .unwrap_or(false);

    enabled.then(|| {
        Evidence::new("Public network access is enabled; enforce private endpoints.")
            .with_detail("publicNetworkAccess", access.clone())
    })
}

fn missing_customer_managed_key(resource: &Resource) -> Option<Evidence> {
    let status = resource
        .lookup("properties.encryption.status")
        .and_then(Value::as_str)
        .unwrap_or("Disabled");

    status.eq_ignore_ascii_case("disabled").then(|| {
        Evidence::new("Customer-managed key not configured.")
            .with_detail("encryptionStatus", Value::String(status.to_string()))
    })
}

// An account without any properties is treated as unprotected.
fn soft_delete_disabled(resource: &Resource) -> Option<Evidence> {
    let properties = resource.properties();
    let flag = properties.get("disableSoftDelete");
    if !properties.is_empty() && !flag.map(is_truthy).unwrap_or(false) {
        return None;
    }

    Some(
        Evidence::new("Soft delete is disabled; enable to prevent accidental loss.")
            .with_detail("disableSoftDelete", flag.cloned().unwrap_or(Value::Null)),
    )
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
