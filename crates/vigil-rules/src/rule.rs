//! Security rules and their evaluators

use crate::condition::Condition;
use crate::error::RuleResult;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use vigil_core::{ComplianceMap, Evidence, Finding, Resource, Severity};

/// Native check over a resource
pub type BuiltinCheck = fn(&Resource) -> Option<Evidence>;

/// Evidence message used by declarative rules that do not set one
pub const DEFAULT_CONDITION_MESSAGE: &str = "Condition matched.";

/// An evaluator that needs to await secondary lookups before it can decide
#[async_trait]
pub trait DeferredCheck: Send + Sync {
    async fn evaluate(&self, resource: &Resource) -> RuleResult<Option<Evidence>>;
}

/// Adapter turning an async closure into a [`DeferredCheck`]
struct FnCheck<F>(F);

#[async_trait]
impl<F> DeferredCheck for FnCheck<F>
where
    F: Fn(Resource) -> BoxFuture<'static, RuleResult<Option<Evidence>>> + Send + Sync,
{
    async fn evaluate(&self, resource: &Resource) -> RuleResult<Option<Evidence>> {
        (self.0)(resource.clone()).await
    }
}

/// How a rule decides whether a resource violates it.
///
/// Resolved when the rule is built; nothing is looked up by name at
/// evaluation time.
#[derive(Clone)]
pub enum Evaluator {
    /// Native check compiled into the scanner
    Builtin(BuiltinCheck),
    /// Data-driven condition tree; `None` matches every resource
    Condition {
        condition: Option<Condition>,
        message: String,
    },
    /// Programmatically supplied async check
    Deferred(Arc<dyn DeferredCheck>),
}

impl Evaluator {
    /// Declarative evaluator with the default message
    pub fn condition(condition: Condition) -> Self {
        Evaluator::Condition {
            condition: Some(condition),
            message: DEFAULT_CONDITION_MESSAGE.to_string(),
        }
    }

    /// Wrap an async closure. The closure receives its own copy of the resource.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Resource) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RuleResult<Option<Evidence>>> + Send + 'static,
    {
        let boxed = move |resource: Resource| -> BoxFuture<'static, RuleResult<Option<Evidence>>> {
            Box::pin(f(resource))
        };
        Evaluator::Deferred(Arc::new(FnCheck(boxed)))
    }

    /// Evaluate against a resource; `Ok(None)` means the rule holds
    pub async fn evaluate(&self, resource: &Resource) -> RuleResult<Option<Evidence>> {
        match self {
            Evaluator::Builtin(check) => Ok(check(resource)),
            Evaluator::Condition { condition, message } => {
                let matched = condition
                    .as_ref()
                    .map(|c| c.matches(resource))
                    .unwrap_or(true);
                Ok(matched.then(|| {
                    let evidence = condition
                        .as_ref()
                        .map(Condition::to_value)
                        .unwrap_or_else(|| Value::Object(Default::default()));
                    Evidence::new(message.clone()).with_detail("evidence", evidence)
                }))
            }
            Evaluator::Deferred(check) => check.evaluate(resource).await,
        }
    }

    /// Short name of the evaluator kind
    pub fn kind(&self) -> &'static str {
        match self {
            Evaluator::Builtin(_) => "builtin",
            Evaluator::Condition { .. } => "condition",
            Evaluator::Deferred(_) => "deferred",
        }
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Evaluator::Condition { condition, message } => f
                .debug_struct("Condition")
                .field("condition", condition)
                .field("message", message)
                .finish(),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// A security rule evaluated against discovered resources
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule identifier; not guaranteed unique across a merged set
    pub rule_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// Discriminators this rule applies to; empty matches nothing
    pub resource_types: Vec<String>,
    pub evaluator: Evaluator,
    pub remediation: String,
    /// Framework name to control id, in declaration order
    pub compliance: ComplianceMap,
}

impl Rule {
    pub fn new(
        rule_id: impl Into<String>,
        title: impl Into<String>,
        severity: Severity,
        evaluator: Evaluator,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            title: title.into(),
            description: String::new(),
            severity,
            resource_types: Vec::new(),
            evaluator,
            remediation: String::new(),
            compliance: ComplianceMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_types.push(resource_type.into());
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }

    pub fn with_compliance(mut self, framework: impl Into<String>, control: impl Into<String>) -> Self {
        self.compliance.insert(framework, control);
        self
    }

    /// Whether this rule should be evaluated for the given discriminator
    pub fn applies_to(&self, resource_type: &str) -> bool {
        self.resource_types.iter().any(|t| t == resource_type)
    }

    /// Evaluate the rule against a resource
    pub async fn evaluate(&self, resource: &Resource) -> RuleResult<Option<Evidence>> {
        self.evaluator.evaluate(resource).await
    }

    /// Convert violation evidence into a finding
    pub fn to_finding(&self, resource: &Resource, evidence: Evidence, with_compliance: bool) -> Finding {
        Finding {
            rule_id: self.rule_id.clone(),
            title: self.title.clone(),
            severity: self.severity,
            resource_id: resource.id().to_string(),
            resource_name: resource.name().to_string(),
            resource_type: resource.resource_type().to_string(),
            message: evidence.message.clone(),
            compliance: if with_compliance {
                self.compliance.clone()
            } else {
                ComplianceMap::new()
            },
            remediation: self.remediation.clone(),
            evidence,
        }
    }
}

/// An ordered collection of rules.
///
/// Duplicate rule ids are kept; every copy is evaluated.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Create a new empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge rule sources in evaluation order: built-ins, loaded files, extras
    pub fn assemble(
        builtins: Vec<Rule>,
        loaded: Vec<Rule>,
        extra: impl IntoIterator<Item = Rule>,
    ) -> Self {
        let mut set = Self { rules: builtins };
        set.rules.extend(loaded);
        set.rules.extend(extra);
        set
    }

    /// Add a rule to the end of the set
    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// First rule with the given id
    pub fn get(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.rule_id == rule_id)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Rules to run for a discriminator at or above a severity threshold
    pub fn applicable<'a>(
        &'a self,
        resource_type: &'a str,
        min_severity: Severity,
    ) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.severity >= min_severity && r.applies_to(resource_type))
    }

    /// Rule ids that occur more than once, in first-seen order
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut duplicates = Vec::new();
        for rule in &self.rules {
            let count = counts.entry(rule.rule_id.as_str()).or_insert(0);
            *count += 1;
            if *count == 2 {
                duplicates.push(rule.rule_id.as_str());
            }
        }
        duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;
    use crate::error::RuleError;
    use serde_json::json;

    fn resource() -> Resource {
        Resource::from_value(json!({
            "id": "1",
            "name": "demo",
            "resource_type": "azure_openai",
            "properties": {"publicNetworkAccess": "Enabled"}
        }))
        .unwrap()
    }

    fn always(_: &Resource) -> Option<Evidence> {
        Some(Evidence::new("always"))
    }

    #[tokio::test]
    async fn test_condition_evidence() {
        let condition = Condition::leaf("id", Operator::Exists, Value::Null).unwrap();
        let rule = Rule::new("CUSTOM-001", "x", Severity::Low, Evaluator::condition(condition))
            .with_resource_type("azure_openai");

        let evidence = rule.evaluate(&resource()).await.unwrap().unwrap();
        assert_eq!(evidence.message, DEFAULT_CONDITION_MESSAGE);
        assert_eq!(evidence.details["evidence"]["operator"], json!("exists"));
    }

    #[tokio::test]
    async fn test_missing_condition_always_matches() {
        let evaluator = Evaluator::Condition {
            condition: None,
            message: "no condition".to_string(),
        };
        let evidence = evaluator.evaluate(&resource()).await.unwrap().unwrap();
        assert_eq!(evidence.message, "no condition");
    }

    #[tokio::test]
    async fn test_deferred_evaluator_is_awaited() {
        let evaluator = Evaluator::from_fn(|resource: Resource| async move {
            tokio::task::yield_now().await;
            Ok(Some(Evidence::new(format!("looked up {}", resource.id()))))
        });
        let evidence = evaluator.evaluate(&resource()).await.unwrap().unwrap();
        assert_eq!(evidence.message, "looked up 1");

        let failing = Evaluator::from_fn(|_resource: Resource| async move {
            Err(RuleError::Evaluation("lookup failed".to_string()))
        });
        assert!(failing.evaluate(&resource()).await.is_err());
    }

    #[test]
    fn test_to_finding_copies_rule_metadata() {
        let rule = Rule::new("R-1", "Title", Severity::High, Evaluator::Builtin(always))
            .with_resource_type("azure_openai")
            .with_remediation("fix it")
            .with_compliance("OWASP-LLM", "LLM02");

        let finding = rule.to_finding(&resource(), Evidence::new("bad"), true);
        assert_eq!(finding.rule_id, "R-1");
        assert_eq!(finding.resource_name, "demo");
        assert_eq!(finding.message, "bad");
        assert_eq!(finding.compliance.get("OWASP-LLM"), Some("LLM02"));

        let finding = rule.to_finding(&resource(), Evidence::new("bad"), false);
        assert!(finding.compliance.is_empty());
    }

    #[test]
    fn test_applicable_filters_type_and_severity() {
        let set = RuleSet::assemble(
            vec![
                Rule::new("A", "a", Severity::Low, Evaluator::Builtin(always))
                    .with_resource_type("azure_openai"),
                Rule::new("B", "b", Severity::Critical, Evaluator::Builtin(always))
                    .with_resource_type("azure_openai"),
            ],
            vec![Rule::new("C", "c", Severity::Critical, Evaluator::Builtin(always))],
            vec![Rule::new("A", "dup", Severity::High, Evaluator::Builtin(always))
                .with_resource_type("ml_workspaces")],
        );

        let ids: Vec<_> = set
            .applicable("azure_openai", Severity::Medium)
            .map(|r| r.rule_id.as_str())
            .collect();
        assert_eq!(ids, vec!["B"]);
        assert_eq!(set.applicable("ml_workspaces", Severity::Low).count(), 1);
        assert_eq!(set.duplicate_ids(), vec!["A"]);
        assert_eq!(set.get("A").map(|r| r.title.as_str()), Some("a"));
        assert_eq!(set.len(), 4);
    }
}
