//! Discovery categories
//!
//! Each category pairs a discriminator with the ARM resource types it
//! covers. Categories are swept in declared order, and a row can belong to
//! more than one of them.

use vigil_core::discriminators::{AZURE_OPENAI, COGNITIVE_SERVICES, ML_WORKSPACES};

/// A discovery category
#[derive(Debug, Clone, Copy)]
pub struct Category {
    /// Discriminator assigned to matching rows
    pub discriminator: &'static str,
    matcher: fn(&str) -> bool,
}

impl Category {
    /// Whether an ARM resource type belongs to this category
    pub fn matches(&self, arm_type: &str) -> bool {
        (self.matcher)(&arm_type.to_ascii_lowercase())
    }
}

/// Built-in categories, in sweep order
pub const CATEGORIES: [Category; 3] = [
    Category {
        discriminator: AZURE_OPENAI,
        matcher: is_cognitive_account,
    },
    Category {
        discriminator: ML_WORKSPACES,
        matcher: is_ml_workspace,
    },
    Category {
        discriminator: COGNITIVE_SERVICES,
        matcher: is_cognitive_service,
    },
];

fn is_cognitive_account(arm_type: &str) -> bool {
    arm_type == "microsoft.cognitiveservices/accounts"
}

fn is_ml_workspace(arm_type: &str) -> bool {
    arm_type == "microsoft.machinelearningservices/workspaces"
}

fn is_cognitive_service(arm_type: &str) -> bool {
    arm_type.contains("microsoft.cognitiveservices")
}

/// Discriminators an ARM type falls under, in sweep order
pub fn classify(arm_type: &str) -> Vec<&'static str> {
    CATEGORIES
        .iter()
        .filter(|c| c.matches(arm_type))
        .map(|c| c.discriminator)
        .collect()
}
