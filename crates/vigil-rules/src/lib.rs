//! Rule model for Vigil
//!
//! Provides the rule representation, the built-in cloud AI checks, and
//! loading of declarative rules from YAML files or directories.
//!
//! # Example
//!
//! ```no_run
//! use vigil_rules::load_rules;
//! use std::path::Path;
//!
//! let rules = load_rules(&[Path::new("/path/to/rules")], Vec::new()).unwrap();
//! println!("Loaded {} rules", rules.len());
//! ```

pub mod builtin;
pub mod condition;
pub mod error;
pub mod loader;
pub mod rule;

pub use builtin::builtin_rules;
pub use condition::{Condition, Operator};
pub use error::{RuleError, RuleResult};
pub use loader::{discover_rule_files, load_rule_file, load_rule_files, load_rules, parse_rules};
pub use rule::{BuiltinCheck, DeferredCheck, Evaluator, Rule, RuleSet, DEFAULT_CONDITION_MESSAGE};
