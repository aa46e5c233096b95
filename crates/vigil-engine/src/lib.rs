//! Orchestration engine for Vigil scans
//!
//! Coordinates resource discovery, bounded-concurrency rule evaluation and
//! report aggregation.

mod filter;
mod report;
mod scanner;

pub use filter::*;
pub use report::*;
pub use scanner::*;
