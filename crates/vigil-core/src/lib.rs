//! Vigil Core
//!
//! Core types, traits, and error handling for the Vigil cloud AI posture scanner.

pub mod config;
pub mod error;
pub mod report;
pub mod resource;
pub mod traits;

pub use config::*;
pub use error::{Result, ScanError};
pub use report::*;
pub use resource::{discriminators, Resource};
pub use traits::*;
