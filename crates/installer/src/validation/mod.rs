//! Demo environment validation.
//!
//! Core components (controller, provider, credentials) must be healthy;
//! managed resources and the workload only produce warnings while they
//! are still converging.

pub mod checks;
pub mod report;

pub use checks::Validator;
pub use report::{CheckGroup, CheckResult, CheckStatus, ValidationReport};
