//! Crossplane AWS demo environment library.
//!
//! Installs Crossplane and the AWS provider family into the current
//! Kubernetes cluster, applies a small demo environment (VPC, subnets,
//! security groups, RDS, S3 and a web workload), validates it and tears it
//! down again. All cluster and cloud work goes through `kubectl`, `helm`
//! and the AWS CLI behind the [`runner::CommandRunner`] seam.
//!
//! # Example
//!
//! ```ignore
//! use xpdemo_cli::{manifests, DemoConfig, InstallOptions, Installer, SystemRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DemoConfig::default();
//!     let plan = manifests::render_all(&config, &manifests::Secrets::generate())?;
//!     Installer::new(&SystemRunner, &config, &plan, InstallOptions::default())
//!         .run()
//!         .await
//! }
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]
// Allow async functions that don't use await
#![allow(clippy::unused_async)]

pub mod cleanup;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod manifests;
pub mod orchestrator;
pub mod runner;
pub mod steps;
pub mod tools;
pub mod ui;
pub mod validation;
pub mod validator;

// Re-export commonly used types at the crate root
pub use cleanup::{Cleaner, CleanupOptions, CleanupOutcome, CleanupReport, Confirmation};
pub use config::DemoConfig;
pub use manifests::{Category, ResourcePlan, ResourceRef};
pub use orchestrator::{InstallOptions, Installer};
pub use runner::{CommandOutput, CommandRunner, Invocation, SystemRunner, ToolError};
pub use steps::InstallStep;
pub use validation::{ValidationReport, Validator};
