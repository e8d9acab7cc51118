//! Validate command - demo environment health check.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::{kubeconfig_context, GlobalArgs};
use crate::manifests::{self, Secrets};
use crate::runner::SystemRunner;
use crate::validation::Validator;

/// Check the controller, provider, credentials and demo resources.
#[derive(Args)]
pub struct ValidateCommand {
    /// Output report as JSON.
    #[arg(long, default_value = "false")]
    json: bool,
}

impl ValidateCommand {
    /// Run the validation command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or any core check failed.
    pub async fn run(&self, global: &GlobalArgs) -> Result<()> {
        let config = global.resolve_config()?;
        let plan = manifests::render_all(&config, &Secrets::masked())?;
        let cluster = kubeconfig_context().unwrap_or_else(|_| "unknown".to_string());

        info!(%cluster, profile = %config.aws_profile, "Starting validation");

        let report = Validator::new(&SystemRunner, &config, &plan).run(&cluster);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            report.print_summary();
        }

        if report.failed_count() == 0 {
            Ok(())
        } else {
            anyhow::bail!("Validation found {} failed checks", report.failed_count());
        }
    }
}
