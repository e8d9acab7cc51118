use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::GlobalArgs;
use crate::cleanup::{AssumeYes, Cleaner, CleanupOptions, CleanupOutcome, Confirmation, PromptConfirmation};
use crate::manifests::{self, Secrets};
use crate::runner::SystemRunner;
use crate::ui;

/// Delete the demo resources, keeping the VPC and subnets
#[derive(Args)]
pub struct CleanupCommand {
    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Also uninstall Crossplane itself
    #[arg(long)]
    uninstall_crossplane: bool,
}

impl CleanupCommand {
    pub async fn run(&self, global: &GlobalArgs) -> Result<()> {
        let config = global.resolve_config()?;
        let plan = manifests::render_all(&config, &Secrets::masked())?;

        ui::print_section("Demo Environment Cleanup");

        let confirmation: &dyn Confirmation = if self.yes {
            &AssumeYes
        } else {
            &PromptConfirmation
        };
        let options = CleanupOptions {
            uninstall_crossplane: self.uninstall_crossplane,
        };

        match Cleaner::new(&SystemRunner, &config, &plan, options).run(confirmation) {
            CleanupOutcome::Declined => {
                println!("{}", "Cleanup cancelled.".yellow());
                Ok(())
            }
            CleanupOutcome::Completed(report) => {
                report.print_summary();
                if report.has_errors() {
                    anyhow::bail!("Cleanup finished with {} errors", report.errors.len());
                }
                Ok(())
            }
        }
    }
}
