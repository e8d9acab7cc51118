use anyhow::{Context, Result};
use clap::Args;

use super::{kubeconfig_context, GlobalArgs};
use crate::config::DemoConfig;
use crate::manifests::{self, Secrets};
use crate::orchestrator::{InstallOptions, Installer};
use crate::runner::{CommandRunner, SystemRunner};
use crate::ui;

/// Install Crossplane, the AWS provider and the demo resources
#[derive(Args)]
pub struct InstallCommand {
    /// Apply resources without waiting for them to become ready
    #[arg(long)]
    skip_wait: bool,

    /// Crossplane is already installed; skip the Helm chart
    #[arg(long)]
    no_crossplane: bool,
}

impl InstallCommand {
    pub async fn run(&self, global: &GlobalArgs) -> Result<()> {
        ui::print_banner();

        let config = global.resolve_config()?;
        let context = kubeconfig_context()
            .context("A kubeconfig with a current context is required to install")?;

        self.execute(&SystemRunner, &config, &context).await
    }

    /// Run the install sequence against `context`. Never prompts.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn execute(
        &self,
        runner: &dyn CommandRunner,
        config: &DemoConfig,
        context: &str,
    ) -> Result<()> {
        ui::print_kv("Context", context);
        ui::print_kv("AWS profile", &config.aws_profile);
        ui::print_kv("Region", &config.region);
        ui::print_kv("Name prefix", &config.name_prefix);

        let plan = manifests::render_all(config, &Secrets::generate())?;
        let options = InstallOptions {
            skip_wait: self.skip_wait,
            no_crossplane: self.no_crossplane,
        };

        Installer::new(runner, config, &plan, options).run().await
    }
}
