//! Installer orchestration module.
//!
//! Runs the install steps in order against the current cluster:
//! - Crossplane chart and AWS provider packages
//! - Provider credentials
//! - Managed resources, one category at a time, waiting for `Ready`
//! - The sample web workload

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::config::DemoConfig;
use crate::credentials::CredentialConfigurator;
use crate::manifests::{Category, ResourcePlan, ResourceRef};
use crate::runner::{CommandRunner, ToolError};
use crate::steps::InstallStep;
use crate::tools::{Helm, Kubectl};
use crate::ui;
use crate::validator::PrerequisitesValidator;

/// Name of the deployment the Crossplane chart creates.
const CROSSPLANE_DEPLOYMENT: &str = "deployment.apps/crossplane";

/// Switches that change which steps do work.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Apply resources without waiting for readiness.
    pub skip_wait: bool,
    /// Crossplane is already installed; skip the chart.
    pub no_crossplane: bool,
}

/// Runs the install sequence.
pub struct Installer<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a DemoConfig,
    plan: &'a ResourcePlan,
    options: InstallOptions,
}

impl<'a> Installer<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        config: &'a DemoConfig,
        plan: &'a ResourcePlan,
        options: InstallOptions,
    ) -> Self {
        Self {
            runner,
            config,
            plan,
            options,
        }
    }

    fn kubectl(&self) -> Kubectl<'a> {
        Kubectl::new(self.runner)
    }

    /// Execute every step, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first step error. Nothing applied so far is rolled back.
    pub async fn run(&self) -> Result<()> {
        ui::print_section("Starting Installation");

        let mut step = InstallStep::CheckingPrerequisites;
        while step != InstallStep::Complete {
            ui::print_progress_step(step.step_number(), InstallStep::TOTAL_STEPS, step.description());

            if self.options.no_crossplane && step.is_crossplane_install() {
                ui::print_info("Skipped (--no-crossplane)");
                step = step.next();
                continue;
            }

            if let Err(e) = self.execute_step(step).await {
                error!(step = ?step, error = %e, "Installation failed");
                ui::print_error(&format!("Installation failed at step '{step}': {e:#}"));
                return Err(e.context(format!("Step {} failed: {step}", step.step_number())));
            }
            step = step.next();
        }

        ui::print_progress_step(
            InstallStep::Complete.step_number(),
            InstallStep::TOTAL_STEPS,
            InstallStep::Complete.description(),
        );
        self.print_success_summary();
        Ok(())
    }

    async fn execute_step(&self, step: InstallStep) -> Result<()> {
        info!(step = ?step, "Executing step");

        match step {
            InstallStep::CheckingPrerequisites => PrerequisitesValidator::new(self.runner).validate(),
            InstallStep::CheckingCluster => self.check_cluster(),
            InstallStep::InstallingCrossplane => self.install_crossplane(),
            InstallStep::WaitingCrossplane => self.wait_crossplane(),
            InstallStep::InstallingProvider => self.apply_category(Category::Provider),
            InstallStep::WaitingProvider => self.wait_providers(),
            InstallStep::ConfiguringCredentials => {
                CredentialConfigurator::new(self.runner, self.config)
                    .configure(self.plan)
                    .await
            }
            InstallStep::Complete => Ok(()),
            other => match other.category() {
                Some(category) => {
                    self.apply_category(category)?;
                    self.wait_category(category)
                }
                None => Ok(()),
            },
        }
    }

    fn check_cluster(&self) -> Result<()> {
        let kubectl = self.kubectl();
        let context = kubectl
            .current_context()
            .context("No current kubectl context; point KUBECONFIG at the target cluster")?;
        kubectl
            .cluster_info()
            .with_context(|| format!("Kubernetes cluster for context '{context}' is not reachable"))?;
        ui::print_kv("Context", &context);
        Ok(())
    }

    fn install_crossplane(&self) -> Result<()> {
        let crossplane = &self.config.crossplane;
        let helm = Helm::new(self.runner);

        ui::print_progress("Adding Crossplane Helm repository...");
        helm.repo_add(&crossplane.repo_name, &crossplane.repo_url)
            .context("Failed to add Crossplane Helm repository")?;
        helm.repo_update()
            .context("Failed to update Helm repositories")?;

        ui::print_progress("Installing Crossplane chart...");
        helm.upgrade_install(
            &crossplane.release,
            &crossplane.chart,
            &self.config.crossplane_namespace,
            crossplane.chart_version.as_deref(),
        )
        .context("Crossplane installation failed")?;
        Ok(())
    }

    fn wait_crossplane(&self) -> Result<()> {
        if self.options.skip_wait {
            ui::print_info("Skipped (--skip-wait)");
            return Ok(());
        }
        self.wait("Crossplane", || {
            self.kubectl().wait_for(
                CROSSPLANE_DEPLOYMENT,
                Some(&self.config.crossplane_namespace),
                "Available",
                Duration::from_secs(self.config.timeouts.crossplane_secs),
            )
        })
    }

    fn wait_providers(&self) -> Result<()> {
        if self.options.skip_wait {
            ui::print_info("Skipped (--skip-wait)");
            return Ok(());
        }
        let timeout = Duration::from_secs(self.config.timeouts.provider_secs);
        for provider in self.plan.resources(Category::Provider) {
            self.wait(&provider.name, || {
                self.kubectl()
                    .wait_for(&provider.kubectl_target(), None, "Healthy", timeout)
            })?;
        }
        Ok(())
    }

    fn apply_category(&self, category: Category) -> Result<()> {
        for resource in self.plan.resources(category) {
            ui::print_progress(&format!("Applying {resource}"));
        }
        self.kubectl()
            .apply(&self.plan.yaml_for(category))
            .with_context(|| format!("Failed to apply {}", category.description()))?;
        info!(category = %category, "Applied");
        Ok(())
    }

    fn wait_category(&self, category: Category) -> Result<()> {
        if self.options.skip_wait {
            return Ok(());
        }
        for resource in self.plan.resources(category) {
            self.wait_resource(category, resource)?;
        }
        Ok(())
    }

    fn wait_resource(&self, category: Category, resource: &ResourceRef) -> Result<()> {
        let timeouts = &self.config.timeouts;
        let target = resource.kubectl_target();
        let namespace = resource.namespace.as_deref();

        if resource.is_managed() {
            let secs = if category == Category::Database {
                timeouts.database_secs
            } else {
                timeouts.resource_secs
            };
            self.wait(&resource.to_string(), || {
                self.kubectl()
                    .wait_for(&target, namespace, "Ready", Duration::from_secs(secs))
            })
        } else if resource.is_deployment() {
            self.wait(&resource.to_string(), || {
                self.kubectl().rollout_status(
                    &target,
                    namespace,
                    Duration::from_secs(timeouts.workload_secs),
                )
            })
        } else {
            Ok(())
        }
    }

    /// Block on one readiness wait behind a spinner.
    #[allow(clippy::unused_self)]
    fn wait(&self, what: &str, wait: impl FnOnce() -> Result<(), ToolError>) -> Result<()> {
        let spinner = ui::spinner(&format!("Waiting for {what}..."));
        let result = wait();
        spinner.finish_and_clear();

        match result {
            Ok(()) => {
                ui::print_check_result(what, true, Some("ready"));
                Ok(())
            }
            Err(e) if e.is_timeout() => {
                ui::print_check_result(what, false, Some("timed out"));
                Err(e).with_context(|| format!("{what} did not become ready"))
            }
            Err(e) => {
                ui::print_check_result(what, false, None);
                Err(e).with_context(|| format!("Failed waiting for {what}"))
            }
        }
    }

    fn print_success_summary(&self) {
        ui::print_section("Installation Complete!");
        ui::print_success("The Crossplane AWS demo environment is in place.");

        ui::print_kv("Profile", &self.config.aws_profile);
        ui::print_kv("Region", &self.config.region);
        ui::print_kv("Database", &self.config.db_instance_name());
        ui::print_kv("Bucket", &self.config.bucket_name());
        ui::print_kv(
            "Workload",
            &format!("{}/{}", self.config.workload_namespace, self.config.workload_name()),
        );

        if self.options.skip_wait {
            ui::print_warning("Readiness was not awaited; run `xpdemo validate` to follow progress.");
        }

        ui::print_section("Next Steps");
        ui::print_info("1. Check every component:");
        ui::print_info("   xpdemo validate");
        ui::print_info("");
        ui::print_info("2. Watch the managed resources:");
        ui::print_info("   kubectl get managed");
        ui::print_info("");
        ui::print_info("3. Tear everything down (the VPC and subnets are kept):");
        ui::print_info("   xpdemo cleanup");
    }
}
