//! Environment teardown.
//!
//! Deletes everything install created, in reverse install order. The VPC
//! and subnets are deregistered instead: their deletion policy is switched
//! to `Orphan` before the managed resource is removed, so the AWS objects
//! stay in the account.

use std::io::IsTerminal;
use std::time::Duration;

use dialoguer::{theme::ColorfulTheme, Confirm};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DemoConfig;
use crate::manifests::{Category, Disposition, ResourcePlan, ResourceRef};
use crate::runner::{CommandRunner, ToolError};
use crate::tools::{Helm, Kubectl};
use crate::ui;

const ORPHAN_PATCH: &str = r#"{"spec":{"deletionPolicy":"Orphan"}}"#;

/// Asks the operator before anything is deleted.
pub trait Confirmation {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Interactive yes/no prompt. Defaults to "no"; without a terminal the answer is "no".
pub struct PromptConfirmation;

impl Confirmation for PromptConfirmation {
    fn confirm(&self, prompt: &str) -> bool {
        if !std::io::stdin().is_terminal() {
            warn!("No terminal to confirm on; pass --yes to clean up non-interactively");
            return false;
        }
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Confirmation given up front (`--yes`).
pub struct AssumeYes;

impl Confirmation for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    /// Also remove the Crossplane Helm release.
    pub uninstall_crossplane: bool,
}

/// What cleanup did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    /// Managed resources released with their cloud objects kept.
    pub deregistered: Vec<String>,
    /// Objects that were not there to begin with.
    pub absent: Vec<String>,
    /// Deletes that did not finish in time.
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Removal {
    Deleted,
    Deregistered,
}

impl CleanupReport {
    fn record(&mut self, target: &str, removal: Removal, result: Result<bool, ToolError>) {
        match result {
            Ok(true) => match removal {
                Removal::Deleted => {
                    ui::print_progress(&format!("Deleted {target}"));
                    self.deleted.push(target.to_string());
                }
                Removal::Deregistered => {
                    ui::print_progress(&format!("Deregistered {target}"));
                    self.deregistered.push(target.to_string());
                }
            },
            Ok(false) => self.record_absent(target),
            Err(e) if e.is_not_found() => self.record_absent(target),
            Err(e) if e.is_timeout() => {
                ui::print_warning(&format!("{target}: deletion still in progress"));
                warn!(resource = %target, "Delete timed out");
                self.warnings
                    .push(format!("{target}: timed out waiting for deletion"));
            }
            Err(e) => {
                ui::print_error(&format!("{target}: {e}"));
                self.errors.push(format!("{target}: {e}"));
            }
        }
    }

    fn record_absent(&mut self, target: &str) {
        debug!(resource = %target, "Already gone");
        self.absent.push(target.to_string());
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_summary(&self) {
        ui::print_section("Cleanup Summary");
        ui::print_kv("Deleted", &self.deleted.len().to_string());
        ui::print_kv("Deregistered", &self.deregistered.len().to_string());
        ui::print_kv("Already absent", &self.absent.len().to_string());
        for item in &self.deregistered {
            ui::print_progress(&format!("{item} (kept in AWS)"));
        }
        for warning in &self.warnings {
            ui::print_warning(warning);
        }
        for error in &self.errors {
            ui::print_error(error);
        }
        println!();
        if self.has_errors() {
            ui::print_error(&format!("Cleanup finished with {} errors", self.errors.len()));
        } else if self.warnings.is_empty() {
            ui::print_success("Cleanup complete!");
        } else {
            ui::print_warning("Cleanup finished; some deletions are still in progress.");
        }
    }
}

/// Result of a cleanup run.
#[derive(Debug)]
pub enum CleanupOutcome {
    /// The operator said no; nothing was touched.
    Declined,
    Completed(CleanupReport),
}

/// Deletes the demo environment.
pub struct Cleaner<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a DemoConfig,
    plan: &'a ResourcePlan,
    options: CleanupOptions,
}

impl<'a> Cleaner<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        config: &'a DemoConfig,
        plan: &'a ResourcePlan,
        options: CleanupOptions,
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

    fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeouts.delete_secs)
    }

    /// Ask for confirmation, then delete. Never stops at a failed delete.
    pub fn run(&self, confirmation: &dyn Confirmation) -> CleanupOutcome {
        let prompt = format!(
            "Delete the demo environment in region {} (the VPC and subnets are kept)?",
            self.config.region
        );
        if !confirmation.confirm(&prompt) {
            info!("Cleanup declined");
            return CleanupOutcome::Declined;
        }

        let mut report = CleanupReport::default();
        for category in Category::cleanup_order() {
            ui::print_step(category.description());
            // Dependents are listed after what they reference
            for resource in self.plan.resources(category).into_iter().rev() {
                match category.disposition() {
                    Disposition::Destroy => self.destroy(resource, &mut report),
                    Disposition::Deregister => self.deregister(resource, &mut report),
                }
            }
            if category == Category::Credentials {
                self.delete_credentials_secret(&mut report);
            }
        }

        if self.options.uninstall_crossplane {
            self.uninstall_crossplane(&mut report);
        }

        CleanupOutcome::Completed(report)
    }

    fn destroy(&self, resource: &ResourceRef, report: &mut CleanupReport) {
        let target = resource.kubectl_target();
        let result = self.kubectl().delete(
            &target,
            resource.namespace.as_deref(),
            self.delete_timeout(),
        );
        report.record(&target, Removal::Deleted, result);
    }

    fn deregister(&self, resource: &ResourceRef, report: &mut CleanupReport) {
        let target = resource.kubectl_target();
        let namespace = resource.namespace.as_deref();

        match self.kubectl().patch_merge(&target, namespace, ORPHAN_PATCH) {
            Ok(()) => debug!(resource = %target, "Deletion policy set to Orphan"),
            Err(e) if e.is_not_found() => {
                report.record_absent(&target);
                return;
            }
            Err(e) => {
                // Deleting without the orphan policy would destroy the AWS object
                ui::print_error(&format!("{target}: {e}"));
                report
                    .errors
                    .push(format!("{target}: not deregistered, orphan patch failed: {e}"));
                return;
            }
        }

        let result = self.kubectl().delete(&target, namespace, self.delete_timeout());
        report.record(&target, Removal::Deregistered, result);
    }

    fn delete_credentials_secret(&self, report: &mut CleanupReport) {
        let target = format!("secret/{}", self.config.credentials_secret_name());
        let result = self.kubectl().delete(
            &target,
            Some(&self.config.crossplane_namespace),
            self.delete_timeout(),
        );
        report.record(&target, Removal::Deleted, result);
    }

    fn uninstall_crossplane(&self, report: &mut CleanupReport) {
        ui::print_step("Crossplane");
        let release = &self.config.crossplane.release;
        match Helm::new(self.runner).uninstall(release, &self.config.crossplane_namespace) {
            Ok(true) => {
                ui::print_progress(&format!("Uninstalled Helm release {release}"));
                report.deleted.push(format!("helm/{release}"));
            }
            Ok(false) => report.record_absent(&format!("helm/{release}")),
            Err(e) => {
                ui::print_error(&format!("helm/{release}: {e}"));
                report.errors.push(format!("helm/{release}: {e}"));
            }
        }
    }
}
