use anyhow::Result;
use colored::Colorize;
use tracing::debug;

use crate::runner::{CommandRunner, ToolError};
use crate::tools::{AwsCli, Helm, Kubectl};
use crate::ui;

/// Validates the command-line tools the demo drives.
pub struct PrerequisitesValidator<'a> {
    runner: &'a dyn CommandRunner,
    requirements: Vec<Requirement>,
}

struct Requirement {
    name: &'static str,
    check: fn(&dyn CommandRunner) -> Result<String, ToolError>,
    install_instructions: &'static str,
}

impl<'a> PrerequisitesValidator<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        let requirements = vec![
            Requirement {
                name: "kubectl",
                check: |runner| Kubectl::new(runner).client_version(),
                install_instructions:
                    "Install kubectl from https://kubernetes.io/docs/tasks/tools/",
            },
            Requirement {
                name: "Helm",
                check: |runner| Helm::new(runner).version(),
                install_instructions: "Install Helm from https://helm.sh/docs/intro/install/",
            },
            Requirement {
                name: "AWS CLI",
                // Version output does not depend on the profile
                check: |runner| AwsCli::new(runner, "default").version(),
                install_instructions:
                    "Install the AWS CLI from https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html",
            },
        ];

        Self {
            runner,
            requirements,
        }
    }

    /// Run every check and print the results.
    ///
    /// # Errors
    ///
    /// Returns an error if any tool is missing or broken.
    pub fn validate(&self) -> Result<()> {
        println!();
        let mut failures = Vec::new();

        for requirement in &self.requirements {
            match (requirement.check)(self.runner) {
                Ok(version) => {
                    let version = version.lines().next().unwrap_or_default().trim().to_string();
                    debug!(tool = requirement.name, %version, "Prerequisite found");
                    ui::print_check_result(requirement.name, true, Some(&version));
                }
                Err(e) => {
                    debug!(tool = requirement.name, error = %e, "Prerequisite check failed");
                    ui::print_check_result(requirement.name, false, None);
                    failures.push(requirement);
                }
            }
        }

        println!();

        if failures.is_empty() {
            ui::print_success("All prerequisites met!");
            return Ok(());
        }

        ui::print_error("Missing required tools:");
        println!();
        for failure in &failures {
            println!(
                "  {} {} - {}",
                "✗".red(),
                failure.name.red(),
                failure.install_instructions.bright_black()
            );
        }
        println!();

        anyhow::bail!("Prerequisites not met. Install the missing tools and try again.");
    }
}
