//! Environment checks.
//!
//! Every check reads cluster state through `kubectl` (or the AWS CLI for the
//! credentials check) and records a [`CheckResult`]. A check that cannot read
//! its object does not pass; nothing here aborts the run.

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use super::report::{CheckGroup, CheckResult, ValidationReport};
use crate::config::DemoConfig;
use crate::manifests::{Category, ResourcePlan};
use crate::runner::CommandRunner;
use crate::tools::{AwsCli, Kubectl};

/// Target of the `ProviderConfig` every managed resource uses.
pub const PROVIDER_CONFIG: &str = "providerconfig.aws.upbound.io/default";

/// One row of `kubectl get pods --no-headers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodLine {
    pub name: String,
    pub ready: u32,
    pub total: u32,
    pub status: String,
}

impl PodLine {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == "Running"
    }
}

/// Parse `kubectl get pods --no-headers` output.
///
/// # Errors
///
/// Returns an error only if the row pattern cannot be compiled.
pub fn parse_pods(output: &str) -> Result<Vec<PodLine>> {
    let row = Regex::new(r"^(\S+)\s+(\d+)/(\d+)\s+(\S+)").context("Invalid pod row pattern")?;
    Ok(output
        .lines()
        .filter_map(|line| row.captures(line.trim()))
        .filter_map(|caps| {
            Some(PodLine {
                name: caps[1].to_string(),
                ready: caps[2].parse().ok()?,
                total: caps[3].parse().ok()?,
                status: caps[4].to_string(),
            })
        })
        .collect())
}

/// Summary of a pod listing: whether every pod runs, plus a short description.
fn pods_running(pods: &[PodLine]) -> (bool, String) {
    let running = pods.iter().filter(|p| p.is_running()).count();
    let details = format!("{running}/{} Running", pods.len());
    (!pods.is_empty() && running == pods.len(), details)
}

/// Runs every check against the current cluster.
pub struct Validator<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a DemoConfig,
    plan: &'a ResourcePlan,
}

impl<'a> Validator<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a DemoConfig, plan: &'a ResourcePlan) -> Self {
        Self {
            runner,
            config,
            plan,
        }
    }

    fn kubectl(&self) -> Kubectl<'a> {
        Kubectl::new(self.runner)
    }

    /// Run all checks: core, then infrastructure, then application.
    #[must_use]
    pub fn run(&self, cluster: &str) -> ValidationReport {
        let mut report = ValidationReport::new(cluster);
        self.core_checks(&mut report);
        self.infrastructure_checks(&mut report);
        self.application_checks(&mut report);
        debug!(
            passed = report.passed_count(),
            failed = report.failed_count(),
            warnings = report.warning_count(),
            "Validation finished"
        );
        report
    }

    fn pod_check(&self, group: CheckGroup, name: &str, namespace: &str, selector: &str) -> CheckResult {
        let listing = self
            .kubectl()
            .pods(namespace, Some(selector))
            .map_err(anyhow::Error::from)
            .and_then(|out| parse_pods(&out));
        match listing {
            Ok(pods) => {
                let (passed, details) = pods_running(&pods);
                CheckResult::new(group, name, passed, details)
            }
            Err(e) => CheckResult::new(group, name, false, e.to_string()),
        }
    }

    fn exists_check(
        &self,
        group: CheckGroup,
        name: &str,
        target: &str,
        namespace: Option<&str>,
    ) -> (bool, CheckResult) {
        match self.kubectl().exists(target, namespace) {
            Ok(true) => (true, CheckResult::new(group, name, true, target)),
            Ok(false) => (false, CheckResult::new(group, name, false, "not found")),
            Err(e) => (false, CheckResult::new(group, name, false, e.to_string())),
        }
    }

    fn condition_check(
        &self,
        group: CheckGroup,
        name: &str,
        target: &str,
        namespace: Option<&str>,
        condition: &str,
    ) -> CheckResult {
        match self.kubectl().condition_status(target, namespace, condition) {
            Ok(Some(status)) => CheckResult::new(
                group,
                name,
                status == "True",
                format!("{condition}={status}"),
            ),
            Ok(None) => CheckResult::new(group, name, false, format!("no {condition} condition yet")),
            Err(e) if e.is_not_found() => CheckResult::new(group, name, false, "not found"),
            Err(e) => CheckResult::new(group, name, false, e.to_string()),
        }
    }

    fn core_checks(&self, report: &mut ValidationReport) {
        let ns = self.config.crossplane_namespace.as_str();

        report.push(self.pod_check(CheckGroup::Core, "Crossplane pods", ns, "app=crossplane"));

        for provider in self.plan.resources(Category::Provider) {
            report.push(self.condition_check(
                CheckGroup::Core,
                &provider.name,
                &provider.kubectl_target(),
                None,
                "Healthy",
            ));
        }

        let secret = format!("secret/{}", self.config.credentials_secret_name());
        let (_, check) = self.exists_check(CheckGroup::Core, "Credentials secret", &secret, Some(ns));
        report.push(check);

        let (provider_config, check) =
            self.exists_check(CheckGroup::Core, "ProviderConfig", PROVIDER_CONFIG, None);
        report.push(check);

        report.push(self.credentials_check(provider_config));
    }

    fn credentials_check(&self, provider_config: bool) -> CheckResult {
        const NAME: &str = "AWS credentials";
        if !provider_config {
            return CheckResult::new(CheckGroup::Core, NAME, false, "ProviderConfig missing");
        }
        match AwsCli::new(self.runner, self.config.aws_profile.as_str()).caller_identity() {
            Ok(identity) => CheckResult::new(
                CheckGroup::Core,
                NAME,
                true,
                format!("account {}", identity.account),
            ),
            Err(e) => CheckResult::new(CheckGroup::Core, NAME, false, e.to_string()),
        }
    }

    fn infrastructure_checks(&self, report: &mut ValidationReport) {
        for (_, resource) in self.plan.all_resources() {
            if !resource.is_managed() {
                continue;
            }
            report.push(self.condition_check(
                CheckGroup::Infrastructure,
                &format!("{} {}", resource.kind, resource.name),
                &resource.kubectl_target(),
                resource.namespace.as_deref(),
                "Ready",
            ));
        }
    }

    fn application_checks(&self, report: &mut ValidationReport) {
        let ns = self.config.workload_namespace.as_str();
        let name = self.config.workload_name();

        report.push(self.pod_check(
            CheckGroup::Application,
            "Workload pods",
            ns,
            &format!("app={name}"),
        ));

        let (_, check) = self.exists_check(
            CheckGroup::Application,
            "Workload service",
            &format!("service/{name}"),
            Some(ns),
        );
        report.push(check);
    }
}
