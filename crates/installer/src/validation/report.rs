//! Validation report formatting.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The result of a validation check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// Not ready yet, or missing where that is tolerable.
    Warn,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "✅ PASS"),
            Self::Fail => write!(f, "❌ FAIL"),
            Self::Warn => write!(f, "⚠️  WARN"),
        }
    }
}

/// Which part of the environment a check covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckGroup {
    /// Controller, provider and credentials. Problems are failures.
    Core,
    /// Managed resources. Problems are warnings.
    Infrastructure,
    /// Sample workload. Problems are warnings.
    Application,
}

impl CheckGroup {
    /// Status to report when a check in this group does not pass.
    #[must_use]
    pub fn problem_status(self) -> CheckStatus {
        match self {
            Self::Core => CheckStatus::Fail,
            Self::Infrastructure | Self::Application => CheckStatus::Warn,
        }
    }
}

/// A single validation check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub group: CheckGroup,
    pub status: CheckStatus,
    pub details: String,
}

impl CheckResult {
    /// Pass when `passed`, otherwise the group's problem status.
    #[must_use]
    pub fn new(
        group: CheckGroup,
        name: impl Into<String>,
        passed: bool,
        details: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group,
            status: if passed {
                CheckStatus::Pass
            } else {
                group.problem_status()
            },
            details: details.into(),
        }
    }
}

/// The complete validation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub cluster: String,
    pub timestamp: String,
    pub checks: Vec<CheckResult>,
}

impl ValidationReport {
    #[must_use]
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            checks: Vec::new(),
        }
    }

    pub fn push(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    /// Check if all validation checks passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.status == CheckStatus::Pass)
    }

    /// Get the total number of checks.
    #[must_use]
    pub fn total_checks(&self) -> usize {
        self.checks.len()
    }

    /// Get the number of passed checks.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(CheckStatus::Pass)
    }

    /// Get the number of failed checks. Only core checks fail.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(CheckStatus::Fail)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count(CheckStatus::Warn)
    }

    fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    /// Print a summary of the validation report.
    pub fn print_summary(&self) {
        println!();
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║              DEMO ENVIRONMENT VALIDATION REPORT              ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ Cluster: {:<52} ║", truncate(&self.cluster, 52));
        println!("║ Time:    {:<52} ║", self.timestamp);

        for group in [
            CheckGroup::Core,
            CheckGroup::Infrastructure,
            CheckGroup::Application,
        ] {
            let checks: Vec<_> = self.checks.iter().filter(|c| c.group == group).collect();
            if checks.is_empty() {
                continue;
            }
            println!("╠══════════════════════════════════════════════════════════════╣");
            println!("║ {:<60} ║", format!("{group:?}").to_uppercase());
            for check in checks {
                let status_icon = match check.status {
                    CheckStatus::Pass => "✅",
                    CheckStatus::Fail => "❌",
                    CheckStatus::Warn => "⚠️ ",
                };
                println!(
                    "║ {} {:<24} {:<32} ║",
                    status_icon,
                    truncate(&check.name, 24),
                    truncate(&check.details, 32)
                );
            }
        }

        println!("╠══════════════════════════════════════════════════════════════╣");
        println!(
            "║ SUMMARY: {:<52} ║",
            format!(
                "{}/{} passed, {} failed, {} warnings",
                self.passed_count(),
                self.total_checks(),
                self.failed_count(),
                self.warning_count()
            )
        );

        if self.failed_count() == 0 {
            println!("║ ✅ CORE COMPONENTS HEALTHY                                    ║");
        } else {
            println!("║ ❌ VALIDATION FOUND FAILED CHECKS                             ║");
        }

        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
    }
}

/// Truncate a string to a maximum number of characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
