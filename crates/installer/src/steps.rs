//! Install step sequence.

use crate::manifests::Category;

/// Install steps, executed strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstallStep {
    /// Checking kubectl, helm and the AWS CLI.
    CheckingPrerequisites,
    /// Checking the Kubernetes API is reachable.
    CheckingCluster,
    /// Installing the Crossplane Helm chart.
    InstallingCrossplane,
    /// Waiting for the Crossplane deployment.
    WaitingCrossplane,
    /// Registering the AWS provider packages.
    InstallingProvider,
    /// Waiting for the providers to report Healthy.
    WaitingProvider,
    /// Creating the credentials secret and `ProviderConfig`.
    ConfiguringCredentials,
    ApplyingNetworking,
    ApplyingSecurity,
    /// DB subnet group and master password secret.
    PreparingDatabase,
    ApplyingStorage,
    ApplyingDatabase,
    DeployingWorkload,

    /// Installation complete.
    Complete,
}

impl InstallStep {
    /// Get the next step in the sequence.
    #[must_use]
    pub fn next(&self) -> Self {
        match self {
            Self::CheckingPrerequisites => Self::CheckingCluster,
            Self::CheckingCluster => Self::InstallingCrossplane,
            Self::InstallingCrossplane => Self::WaitingCrossplane,
            Self::WaitingCrossplane => Self::InstallingProvider,
            Self::InstallingProvider => Self::WaitingProvider,
            Self::WaitingProvider => Self::ConfiguringCredentials,
            Self::ConfiguringCredentials => Self::ApplyingNetworking,
            Self::ApplyingNetworking => Self::ApplyingSecurity,
            Self::ApplyingSecurity => Self::PreparingDatabase,
            Self::PreparingDatabase => Self::ApplyingStorage,
            Self::ApplyingStorage => Self::ApplyingDatabase,
            Self::ApplyingDatabase => Self::DeployingWorkload,
            Self::DeployingWorkload | Self::Complete => Self::Complete,
        }
    }

    /// Get a human-readable description of the step.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::CheckingPrerequisites => "Checking prerequisites",
            Self::CheckingCluster => "Checking cluster connectivity",
            Self::InstallingCrossplane => "Installing Crossplane",
            Self::WaitingCrossplane => "Waiting for Crossplane to be available",
            Self::InstallingProvider => "Installing AWS provider",
            Self::WaitingProvider => "Waiting for AWS provider to be healthy",
            Self::ConfiguringCredentials => "Configuring provider credentials",
            Self::ApplyingNetworking => "Applying network (VPC and subnets)",
            Self::ApplyingSecurity => "Applying security groups",
            Self::PreparingDatabase => "Preparing database subnet group and password",
            Self::ApplyingStorage => "Applying S3 bucket",
            Self::ApplyingDatabase => "Applying RDS instance",
            Self::DeployingWorkload => "Deploying sample web workload",
            Self::Complete => "Complete",
        }
    }

    /// Get the step number for progress display.
    #[must_use]
    pub fn step_number(&self) -> u8 {
        match self {
            Self::CheckingPrerequisites => 1,
            Self::CheckingCluster => 2,
            Self::InstallingCrossplane => 3,
            Self::WaitingCrossplane => 4,
            Self::InstallingProvider => 5,
            Self::WaitingProvider => 6,
            Self::ConfiguringCredentials => 7,
            Self::ApplyingNetworking => 8,
            Self::ApplyingSecurity => 9,
            Self::PreparingDatabase => 10,
            Self::ApplyingStorage => 11,
            Self::ApplyingDatabase => 12,
            Self::DeployingWorkload => 13,
            Self::Complete => 14,
        }
    }

    /// Total number of steps.
    pub const TOTAL_STEPS: u8 = 14;

    /// Resource category applied by this step, if it applies one wholesale.
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        match self {
            Self::ApplyingNetworking => Some(Category::Networking),
            Self::ApplyingSecurity => Some(Category::Security),
            Self::PreparingDatabase => Some(Category::DatabasePrep),
            Self::ApplyingStorage => Some(Category::Storage),
            Self::ApplyingDatabase => Some(Category::Database),
            Self::DeployingWorkload => Some(Category::Workload),
            _ => None,
        }
    }

    /// Steps that only concern the Crossplane chart itself.
    #[must_use]
    pub fn is_crossplane_install(&self) -> bool {
        matches!(self, Self::InstallingCrossplane | Self::WaitingCrossplane)
    }
}

impl std::fmt::Display for InstallStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
