//! Demo environment configuration.
//!
//! Everything the install, validate and cleanup flows need is described by
//! [`DemoConfig`]. Defaults are built in; an optional YAML file and the
//! `--profile` / `--region` overrides are layered on top.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ipnet::Ipv4Net;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Crossplane Helm chart location and release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossplaneConfig {
    /// Local name for the Helm repository.
    pub repo_name: String,
    /// Helm repository URL.
    pub repo_url: String,
    /// Chart reference, e.g. `crossplane-stable/crossplane`.
    pub chart: String,
    /// Helm release name.
    pub release: String,
    /// Chart version pin; latest when unset.
    pub chart_version: Option<String>,
}

impl Default for CrossplaneConfig {
    fn default() -> Self {
        Self {
            repo_name: "crossplane-stable".into(),
            repo_url: "https://charts.crossplane.io/stable".into(),
            chart: "crossplane-stable/crossplane".into(),
            release: "crossplane".into(),
            chart_version: None,
        }
    }
}

/// One provider package registered with Crossplane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPackage {
    /// `Provider` object name.
    pub name: String,
    /// OCI package reference.
    pub package: String,
}

impl ProviderPackage {
    fn upbound(service: &str, version: &str) -> Self {
        Self {
            name: format!("provider-aws-{service}"),
            package: format!("xpkg.upbound.io/upbound/provider-aws-{service}:{version}"),
        }
    }
}

/// A pre-existing subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetConfig {
    /// AWS subnet ID (`subnet-...`) to import; a new subnet is described when unset.
    pub id: Option<String>,
    /// IPv4 CIDR block.
    pub cidr: String,
    /// Availability zone, either a full name (`us-east-1a`) or a suffix (`a`).
    pub availability_zone: String,
}

impl SubnetConfig {
    /// Full availability zone name within `region`.
    #[must_use]
    pub fn zone(&self, region: &str) -> String {
        if self.availability_zone.len() == 1 {
            format!("{region}{}", self.availability_zone)
        } else {
            self.availability_zone.clone()
        }
    }
}

/// The demo VPC and its subnets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// AWS VPC ID (`vpc-...`) to import.
    pub vpc_id: Option<String>,
    /// IPv4 CIDR block of the VPC.
    pub cidr: String,
    pub subnets: Vec<SubnetConfig>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vpc_id: None,
            cidr: "10.0.0.0/16".into(),
            subnets: vec![
                SubnetConfig {
                    id: None,
                    cidr: "10.0.1.0/24".into(),
                    availability_zone: "a".into(),
                },
                SubnetConfig {
                    id: None,
                    cidr: "10.0.2.0/24".into(),
                    availability_zone: "b".into(),
                },
            ],
        }
    }
}

/// Managed database sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub engine: String,
    pub engine_version: String,
    pub instance_class: String,
    /// Allocated storage in GiB.
    pub storage_gb: u32,
    /// Master user name.
    pub username: String,
    pub port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: "postgres".into(),
            engine_version: "16.3".into(),
            instance_class: "db.t3.micro".into(),
            storage_gb: 20,
            username: "demoadmin".into(),
            port: 5432,
        }
    }
}

/// Sample web workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub image: String,
    pub replicas: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            image: "nginx:1.27-alpine".into(),
            replicas: 2,
        }
    }
}

/// Readiness wait limits, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub crossplane_secs: u64,
    pub provider_secs: u64,
    pub resource_secs: u64,
    /// RDS instances routinely take 10+ minutes.
    pub database_secs: u64,
    pub workload_secs: u64,
    pub delete_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            crossplane_secs: 300,
            provider_secs: 600,
            resource_secs: 300,
            database_secs: 1500,
            workload_secs: 180,
            delete_secs: 300,
        }
    }
}

/// Full demo configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// AWS CLI profile holding the target account's credentials.
    pub aws_profile: String,
    /// AWS region for every managed resource.
    pub region: String,
    /// Prefix for all resource names.
    pub name_prefix: String,
    /// Namespace Crossplane is installed into.
    pub crossplane_namespace: String,
    /// Namespace for the sample workload.
    pub workload_namespace: String,
    pub crossplane: CrossplaneConfig,
    pub providers: Vec<ProviderPackage>,
    pub network: NetworkConfig,
    pub database: DatabaseConfig,
    /// S3 bucket name; derived from the prefix and region when unset.
    pub bucket_name: Option<String>,
    pub workload: WorkloadConfig,
    pub timeouts: Timeouts,
    /// Delay between polls when waiting on things `kubectl wait` cannot watch.
    pub poll_interval_secs: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            aws_profile: "default".into(),
            region: "us-east-1".into(),
            name_prefix: "xpdemo".into(),
            crossplane_namespace: "crossplane-system".into(),
            workload_namespace: "default".into(),
            crossplane: CrossplaneConfig::default(),
            providers: ["ec2", "rds", "s3"]
                .iter()
                .map(|svc| ProviderPackage::upbound(svc, "v1.14.0"))
                .collect(),
            network: NetworkConfig::default(),
            database: DatabaseConfig::default(),
            bucket_name: None,
            workload: WorkloadConfig::default(),
            timeouts: Timeouts::default(),
            poll_interval_secs: 5,
        }
    }
}

/// Values taken from the command line or environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub aws_profile: Option<String>,
    pub region: Option<String>,
}

impl DemoConfig {
    /// Default config file location (`~/.config/xpdemo/config.yaml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("xpdemo").join("config.yaml"))
    }

    /// Read a config file. Missing fields fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Build the effective configuration.
    ///
    /// An explicit `file` must exist. Without one, the default location is used
    /// when present. Overrides are applied last and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or validation fails.
    pub fn resolve(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::load(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => {
                    info!(path = %path.display(), "Using config file");
                    Self::load(&path)?
                }
                None => Self::default(),
            },
        };

        if let Some(profile) = &overrides.aws_profile {
            config.aws_profile.clone_from(profile);
        }
        if let Some(region) = &overrides.region {
            config.region.clone_from(region);
        }

        config.validate()?;
        debug!(profile = %config.aws_profile, region = %config.region, "Resolved configuration");
        Ok(config)
    }

    /// Check the configuration for values AWS or Kubernetes would reject.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.aws_profile.trim().is_empty() {
            anyhow::bail!("AWS profile must not be empty");
        }
        if self.region.trim().is_empty() {
            anyhow::bail!("AWS region must not be empty");
        }
        if !is_dns_label(&self.name_prefix) {
            anyhow::bail!(
                "Name prefix '{}' must be lowercase alphanumerics and '-'",
                self.name_prefix
            );
        }
        if self.providers.is_empty() {
            anyhow::bail!("At least one provider package is required");
        }

        let vpc = parse_cidr(&self.network.cidr)
            .with_context(|| format!("Invalid VPC CIDR '{}'", self.network.cidr))?;

        // RDS subnet groups must span at least two availability zones.
        if self.network.subnets.len() < 2 {
            anyhow::bail!("At least two subnets are required for the database subnet group");
        }

        let mut zones = Vec::new();
        for subnet in &self.network.subnets {
            let block = parse_cidr(&subnet.cidr)
                .with_context(|| format!("Invalid subnet CIDR '{}'", subnet.cidr))?;
            if !vpc.contains(&block) {
                anyhow::bail!(
                    "Subnet {} is outside the VPC range {}",
                    subnet.cidr,
                    self.network.cidr
                );
            }
            let zone = subnet.zone(&self.region);
            if !zone.starts_with(&self.region) {
                anyhow::bail!("Availability zone {zone} is not in region {}", self.region);
            }
            if zones.contains(&zone) {
                anyhow::bail!("Subnets must be in distinct availability zones ({zone} repeated)");
            }
            zones.push(zone);
        }

        let bucket = self.bucket_name();
        if !is_valid_bucket_name(&bucket) {
            anyhow::bail!("Invalid S3 bucket name '{bucket}'");
        }

        if self.database.storage_gb < 20 {
            anyhow::bail!("Database storage must be at least 20 GiB");
        }

        let t = &self.timeouts;
        if [
            t.crossplane_secs,
            t.provider_secs,
            t.resource_secs,
            t.database_secs,
            t.workload_secs,
            t.delete_secs,
        ]
        .contains(&0)
        {
            anyhow::bail!("Timeouts must be greater than zero");
        }

        Ok(())
    }

    #[must_use]
    pub fn bucket_name(&self) -> String {
        self.bucket_name
            .clone()
            .unwrap_or_else(|| format!("{}-bucket-{}", self.name_prefix, self.region))
    }

    #[must_use]
    pub fn vpc_name(&self) -> String {
        format!("{}-vpc", self.name_prefix)
    }

    /// Managed resource name of the subnet at `index`.
    #[must_use]
    pub fn subnet_name(&self, index: usize) -> String {
        let zone = self
            .network
            .subnets
            .get(index)
            .map_or_else(|| index.to_string(), |s| s.zone(&self.region));
        format!("{}-subnet-{zone}", self.name_prefix)
    }

    #[must_use]
    pub fn web_security_group_name(&self) -> String {
        format!("{}-web-sg", self.name_prefix)
    }

    #[must_use]
    pub fn db_security_group_name(&self) -> String {
        format!("{}-db-sg", self.name_prefix)
    }

    #[must_use]
    pub fn db_subnet_group_name(&self) -> String {
        format!("{}-db-subnets", self.name_prefix)
    }

    #[must_use]
    pub fn db_instance_name(&self) -> String {
        format!("{}-db", self.name_prefix)
    }

    #[must_use]
    pub fn db_password_secret_name(&self) -> String {
        format!("{}-db-password", self.name_prefix)
    }

    /// Secret holding the provider's AWS credentials.
    #[must_use]
    pub fn credentials_secret_name(&self) -> String {
        format!("{}-aws-credentials", self.name_prefix)
    }

    #[must_use]
    pub fn workload_name(&self) -> String {
        format!("{}-web", self.name_prefix)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Parse `a.b.c.d/n`. Host bits must be zero.
///
/// # Errors
///
/// Returns an error for malformed blocks or set host bits.
pub fn parse_cidr(s: &str) -> Result<Ipv4Net> {
    let net: Ipv4Net = s.parse().context("CIDR must be an IPv4 block in a.b.c.d/n form")?;
    if net.trunc() != net {
        anyhow::bail!("Host bits set in {s}");
    }
    Ok(net)
}

fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 40
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

fn is_valid_bucket_name(name: &str) -> bool {
    let Ok(re) = Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$") else {
        return false;
    };
    re.is_match(name) && !name.contains("..") && name.parse::<Ipv4Addr>().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DemoConfig::default();
        assert_eq!(config.aws_profile, "default");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.providers.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_names() {
        let config = DemoConfig::default();
        assert_eq!(config.vpc_name(), "xpdemo-vpc");
        assert_eq!(config.subnet_name(0), "xpdemo-subnet-us-east-1a");
        assert_eq!(config.subnet_name(1), "xpdemo-subnet-us-east-1b");
        assert_eq!(config.bucket_name(), "xpdemo-bucket-us-east-1");
        assert_eq!(config.db_instance_name(), "xpdemo-db");
    }

    #[test]
    fn test_overrides_applied() {
        let overrides = Overrides {
            aws_profile: Some("sandbox".into()),
            region: Some("eu-west-1".into()),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "name_prefix: demo\n").unwrap();

        let config = DemoConfig::resolve(Some(&path), &overrides).unwrap();
        assert_eq!(config.aws_profile, "sandbox");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.name_prefix, "demo");
        // Untouched sections keep their defaults
        assert_eq!(config.database, DatabaseConfig::default());
        assert_eq!(config.subnet_name(0), "demo-subnet-eu-west-1a");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = DemoConfig::resolve(
            Some(Path::new("/nonexistent/xpdemo.yaml")),
            &Overrides::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_cidr_parsing() {
        let vpc = parse_cidr("10.0.0.0/16").unwrap();
        assert!(vpc.contains(&parse_cidr("10.0.1.0/24").unwrap()));
        assert!(!vpc.contains(&parse_cidr("10.1.0.0/24").unwrap()));
        assert!(!vpc.contains(&parse_cidr("10.0.0.0/8").unwrap()));
        assert!(parse_cidr("10.0.0.1/16").is_err());
        assert!(parse_cidr("10.0.0.0/33").is_err());
        assert!(parse_cidr("10.0.0.0").is_err());
        assert!(parse_cidr("fd00::/64").is_err());
    }

    #[test]
    fn test_subnet_outside_vpc_rejected() {
        let mut config = DemoConfig::default();
        config.network.subnets[1].cidr = "172.16.0.0/24".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("outside the VPC"));
    }

    #[test]
    fn test_subnets_need_distinct_zones() {
        let mut config = DemoConfig::default();
        config.network.subnets[1].availability_zone = "us-east-1a".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("distinct availability zones"));

        config.network.subnets.truncate(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zone_must_match_region() {
        let mut config = DemoConfig::default();
        config.network.subnets[0].availability_zone = "eu-west-1a".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("not in region us-east-1"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = DemoConfig::default();
        config.timeouts.delete_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bucket_name_rules() {
        assert!(is_valid_bucket_name("xpdemo-bucket-us-east-1"));
        assert!(!is_valid_bucket_name("Upper-Case"));
        assert!(!is_valid_bucket_name("ab"));
        assert!(!is_valid_bucket_name("bad..dots"));
        assert!(!is_valid_bucket_name("192.168.1.1"));

        let config = DemoConfig {
            bucket_name: Some("-leading".into()),
            ..DemoConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
