//! Declarative resource library.
//!
//! The YAML under `infra/crossplane/` is embedded at compile time and rendered
//! with values from [`DemoConfig`]. Rendering also parses every document so the
//! install, validate and cleanup flows know exactly which objects exist, in
//! which order, and how each is torn down.

use std::fmt;

use anyhow::{Context, Result};
use handlebars::Handlebars;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::DemoConfig;

/// Key inside the credentials secret that holds the INI credentials file.
pub const CREDENTIALS_KEY: &str = "creds";

/// Length of the generated database master password.
const PASSWORD_LENGTH: usize = 24;

/// Resource category, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Provider packages registered with Crossplane.
    Provider,
    /// The `ProviderConfig` pointing at the credentials secret.
    Credentials,
    /// VPC and subnets, imported or created. Never destroyed.
    Networking,
    /// Security groups and their rules.
    Security,
    /// DB subnet group and the generated password secret.
    DatabasePrep,
    /// S3 bucket.
    Storage,
    /// RDS instance.
    Database,
    /// Sample web deployment and service.
    Workload,
}

impl Category {
    /// Install order: network, security, database prep, storage, database, workload.
    pub const INSTALL_ORDER: [Self; 8] = [
        Self::Provider,
        Self::Credentials,
        Self::Networking,
        Self::Security,
        Self::DatabasePrep,
        Self::Storage,
        Self::Database,
        Self::Workload,
    ];

    /// Exact reverse of [`Self::INSTALL_ORDER`].
    #[must_use]
    pub fn cleanup_order() -> Vec<Self> {
        Self::INSTALL_ORDER.iter().rev().copied().collect()
    }

    /// How objects of this category are removed during cleanup.
    #[must_use]
    pub fn disposition(self) -> Disposition {
        match self {
            Self::Networking => Disposition::Deregister,
            _ => Disposition::Destroy,
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Provider => "AWS provider packages",
            Self::Credentials => "Provider credentials",
            Self::Networking => "Network (VPC and subnets)",
            Self::Security => "Security groups",
            Self::DatabasePrep => "Database subnet group and password",
            Self::Storage => "S3 bucket",
            Self::Database => "RDS instance",
            Self::Workload => "Sample web workload",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Provider => "provider",
            Self::Credentials => "credentials",
            Self::Networking => "networking",
            Self::Security => "security",
            Self::DatabasePrep => "database-prep",
            Self::Storage => "storage",
            Self::Database => "database",
            Self::Workload => "workload",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::INSTALL_ORDER
            .iter()
            .copied()
            .find(|c| c.to_string() == s.to_lowercase())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown category: {s}. Supported: {}",
                    Self::INSTALL_ORDER
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// What cleanup does with an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Delete the object and the cloud resource behind it.
    Destroy,
    /// Stop managing the object but leave the cloud resource in place.
    Deregister,
}

/// Identity of one rendered object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceRef {
    /// API group, empty for the core group.
    #[must_use]
    pub fn group(&self) -> &str {
        self.api_version
            .rsplit_once('/')
            .map_or("", |(group, _)| group)
    }

    /// Fully qualified `kind.group/name` as understood by `kubectl`.
    #[must_use]
    pub fn kubectl_target(&self) -> String {
        let kind = self.kind.to_lowercase();
        match self.group() {
            "" => format!("{kind}/{}", self.name),
            group => format!("{kind}.{group}/{}", self.name),
        }
    }

    /// Whether this is a Crossplane managed resource with a `Ready` condition.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        let group = self.group();
        group.ends_with(".aws.upbound.io") && self.kind != "ProviderConfig"
    }

    #[must_use]
    pub fn is_deployment(&self) -> bool {
        self.kind == "Deployment"
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {ns}/{}", self.kind, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// One embedded template.
#[derive(Debug, Clone, Copy)]
pub struct Manifest {
    /// Path relative to `infra/crossplane/`.
    pub path: &'static str,
    pub category: Category,
    pub template: &'static str,
}

/// The full resource library, in install order.
pub const MANIFESTS: &[Manifest] = &[
    Manifest {
        path: "provider/provider-aws.yaml",
        category: Category::Provider,
        template: include_str!("../../../infra/crossplane/provider/provider-aws.yaml"),
    },
    Manifest {
        path: "provider/provider-config.yaml",
        category: Category::Credentials,
        template: include_str!("../../../infra/crossplane/provider/provider-config.yaml"),
    },
    Manifest {
        path: "networking/vpc.yaml",
        category: Category::Networking,
        template: include_str!("../../../infra/crossplane/networking/vpc.yaml"),
    },
    Manifest {
        path: "networking/subnets.yaml",
        category: Category::Networking,
        template: include_str!("../../../infra/crossplane/networking/subnets.yaml"),
    },
    Manifest {
        path: "security/security-groups.yaml",
        category: Category::Security,
        template: include_str!("../../../infra/crossplane/security/security-groups.yaml"),
    },
    Manifest {
        path: "database/subnet-group.yaml",
        category: Category::DatabasePrep,
        template: include_str!("../../../infra/crossplane/database/subnet-group.yaml"),
    },
    Manifest {
        path: "database/password-secret.yaml",
        category: Category::DatabasePrep,
        template: include_str!("../../../infra/crossplane/database/password-secret.yaml"),
    },
    Manifest {
        path: "storage/bucket.yaml",
        category: Category::Storage,
        template: include_str!("../../../infra/crossplane/storage/bucket.yaml"),
    },
    Manifest {
        path: "database/rds-instance.yaml",
        category: Category::Database,
        template: include_str!("../../../infra/crossplane/database/rds-instance.yaml"),
    },
    Manifest {
        path: "workload/web-app.yaml",
        category: Category::Workload,
        template: include_str!("../../../infra/crossplane/workload/web-app.yaml"),
    },
];

/// Values generated at install time that never come from configuration.
#[derive(Clone)]
pub struct Secrets {
    pub db_password: String,
}

impl Secrets {
    /// Fresh random secrets.
    #[must_use]
    pub fn generate() -> Self {
        let db_password = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PASSWORD_LENGTH)
            .map(char::from)
            .collect();
        Self { db_password }
    }

    /// Placeholder secrets for rendering that is only inspected, never applied.
    #[must_use]
    pub fn masked() -> Self {
        Self {
            db_password: "********".into(),
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("db_password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct VpcContext {
    name: String,
    external_id: Option<String>,
    cidr: String,
}

#[derive(Serialize)]
struct SubnetContext {
    name: String,
    external_id: Option<String>,
    cidr: String,
    availability_zone: String,
}

#[derive(Serialize)]
struct DatabaseContext {
    instance_name: String,
    subnet_group: String,
    password_secret: String,
    password: String,
    engine: String,
    engine_version: String,
    instance_class: String,
    storage_gb: u32,
    username: String,
    port: u16,
}

#[derive(Serialize)]
struct WorkloadContext {
    name: String,
    image: String,
    replicas: u32,
}

/// Everything a template may reference.
#[derive(Serialize)]
struct TemplateContext<'a> {
    prefix: &'a str,
    region: &'a str,
    crossplane_namespace: &'a str,
    workload_namespace: &'a str,
    providers: &'a [crate::config::ProviderPackage],
    credentials_secret: String,
    credentials_key: &'static str,
    vpc: VpcContext,
    subnets: Vec<SubnetContext>,
    web_security_group: String,
    db_security_group: String,
    database: DatabaseContext,
    bucket_name: String,
    workload: WorkloadContext,
}

impl<'a> TemplateContext<'a> {
    fn new(config: &'a DemoConfig, secrets: &Secrets) -> Self {
        let subnets = config
            .network
            .subnets
            .iter()
            .enumerate()
            .map(|(i, s)| SubnetContext {
                name: config.subnet_name(i),
                external_id: s.id.clone(),
                cidr: s.cidr.clone(),
                availability_zone: s.zone(&config.region),
            })
            .collect();

        Self {
            prefix: &config.name_prefix,
            region: &config.region,
            crossplane_namespace: &config.crossplane_namespace,
            workload_namespace: &config.workload_namespace,
            providers: &config.providers,
            credentials_secret: config.credentials_secret_name(),
            credentials_key: CREDENTIALS_KEY,
            vpc: VpcContext {
                name: config.vpc_name(),
                external_id: config.network.vpc_id.clone(),
                cidr: config.network.cidr.clone(),
            },
            subnets,
            web_security_group: config.web_security_group_name(),
            db_security_group: config.db_security_group_name(),
            database: DatabaseContext {
                instance_name: config.db_instance_name(),
                subnet_group: config.db_subnet_group_name(),
                password_secret: config.db_password_secret_name(),
                password: secrets.db_password.clone(),
                engine: config.database.engine.clone(),
                engine_version: config.database.engine_version.clone(),
                instance_class: config.database.instance_class.clone(),
                storage_gb: config.database.storage_gb,
                username: config.database.username.clone(),
                port: config.database.port,
            },
            bucket_name: config.bucket_name(),
            workload: WorkloadContext {
                name: config.workload_name(),
                image: config.workload.image.clone(),
                replicas: config.workload.replicas,
            },
        }
    }
}

/// Rendered YAML for one template plus the objects it describes.
#[derive(Debug, Clone)]
pub struct RenderedManifest {
    pub path: &'static str,
    pub category: Category,
    pub yaml: String,
    pub resources: Vec<ResourceRef>,
}

/// Every rendered manifest, in install order.
#[derive(Debug, Clone)]
pub struct ResourcePlan {
    pub manifests: Vec<RenderedManifest>,
}

impl ResourcePlan {
    /// Manifests of one category, in library order.
    pub fn category(&self, category: Category) -> impl Iterator<Item = &RenderedManifest> {
        self.manifests.iter().filter(move |m| m.category == category)
    }

    /// Concatenated YAML for one category, ready for a single `kubectl apply`.
    #[must_use]
    pub fn yaml_for(&self, category: Category) -> String {
        self.category(category)
            .map(|m| m.yaml.trim())
            .collect::<Vec<_>>()
            .join("\n---\n")
    }

    /// Objects of one category, in library order.
    #[must_use]
    pub fn resources(&self, category: Category) -> Vec<&ResourceRef> {
        self.category(category)
            .flat_map(|m| m.resources.iter())
            .collect()
    }

    /// Every object, in install order.
    #[must_use]
    pub fn all_resources(&self) -> Vec<(Category, &ResourceRef)> {
        Category::INSTALL_ORDER
            .iter()
            .flat_map(|&c| self.resources(c).into_iter().map(move |r| (c, r)))
            .collect()
    }
}

#[derive(Deserialize)]
struct ObjectHeader {
    #[serde(rename = "apiVersion")]
    api_version: Option<String>,
    kind: Option<String>,
    metadata: Option<ObjectMeta>,
}

#[derive(Deserialize)]
struct ObjectMeta {
    name: Option<String>,
    namespace: Option<String>,
}

/// Pull `apiVersion`, `kind` and `metadata` out of each YAML document.
///
/// Documents that are empty (only comments or separators) are skipped.
///
/// # Errors
///
/// Returns an error if a document is not valid YAML or lacks identity fields.
pub fn parse_resources(yaml: &str) -> Result<Vec<ResourceRef>> {
    let mut refs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = serde_yaml::Value::deserialize(document).context("Invalid YAML document")?;
        if value.is_null() {
            continue;
        }
        let header: ObjectHeader =
            serde_yaml::from_value(value).context("Document is not a Kubernetes object")?;

        let api_version = header.api_version.context("Document has no apiVersion")?;
        let kind = header.kind.context("Document has no kind")?;
        let metadata = header
            .metadata
            .with_context(|| format!("{kind} has no metadata"))?;
        let name = metadata
            .name
            .with_context(|| format!("{kind} has no metadata.name"))?;

        refs.push(ResourceRef {
            api_version,
            kind,
            name,
            namespace: metadata.namespace,
        });
    }
    Ok(refs)
}

/// Render the full library.
///
/// # Errors
///
/// Returns an error if a template references an unknown value or renders to
/// something that is not a set of Kubernetes objects.
pub fn render_all(config: &DemoConfig, secrets: &Secrets) -> Result<ResourcePlan> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);

    for manifest in MANIFESTS {
        handlebars
            .register_template_string(manifest.path, manifest.template)
            .with_context(|| format!("Invalid template {}", manifest.path))?;
    }

    let context = TemplateContext::new(config, secrets);

    let manifests = MANIFESTS
        .iter()
        .map(|manifest| {
            let yaml = handlebars
                .render(manifest.path, &context)
                .with_context(|| format!("Failed to render {}", manifest.path))?;
            let resources = parse_resources(&yaml)
                .with_context(|| format!("Rendered {} is not valid", manifest.path))?;
            Ok(RenderedManifest {
                path: manifest.path,
                category: manifest.category,
                yaml,
                resources,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResourcePlan { manifests })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> ResourcePlan {
        render_all(&DemoConfig::default(), &Secrets::masked()).unwrap()
    }

    #[test]
    fn test_every_template_renders() {
        let plan = plan();
        assert_eq!(plan.manifests.len(), MANIFESTS.len());
        for manifest in &plan.manifests {
            assert!(
                !manifest.resources.is_empty(),
                "{} describes no objects",
                manifest.path
            );
            assert!(!manifest.yaml.contains("{{"), "{} left a placeholder", manifest.path);
        }
    }

    #[test]
    fn test_install_order() {
        assert_eq!(
            Category::INSTALL_ORDER
                .iter()
                .skip_while(|c| **c != Category::Networking)
                .copied()
                .collect::<Vec<_>>(),
            vec![
                Category::Networking,
                Category::Security,
                Category::DatabasePrep,
                Category::Storage,
                Category::Database,
                Category::Workload,
            ]
        );
        let mut reversed = Category::cleanup_order();
        reversed.reverse();
        assert_eq!(reversed, Category::INSTALL_ORDER.to_vec());
    }

    #[test]
    fn test_only_networking_is_deregistered() {
        for category in Category::INSTALL_ORDER {
            let expected = if category == Category::Networking {
                Disposition::Deregister
            } else {
                Disposition::Destroy
            };
            assert_eq!(category.disposition(), expected);
        }
    }

    #[test]
    fn test_networking_resources() {
        let plan = plan();
        let kinds: Vec<_> = plan
            .resources(Category::Networking)
            .iter()
            .map(|r| (r.kind.as_str(), r.name.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("VPC", "xpdemo-vpc"),
                ("Subnet", "xpdemo-subnet-us-east-1a"),
                ("Subnet", "xpdemo-subnet-us-east-1b"),
            ]
        );
        // Orphaned so the cloud objects outlive cleanup
        assert!(plan
            .category(Category::Networking)
            .all(|m| m.yaml.contains("deletionPolicy: Orphan")));
    }

    #[test]
    fn test_external_names_only_when_importing() {
        let mut config = DemoConfig::default();
        let plan = render_all(&config, &Secrets::masked()).unwrap();
        assert!(!plan
            .yaml_for(Category::Networking)
            .contains("crossplane.io/external-name"));

        config.network.vpc_id = Some("vpc-0abc".into());
        config.network.subnets[0].id = Some("subnet-0aaa".into());
        let plan = render_all(&config, &Secrets::masked()).unwrap();
        let yaml = plan.yaml_for(Category::Networking);
        assert!(yaml.contains("crossplane.io/external-name: vpc-0abc"));
        assert!(yaml.contains("crossplane.io/external-name: subnet-0aaa"));
    }

    #[test]
    fn test_kubectl_targets() {
        let plan = plan();
        let db = plan.resources(Category::Database)[0];
        assert_eq!(db.kubectl_target(), "instance.rds.aws.upbound.io/xpdemo-db");
        assert!(db.is_managed());

        let secret = plan
            .resources(Category::DatabasePrep)
            .into_iter()
            .find(|r| r.kind == "Secret")
            .unwrap();
        assert_eq!(secret.kubectl_target(), "secret/xpdemo-db-password");
        assert_eq!(secret.namespace.as_deref(), Some("crossplane-system"));
        assert!(!secret.is_managed());

        let provider = plan.resources(Category::Provider)[0];
        assert_eq!(
            provider.kubectl_target(),
            "provider.pkg.crossplane.io/provider-aws-ec2"
        );

        let deployment = plan.resources(Category::Workload)[0];
        assert_eq!(deployment.kubectl_target(), "deployment.apps/xpdemo-web");
        assert!(deployment.is_deployment());
    }

    #[test]
    fn test_password_is_rendered_quoted() {
        let secrets = Secrets {
            db_password: "0123456789".into(),
        };
        let plan = render_all(&DemoConfig::default(), &secrets).unwrap();
        assert!(plan
            .yaml_for(Category::DatabasePrep)
            .contains("password: \"0123456789\""));
    }

    #[test]
    fn test_generated_password() {
        let a = Secrets::generate();
        let b = Secrets::generate();
        assert_eq!(a.db_password.len(), PASSWORD_LENGTH);
        assert!(a.db_password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.db_password, b.db_password);
        assert!(!format!("{a:?}").contains(&a.db_password));
    }

    #[test]
    fn test_parse_resources_rejects_incomplete_documents() {
        assert!(parse_resources("apiVersion: v1\nkind: Secret\n").is_err());
        assert!(parse_resources("kind: Secret\nmetadata:\n  name: x\n").is_err());
        assert!(parse_resources("# only a comment\n---\n").unwrap().is_empty());
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(
            "database-prep".parse::<Category>().unwrap(),
            Category::DatabasePrep
        );
        assert!("dns".parse::<Category>().is_err());
    }
}
