//! Provider credentials.
//!
//! Copies the AWS profile's keys into a cluster secret and points the
//! provider's default `ProviderConfig` at it.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::DemoConfig;
use crate::manifests::{Category, ResourcePlan, CREDENTIALS_KEY};
use crate::runner::{CommandRunner, ToolError};
use crate::tools::{AwsCli, Kubectl};
use crate::ui;

/// CRD that exists once the AWS provider family has started.
pub const PROVIDER_CONFIG_CRD: &str = "customresourcedefinition/providerconfigs.aws.upbound.io";

/// Keys read from the AWS profile.
#[derive(Clone)]
pub struct AwsKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsKeys {
    /// INI body in the format the provider expects under the secret key.
    #[must_use]
    pub fn to_ini(&self) -> String {
        let mut ini = format!(
            "[default]\naws_access_key_id = {}\naws_secret_access_key = {}\n",
            self.access_key_id, self.secret_access_key
        );
        if let Some(token) = &self.session_token {
            ini.push_str(&format!("aws_session_token = {token}\n"));
        }
        ini
    }
}

impl std::fmt::Debug for AwsKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsKeys")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Creates the credentials secret and `ProviderConfig`.
pub struct CredentialConfigurator<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a DemoConfig,
}

impl<'a> CredentialConfigurator<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a DemoConfig) -> Self {
        Self { runner, config }
    }

    /// Read the profile's keys with `aws configure get`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the profile if either required key is missing.
    pub fn read_keys(&self) -> Result<AwsKeys> {
        let aws = AwsCli::new(self.runner, self.config.aws_profile.as_str());
        let profile = &self.config.aws_profile;

        let access_key_id = aws
            .configure_get("aws_access_key_id")?
            .with_context(|| format!("AWS profile '{profile}' has no aws_access_key_id"))?;
        let secret_access_key = aws
            .configure_get("aws_secret_access_key")?
            .with_context(|| format!("AWS profile '{profile}' has no aws_secret_access_key"))?;
        let session_token = aws.configure_get("aws_session_token")?;

        debug!(profile = %profile, temporary = session_token.is_some(), "Read AWS keys");
        Ok(AwsKeys {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }

    /// Create or update the credentials secret from a short-lived file.
    ///
    /// The file is removed when this returns, whether or not the secret was applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the secret cannot be applied.
    pub fn apply_secret(&self, keys: &AwsKeys) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("xpdemo-aws-")
            .suffix(".ini")
            .tempfile()
            .context("Failed to create credentials file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))
                .context("Failed to restrict credentials file permissions")?;
        }

        file.write_all(keys.to_ini().as_bytes())
            .context("Failed to write credentials file")?;
        file.flush().context("Failed to write credentials file")?;

        let secret = self.config.credentials_secret_name();
        let applied = Kubectl::new(self.runner)
            .apply_secret_from_file(
                &secret,
                &self.config.crossplane_namespace,
                CREDENTIALS_KEY,
                file.path(),
            )
            .with_context(|| format!("Failed to create secret {secret}"));

        file.close().context("Failed to remove credentials file")?;
        applied?;

        info!(secret = %secret, namespace = %self.config.crossplane_namespace, "Credentials secret applied");
        Ok(())
    }

    /// Poll until the provider has registered the `ProviderConfig` CRD.
    ///
    /// # Errors
    ///
    /// Returns an error if the CRD does not appear within `timeout`.
    pub async fn wait_for_provider_config_crd(&self, timeout: Duration) -> Result<()> {
        let kubectl = Kubectl::new(self.runner);
        let interval = self.config.poll_interval();
        let max_attempts = timeout.as_secs() / interval.as_secs().max(1) + 1;
        let mut attempts = 0;

        loop {
            if kubectl.exists(PROVIDER_CONFIG_CRD, None)? {
                return Ok(());
            }

            attempts += 1;
            if attempts >= max_attempts {
                return Err(ToolError::TimedOut {
                    what: "the AWS provider to register ProviderConfig".into(),
                    timeout_secs: timeout.as_secs(),
                }
                .into());
            }
            debug!(attempts, max_attempts, "ProviderConfig CRD not yet present");
            tokio::time::sleep(interval).await;
        }
    }

    /// Full credentials step: keys, secret, then the `ProviderConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if any part fails.
    pub async fn configure(&self, plan: &ResourcePlan) -> Result<()> {
        ui::print_progress(&format!(
            "Reading credentials for profile {}...",
            self.config.aws_profile
        ));
        let keys = self.read_keys()?;

        ui::print_progress("Creating credentials secret...");
        self.apply_secret(&keys)?;

        ui::print_progress("Waiting for the ProviderConfig API...");
        self.wait_for_provider_config_crd(Duration::from_secs(
            self.config.timeouts.provider_secs,
        ))
        .await?;

        ui::print_progress("Applying ProviderConfig...");
        Kubectl::new(self.runner)
            .apply(&plan.yaml_for(Category::Credentials))
            .context("Failed to apply ProviderConfig")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::function;

    use super::*;
    use crate::runner::{CommandOutput, Invocation, MockCommandRunner};

    fn keys(token: Option<&str>) -> AwsKeys {
        AwsKeys {
            access_key_id: "AKIAEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI".into(),
            session_token: token.map(String::from),
        }
    }

    #[test]
    fn test_ini_format() {
        let ini = keys(None).to_ini();
        assert!(ini.starts_with("[default]\n"));
        assert!(ini.contains("aws_access_key_id = AKIAEXAMPLE\n"));
        assert!(!ini.contains("aws_session_token"));

        assert!(keys(Some("tok")).to_ini().contains("aws_session_token = tok\n"));
        assert!(!format!("{:?}", keys(Some("tok"))).contains("wJalrXUtnFEMI"));
    }

    #[test]
    fn test_missing_key_names_profile() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_| {
            Ok(CommandOutput {
                code: Some(1),
                ..CommandOutput::default()
            })
        });
        let config = DemoConfig {
            aws_profile: "sandbox".into(),
            ..DemoConfig::default()
        };
        let err = CredentialConfigurator::new(&runner, &config)
            .read_keys()
            .unwrap_err();
        assert!(err.to_string().contains("'sandbox'"));
    }

    #[test]
    fn test_secret_file_removed_after_failure() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let captured = seen.clone();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(function(|inv: &Invocation| inv.starts_with(&["create"])))
            .times(1)
            .returning(move |inv| {
                let path = inv
                    .args
                    .iter()
                    .find_map(|a| a.strip_prefix("--from-file=creds="))
                    .map(std::path::PathBuf::from);
                let content = path.as_ref().map(std::fs::read_to_string);
                *captured.lock().unwrap() = Some((path, content.map(Result::unwrap)));
                Ok(CommandOutput::failed("namespaces \"crossplane-system\" not found"))
            });

        let config = DemoConfig::default();
        let result = CredentialConfigurator::new(&runner, &config).apply_secret(&keys(None));
        assert!(result.is_err());

        let (path, content) = seen.lock().unwrap().take().unwrap();
        let path = path.unwrap();
        assert!(content.unwrap().contains("AKIAEXAMPLE"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_crd_wait_gives_up() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(3)
            .returning(|_| Ok(CommandOutput::failed("Error from server (NotFound)")));
        let config = DemoConfig {
            poll_interval_secs: 0,
            ..DemoConfig::default()
        };
        let result = CredentialConfigurator::new(&runner, &config)
            .wait_for_provider_config_crd(Duration::from_secs(2))
            .await;
        let err = result.unwrap_err();
        assert!(err.downcast_ref::<ToolError>().is_some_and(ToolError::is_timeout));
    }
}
