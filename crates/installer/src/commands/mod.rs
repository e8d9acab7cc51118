//! Subcommand implementations.

pub mod cleanup;
pub mod install;
pub mod manifests;
pub mod validate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use kube::config::Kubeconfig;
use tracing::debug;

use crate::config::{DemoConfig, Overrides};

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub profile: Option<String>,
    pub region: Option<String>,
}

impl GlobalArgs {
    /// Effective configuration for this invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or is invalid.
    pub fn resolve_config(&self) -> Result<DemoConfig> {
        DemoConfig::resolve(
            self.config.as_deref(),
            &Overrides {
                aws_profile: self.profile.clone(),
                region: self.region.clone(),
            },
        )
    }
}

/// Current context from the local kubeconfig (`$KUBECONFIG` or `~/.kube/config`).
///
/// # Errors
///
/// Returns an error if there is no kubeconfig or it names no current context.
pub fn kubeconfig_context() -> Result<String> {
    let kubeconfig = Kubeconfig::read().context("No kubeconfig found")?;
    let context = kubeconfig
        .current_context
        .filter(|c| !c.is_empty())
        .context("Kubeconfig has no current context")?;
    debug!(%context, "Read kubeconfig");
    Ok(context)
}
