use tracing::debug;

use crate::runner::{CommandRunner, Invocation, ToolError};

const PROGRAM: &str = "helm";

/// `helm` against the current kubeconfig context.
pub struct Helm<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Helm<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    fn run(&self, invocation: &Invocation) -> Result<String, ToolError> {
        self.runner.run(invocation)?.into_result(PROGRAM)
    }

    /// `helm version --short`.
    ///
    /// # Errors
    ///
    /// Returns an error if helm is missing or fails.
    pub fn version(&self) -> Result<String, ToolError> {
        self.run(&Invocation::new(PROGRAM).args(["version", "--short"]))
    }

    /// Add a chart repository. An existing repository with the same name is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if helm rejects the repository for any other reason.
    pub fn repo_add(&self, name: &str, url: &str) -> Result<(), ToolError> {
        match self.run(&Invocation::new(PROGRAM).args(["repo", "add", name, url])) {
            Ok(_) => Ok(()),
            Err(ToolError::Failed { ref stderr, .. }) if stderr.contains("already exists") => {
                debug!(repo = name, "Helm repository already present");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// # Errors
    ///
    /// Returns an error if any repository index cannot be fetched.
    pub fn repo_update(&self) -> Result<(), ToolError> {
        self.run(&Invocation::new(PROGRAM).args(["repo", "update"]))
            .map(|_| ())
    }

    /// Install or upgrade a release and wait for its resources.
    ///
    /// # Errors
    ///
    /// Returns an error if helm fails or the release does not become ready.
    pub fn upgrade_install(
        &self,
        release: &str,
        chart: &str,
        namespace: &str,
        version: Option<&str>,
    ) -> Result<(), ToolError> {
        let mut invocation = Invocation::new(PROGRAM).args([
            "upgrade",
            "--install",
            release,
            chart,
            "--namespace",
            namespace,
            "--create-namespace",
            "--wait",
        ]);
        if let Some(version) = version {
            invocation = invocation.args(["--version", version]);
        }
        self.run(&invocation).map(|_| ())
    }

    /// Uninstall a release. Returns `false` if the release was already gone.
    ///
    /// # Errors
    ///
    /// Returns an error if helm fails for any other reason.
    pub fn uninstall(&self, release: &str, namespace: &str) -> Result<bool, ToolError> {
        match self.run(&Invocation::new(PROGRAM).args([
            "uninstall",
            release,
            "--namespace",
            namespace,
            "--wait",
        ])) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
