use std::time::Duration;

use tracing::debug;

use crate::runner::{CommandRunner, Invocation, ToolError};

const PROGRAM: &str = "kubectl";

/// `kubectl` against the current kubeconfig context.
pub struct Kubectl<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Kubectl<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    fn run(&self, invocation: &Invocation) -> Result<String, ToolError> {
        self.runner.run(invocation)?.into_result(PROGRAM)
    }

    fn command(verb: &str, namespace: Option<&str>) -> Invocation {
        let invocation = Invocation::new(PROGRAM).arg(verb);
        match namespace {
            Some(ns) => invocation.args(["-n", ns]),
            None => invocation,
        }
    }

    /// `kubectl version --client`.
    ///
    /// # Errors
    ///
    /// Returns an error if kubectl is missing or fails.
    pub fn client_version(&self) -> Result<String, ToolError> {
        self.run(&Invocation::new(PROGRAM).args(["version", "--client"]))
    }

    /// `kubectl cluster-info`; succeeds only when the API server answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster is unreachable.
    pub fn cluster_info(&self) -> Result<String, ToolError> {
        self.run(&Invocation::new(PROGRAM).arg("cluster-info"))
    }

    /// Name of the active kubeconfig context.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set.
    pub fn current_context(&self) -> Result<String, ToolError> {
        self.run(&Invocation::new(PROGRAM).args(["config", "current-context"]))
            .map(|s| s.trim().to_string())
    }

    /// Apply YAML passed on stdin.
    ///
    /// # Errors
    ///
    /// Returns an error if the API server rejects any document.
    pub fn apply(&self, yaml: &str) -> Result<String, ToolError> {
        self.run(&Invocation::new(PROGRAM).args(["apply", "-f", "-"]).stdin(yaml))
    }

    /// `kubectl get <target>` with extra arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the get fails, including when the object is absent.
    pub fn get(
        &self,
        target: &str,
        namespace: Option<&str>,
        extra: &[&str],
    ) -> Result<String, ToolError> {
        self.run(
            &Self::command("get", namespace)
                .arg(target)
                .args(extra.iter().copied()),
        )
    }

    /// Whether the object exists.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than "not found".
    pub fn exists(&self, target: &str, namespace: Option<&str>) -> Result<bool, ToolError> {
        match self.get(target, namespace, &["-o", "name"]) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Status of one condition (`True`, `False`, `Unknown`), or `None` if the
    /// condition is not reported yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be read.
    pub fn condition_status(
        &self,
        target: &str,
        namespace: Option<&str>,
        condition: &str,
    ) -> Result<Option<String>, ToolError> {
        let jsonpath =
            format!("jsonpath={{.status.conditions[?(@.type==\"{condition}\")].status}}");
        let status = self.get(target, namespace, &["-o", jsonpath.as_str()])?;
        let status = status.trim();
        Ok((!status.is_empty()).then(|| status.to_string()))
    }

    /// Block until `condition` is true, via `kubectl wait`.
    ///
    /// # Errors
    ///
    /// Returns an error when the wait times out or the object is missing.
    pub fn wait_for(
        &self,
        target: &str,
        namespace: Option<&str>,
        condition: &str,
        timeout: Duration,
    ) -> Result<(), ToolError> {
        debug!(resource = target, condition, timeout_secs = timeout.as_secs(), "Waiting");
        self.run(&Self::command("wait", namespace).args([
            target.to_string(),
            format!("--for=condition={condition}"),
            format!("--timeout={}s", timeout.as_secs()),
        ]))
        .map(|_| ())
    }

    /// Block until a deployment rollout finishes.
    ///
    /// # Errors
    ///
    /// Returns an error when the rollout does not finish in time.
    pub fn rollout_status(
        &self,
        target: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<(), ToolError> {
        self.run(&Self::command("rollout", namespace).args([
            "status".to_string(),
            target.to_string(),
            format!("--timeout={}s", timeout.as_secs()),
        ]))
        .map(|_| ())
    }

    /// Delete an object and wait for it to go away.
    ///
    /// Returns `false` when the object was already absent: with
    /// `--ignore-not-found` kubectl then succeeds without printing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails or the wait times out.
    pub fn delete(
        &self,
        target: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<bool, ToolError> {
        self.run(&Self::command("delete", namespace).args([
            target.to_string(),
            "--ignore-not-found".to_string(),
            "--wait=true".to_string(),
            format!("--timeout={}s", timeout.as_secs()),
        ]))
        .map(|out| !out.trim().is_empty())
    }

    /// Apply a JSON merge patch.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch is rejected or the object is absent.
    pub fn patch_merge(
        &self,
        target: &str,
        namespace: Option<&str>,
        patch: &str,
    ) -> Result<(), ToolError> {
        self.run(
            &Self::command("patch", namespace).args([target, "--type", "merge", "-p", patch]),
        )
        .map(|_| ())
    }

    /// Create or update a generic secret whose single `key` is read from `file`.
    ///
    /// The secret is rendered client side and then applied so re-runs update it.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or applying the secret fails.
    pub fn apply_secret_from_file(
        &self,
        name: &str,
        namespace: &str,
        key: &str,
        file: &std::path::Path,
    ) -> Result<(), ToolError> {
        let rendered = self.run(&Self::command("create", Some(namespace)).args([
            "secret".to_string(),
            "generic".to_string(),
            name.to_string(),
            format!("--from-file={key}={}", file.display()),
            "--dry-run=client".to_string(),
            "-o".to_string(),
            "yaml".to_string(),
        ]))?;
        self.apply(&rendered).map(|_| ())
    }

    /// Pod listing without headers, one pod per line.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    pub fn pods(&self, namespace: &str, selector: Option<&str>) -> Result<String, ToolError> {
        let mut extra = vec!["--no-headers"];
        if let Some(selector) = selector {
            extra.extend(["-l", selector]);
        }
        self.get("pods", Some(namespace), &extra)
    }
}
