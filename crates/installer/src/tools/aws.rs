use serde::Deserialize;

use crate::runner::{CommandRunner, Invocation, ToolError};

const PROGRAM: &str = "aws";

/// Result of `aws sts get-caller-identity`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub user_id: String,
    pub account: String,
    pub arn: String,
}

/// The AWS CLI, scoped to one named profile.
pub struct AwsCli<'a> {
    runner: &'a dyn CommandRunner,
    profile: String,
}

impl<'a> AwsCli<'a> {
    pub fn new(runner: &'a dyn CommandRunner, profile: impl Into<String>) -> Self {
        Self {
            runner,
            profile: profile.into(),
        }
    }

    fn run(&self, invocation: &Invocation) -> Result<String, ToolError> {
        self.runner.run(invocation)?.into_result(PROGRAM)
    }

    /// `aws --version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the CLI is missing or fails.
    pub fn version(&self) -> Result<String, ToolError> {
        self.run(&Invocation::new(PROGRAM).arg("--version"))
    }

    /// Read one value from the profile's stored configuration.
    ///
    /// `aws configure get` exits non-zero with no output when the key is
    /// unset; that case is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the CLI cannot be run.
    pub fn configure_get(&self, key: &str) -> Result<Option<String>, ToolError> {
        let output = self.runner.run(&Invocation::new(PROGRAM).args([
            "configure",
            "get",
            key,
            "--profile",
            self.profile.as_str(),
        ]))?;

        let value = output.stdout.trim();
        if output.success() && !value.is_empty() {
            Ok(Some(value.to_string()))
        } else if output.code == Some(1) && value.is_empty() {
            Ok(None)
        } else {
            output.into_result(PROGRAM).map(|_| None)
        }
    }

    /// Identity the profile authenticates as.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the output cannot be parsed.
    pub fn caller_identity(&self) -> Result<CallerIdentity, ToolError> {
        let stdout = self.run(&Invocation::new(PROGRAM).args([
            "sts",
            "get-caller-identity",
            "--profile",
            self.profile.as_str(),
            "--output",
            "json",
        ]))?;

        serde_json::from_str(&stdout).map_err(|e| ToolError::Failed {
            program: PROGRAM.to_string(),
            code: Some(0),
            stderr: format!("unexpected get-caller-identity output: {e}"),
        })
    }
}
