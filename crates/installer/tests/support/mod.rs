//! Scripted command runner shared by the flow tests.

#![allow(dead_code)]

use std::sync::Mutex;

use xpdemo_cli::{CommandOutput, CommandRunner, DemoConfig, Invocation, ToolError};

type Matcher = Box<dyn Fn(&Invocation) -> bool + Send + Sync>;
type Responder = Box<dyn Fn(&Invocation) -> Result<CommandOutput, ToolError> + Send + Sync>;

mockall::mock! {
    pub Runner {}

    impl CommandRunner for Runner {
        fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ToolError>;
    }
}

/// Answers invocations from a rule list and records every call.
///
/// Rules are tried in insertion order; the first match wins. Unmatched
/// invocations succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<(Matcher, Responder)>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        mut self,
        matcher: impl Fn(&Invocation) -> bool + Send + Sync + 'static,
        responder: impl Fn(&Invocation) -> Result<CommandOutput, ToolError> + Send + Sync + 'static,
    ) -> Self {
        self.rules.push((Box::new(matcher), Box::new(responder)));
        self
    }

    /// Shortcut for a rule keyed on program and leading arguments.
    pub fn reply(self, program: &'static str, words: &'static [&'static str], output: CommandOutput) -> Self {
        self.on(
            move |inv| inv.program == program && inv.starts_with(words),
            move |_| Ok(output.clone()),
        )
    }

    /// Answer every `kubectl delete` the way kubectl does when the object existed.
    pub fn deletes_succeed(self) -> Self {
        self.on(
            |inv| inv.program == "kubectl" && inv.starts_with(&["delete"]),
            |inv| {
                let target = inv
                    .args
                    .iter()
                    .find(|a| a.contains('/'))
                    .cloned()
                    .unwrap_or_default();
                Ok(CommandOutput::ok(format!("{target} deleted\n")))
            },
        )
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose arguments start with `words`.
    pub fn calls_starting_with(&self, words: &[&str]) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|inv| inv.starts_with(words))
            .collect()
    }

    /// Stdin of every `kubectl apply -f -`, in call order.
    pub fn applied(&self) -> Vec<String> {
        self.calls_starting_with(&["apply", "-f", "-"])
            .into_iter()
            .filter_map(|inv| inv.stdin)
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());
        for (matcher, responder) in &self.rules {
            if matcher(invocation) {
                return responder(invocation);
            }
        }
        Ok(CommandOutput::ok(""))
    }
}

pub fn not_found(what: &str) -> CommandOutput {
    CommandOutput::failed(format!("Error from server (NotFound): {what} not found"))
}

pub fn timed_out() -> CommandOutput {
    CommandOutput::failed("error: timed out waiting for the condition")
}

pub fn unset() -> CommandOutput {
    CommandOutput {
        code: Some(1),
        ..CommandOutput::default()
    }
}

/// Default configuration with polling that never sleeps.
pub fn test_config() -> DemoConfig {
    DemoConfig {
        poll_interval_secs: 0,
        ..DemoConfig::default()
    }
}

/// A runner where the AWS profile holds static keys and everything else succeeds.
pub fn healthy_aws() -> ScriptedRunner {
    ScriptedRunner::new()
        .reply(
            "aws",
            &["configure", "get", "aws_access_key_id"],
            CommandOutput::ok("AKIAEXAMPLE\n"),
        )
        .reply(
            "aws",
            &["configure", "get", "aws_secret_access_key"],
            CommandOutput::ok("wJalrXUtnFEMI\n"),
        )
        .reply("aws", &["configure", "get", "aws_session_token"], unset())
        .reply(
            "aws",
            &["sts", "get-caller-identity"],
            CommandOutput::ok(
                r#"{"UserId": "AIDAEXAMPLE", "Account": "123456789012", "Arn": "arn:aws:iam::123456789012:user/demo"}"#,
            ),
        )
        .on(
            |inv| inv.program == "kubectl" && inv.starts_with(&["create", "-n"]),
            |_| {
                Ok(CommandOutput::ok(
                    "apiVersion: v1\nkind: Secret\nmetadata:\n  name: xpdemo-aws-credentials\n  namespace: crossplane-system\n",
                ))
            },
        )
}
