//! External process execution.
//!
//! Every `kubectl`, `helm` and `aws` call goes through [`CommandRunner`] so the
//! install, validate and cleanup flows can be driven against a scripted runner
//! in tests.

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

/// Arguments that follow these flags are never echoed to logs.
const REDACTED_FLAGS: &[&str] = &["--from-literal"];

/// Errors raised while running an external tool.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The program is not on `PATH`.
    #[error("{program} not found on PATH")]
    NotInstalled { program: String },

    /// The process could not be started or waited on.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited non-zero.
    #[error("{program} exited with {}: {stderr}", describe_exit(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A bounded wait expired.
    #[error("Timed out after {timeout_secs}s waiting for {what}")]
    TimedOut { what: String, timeout_secs: u64 },
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

impl ToolError {
    /// Whether the failure means the target object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Failed { stderr, .. } => {
                stderr.contains("NotFound")
                    || stderr.contains("not found")
                    || stderr.contains("the server doesn't have a resource type")
            }
            _ => false,
        }
    }

    /// Whether the failure was a timeout, either ours or the tool's own.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::TimedOut { .. } => true,
            Self::Failed { stderr, .. } => stderr.contains("timed out"),
            _ => false,
        }
    }
}

/// One external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed this text to the process on stdin.
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Whether the arguments start with the given words, e.g. `["apply", "-f"]`.
    #[must_use]
    pub fn starts_with(&self, words: &[&str]) -> bool {
        self.args.len() >= words.len() && self.args.iter().zip(words).all(|(a, w)| a == w)
    }

    /// Whether any argument equals `word`.
    #[must_use]
    pub fn has_arg(&self, word: &str) -> bool {
        self.args.iter().any(|a| a == word)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        let mut redact_next = false;
        for arg in &self.args {
            if redact_next {
                write!(f, " ***")?;
                redact_next = false;
                continue;
            }
            if REDACTED_FLAGS.contains(&arg.as_str()) {
                redact_next = true;
            }
            if let Some(flag) = REDACTED_FLAGS
                .iter()
                .find(|flag| arg.starts_with(&format!("{flag}=")))
            {
                write!(f, " {flag}=***")?;
            } else if arg.contains(' ') {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        if self.stdin.is_some() {
            write!(f, " < (stdin)")?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output carrying `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with exit code 1 carrying `stderr`.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`ToolError::Failed`], keeping stdout otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Failed`] when the process did not exit zero.
    pub fn into_result(self, program: &str) -> Result<String, ToolError> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(ToolError::Failed {
                program: program.to_string(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs external commands.
///
/// A non-zero exit is reported through [`CommandOutput`], not as an error;
/// only failures to start the process are errors here.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Run one invocation to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotInstalled`] or [`ToolError::Spawn`] when the
    /// process cannot be started.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ToolError>;
}

/// Runs commands on the local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ToolError> {
        let program = which::which(&invocation.program).map_err(|_| ToolError::NotInstalled {
            program: invocation.program.clone(),
        })?;

        debug!(command = %invocation, "Running");

        let spawn_err = |source| ToolError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        let mut child = Command::new(program)
            .args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(input) = &invocation.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes()).map_err(spawn_err)?;
            }
        }

        let output = child.wait_with_output().map_err(spawn_err)?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
