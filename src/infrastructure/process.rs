// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Execution of external provider tooling

use super::constants::TRANSIENT_ERROR_MARKERS;
use crate::shared::error::ProviderError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Both streams, for matching provider messages that may land on either.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs a provider CLI. Drivers only talk to the outside world through this.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program args...`, killing it if it outlives `timeout`.
    ///
    /// A program missing from `PATH` yields `ProviderError::Unavailable` and an
    /// expired timeout yields `ProviderError::Timeout`; a non-zero exit is *not*
    /// an error at this level.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ProviderError>;
}

/// Runs commands on the local machine with `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct SystemCommandRunner;

#[async_trait::async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ProviderError> {
        debug!(program, args = ?args, timeout_secs = timeout.as_secs(), "running provider command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ProviderError::unavailable(program, "not found in PATH")
                }
                _ => ProviderError::unavailable(program, e.to_string()),
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProviderError::Unknown(format!(
                    "failed to wait for '{}': {}",
                    program, e
                )))
            }
            Err(_) => {
                return Err(ProviderError::Timeout {
                    operation: describe(program, args),
                    seconds: timeout.as_secs(),
                })
            }
        };

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(program, code = ?result.code, "provider command finished");
        Ok(result)
    }
}

/// Human-readable command line for error messages.
pub fn describe(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Classify a non-zero exit into the provider error taxonomy.
pub fn classify_failure(program: &str, args: &[String], output: &CommandOutput) -> ProviderError {
    let message = output.stderr.trim();
    let message = if message.is_empty() {
        output.stdout.trim()
    } else {
        message
    };
    let lowered = message.to_lowercase();

    if TRANSIENT_ERROR_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return ProviderError::TransientFailure(format!(
            "'{}': {}",
            describe(program, args),
            message
        ));
    }

    ProviderError::Unknown(format!(
        "'{}' exited with {}: {}",
        describe(program, args),
        output
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string()),
        message
    ))
}

/// Run a command and turn a non-zero exit into an error.
pub async fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutput, ProviderError> {
    let output = runner.run(program, args, timeout).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(classify_failure(program, args, &output))
    }
}

/// Build an owned argument vector from string slices.
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}
