//! Subprocess bridge for the Azure CLI.
//!
//! Every upstream interaction goes through a single `az` invocation: spawn,
//! wait, decode stdout as JSON. The JSON schema belongs to the CLI, not to
//! this tool, so callers project fields defensively.

#[cfg(test)]
pub mod testing;

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::error::ProviderError;

/// Interface to the cloud provider CLI.
///
/// Implemented by [`AzCli`] for real runs and by a scripted fake in tests.
#[async_trait]
pub trait CloudCli: Send + Sync {
    /// Run a provider command and decode its stdout as JSON.
    ///
    /// Commands that print nothing on success resolve to `Value::Null`.
    async fn invoke(&self, args: &[&str]) -> Result<Value, ProviderError>;

    /// Like [`CloudCli::invoke`], but leaves stdin and stderr attached to
    /// the terminal so interactive flows (device-code login) can talk to
    /// the operator. No timeout applies.
    async fn invoke_interactive(&self, args: &[&str]) -> Result<Value, ProviderError> {
        self.invoke(args).await
    }
}

/// The real `az` binary, invoked as a subprocess.
pub struct AzCli {
    binary: String,
    timeout: Duration,
}

impl AzCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn run(&self, args: &[&str], interactive: bool) -> Result<Value, ProviderError> {
        let command_line = format!("{} {}", self.binary, args.join(" "));
        debug!("Running: {command_line}");

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .args(["--output", "json"])
            .stdout(Stdio::piped())
            .env("AZURE_CORE_NO_COLOR", "true");

        if interactive {
            cmd.stdin(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null()).stderr(Stdio::piped());
        }

        let spawned = cmd.output();
        let result = if interactive {
            Ok(spawned.await)
        } else {
            tokio::time::timeout(self.timeout, spawned).await
        };

        let output = match result {
            Err(_) => {
                return Err(ProviderError::Timeout {
                    command: command_line,
                    seconds: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::CliNotFound(self.binary.clone()))
            }
            Ok(Err(e)) => {
                return Err(ProviderError::Spawn {
                    command: command_line,
                    source: e,
                })
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ProviderError::CommandFailed {
                command: command_line,
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(stdout).map_err(|e| ProviderError::Json {
            command: command_line,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CloudCli for AzCli {
    async fn invoke(&self, args: &[&str]) -> Result<Value, ProviderError> {
        self.run(args, false).await
    }

    async fn invoke_interactive(&self, args: &[&str]) -> Result<Value, ProviderError> {
        self.run(args, true).await
    }
}
