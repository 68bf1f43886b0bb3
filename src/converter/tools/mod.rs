//! External tool invocation.
//!
//! Every process the converter starts goes through [`ExternalTool`], which takes
//! a fully described [`Invocation`] plus a timeout and a cancellation token.
//! [`ProcessTool`] spawns real processes; tests substitute a scripted fake.

pub mod commands;
mod process;

pub use process::ProcessTool;

use crate::converter::{
    error::{Error, Result},
    settings::Tool,
};
use async_trait::async_trait;
use std::{path::PathBuf, time::Duration};
use tokio_util::sync::CancellationToken;

/// A single external command with its declared outputs.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Which tool this runs (bundletool runs through `java`).
    pub tool: Tool,
    /// Short label for logs and error messages, e.g. `bundletool build-apks`.
    pub label: String,
    /// Executable to spawn.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Input files the command reads.
    pub inputs: Vec<PathBuf>,
    /// Files the command must create; checked after a successful exit.
    pub outputs: Vec<PathBuf>,
    /// Values masked when the command line is logged.
    pub secrets: Vec<String>,
}

impl Invocation {
    /// Command line with secrets masked, for logging.
    pub fn display_command(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            let mut shown = arg.clone();
            for secret in self.secrets.iter().filter(|s| !s.is_empty()) {
                shown = shown.replace(secret.as_str(), "****");
            }
            line.push(' ');
            line.push_str(&shown);
        }
        line
    }

    /// Value of a `--flag=value` style argument.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let prefix = format!("{flag}=");
        self.args
            .iter()
            .find_map(|arg| arg.strip_prefix(prefix.as_str()))
    }

    /// Whether a bare argument is present.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// Runs external commands.
///
/// Implementations must return [`Error::ExternalToolFailure`] for a non-zero
/// exit or an expired timeout, and [`Error::Cancelled`] when `cancel` fires
/// first. In both cases the process must be gone when the call returns.
#[async_trait]
pub trait ExternalTool: Send + Sync {
    /// Runs `invocation` to completion.
    async fn invoke(
        &self,
        invocation: &Invocation,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput>;
}

/// Runs `invocation` and verifies every declared output exists afterwards.
pub async fn run(
    tool: &dyn ExternalTool,
    invocation: &Invocation,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ToolOutput> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    log::debug!("Running {}", invocation.display_command());
    let output = tool.invoke(invocation, timeout, cancel).await?;

    for expected in &invocation.outputs {
        if !tokio::fs::try_exists(expected).await.unwrap_or(false) {
            return Err(Error::ExternalToolFailure {
                tool: invocation.label.clone(),
                reason: format!("expected output {} was not produced", expected.display()),
                diagnostics: output.stderr,
            });
        }
    }

    Ok(output)
}
