//! Process-backed [`ExternalTool`].

use super::{ExternalTool, Invocation, ToolOutput};
use crate::converter::error::{Error, Result};
use async_trait::async_trait;
use std::{process::Stdio, time::Duration};
use tokio::{io::AsyncReadExt, process::Command};
use tokio_util::sync::CancellationToken;

/// Grace period for a killed process to be reaped.
const KILL_GRACE: Duration = Duration::from_secs(10);

/// How long to wait for the stderr pipe of a killed process to close.
const PIPE_GRACE: Duration = Duration::from_secs(2);

/// Spawns real processes with piped output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTool;

enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl ExternalTool for ProcessTool {
    async fn invoke(
        &self,
        invocation: &Invocation,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| Error::CommandFailed {
                command: invocation.program.display().to_string(),
                error,
            })?;

        // Drain both pipes in the background so a chatty tool never blocks on a full pipe
        let stdout = tokio::spawn(read_to_string(child.stdout.take()));
        let stderr = tokio::spawn(read_to_string(child.stderr.take()));

        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => Waited::Cancelled,
            res = tokio::time::timeout(timeout, child.wait()) => match res {
                Ok(status) => Waited::Exited(status),
                Err(_elapsed) => Waited::TimedOut,
            },
        };

        let status = match waited {
            Waited::Exited(Ok(status)) => status,
            Waited::Exited(Err(error)) => {
                return Err(Error::CommandFailed {
                    command: invocation.label.clone(),
                    error,
                });
            }
            Waited::Cancelled => {
                terminate(&mut child, &invocation.label).await;
                log::info!("Terminated {} (cancelled)", invocation.label);
                return Err(Error::Cancelled);
            }
            Waited::TimedOut => {
                terminate(&mut child, &invocation.label).await;
                log::warn!(
                    "{} timed out after {}s, terminated",
                    invocation.label,
                    timeout.as_secs()
                );
                let diagnostics = tokio::time::timeout(PIPE_GRACE, stderr)
                    .await
                    .ok()
                    .and_then(|joined| joined.ok())
                    .unwrap_or_default();
                return Err(Error::ExternalToolFailure {
                    tool: invocation.label.clone(),
                    reason: format!("timed out after {}s", timeout.as_secs()),
                    diagnostics,
                });
            }
        };

        let stdout = stdout.await.unwrap_or_default();
        let stderr = stderr.await.unwrap_or_default();

        if !status.success() {
            let reason = match status.code() {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            };
            let diagnostics = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(Error::ExternalToolFailure {
                tool: invocation.label.clone(),
                reason,
                diagnostics,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

async fn terminate(child: &mut tokio::process::Child, label: &str) {
    if let Err(e) = child.kill().await {
        log::warn!("Failed to kill {}: {}", label, e);
    }
    let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
}

async fn read_to_string<R>(stream: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            log::debug!("Failed to read tool output: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
