//! CLI agent subprocess runner
//!
//! One invocation = one subprocess, owned start to finish by [`CliRunner::
//! send`]. Two quirks here are load-bearing and must not be simplified away:
//!
//! - stdout is redirected into a fresh temp file, not a pipe. Large JSON
//!   payloads have been observed truncated when read from a pipe;
//! - the child is spawned into its own process group so parallel reviewer
//!   instances never share a controlling terminal, and so a timeout can kill
//!   the whole group, not just the direct child.
//!
//! Whatever happens, no subprocess, temp file, or file descriptor outlives
//! the call.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::agents::adapters::{AgentConfig, AgentKind};
use crate::agents::{mock, parser};
use crate::error::AgentError;

const STDERR_EXCERPT_LIMIT: usize = 500;

/// Invokes one agent and returns the extracted text.
///
/// The trait seam lets workflow tests script agent behavior without
/// subprocesses; [`CliRunner`] is the production implementation.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Run the agent with a hard deadline, returning the extracted text.
    async fn invoke(
        &self,
        agent: &AgentConfig,
        prompt: &str,
        timeout_seconds: u64,
    ) -> Result<String, AgentError>;
}

/// How the child process finished waiting.
enum WaitOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Production subprocess runner.
#[derive(Debug, Clone, Default)]
pub struct CliRunner;

impl CliRunner {
    pub fn new() -> Self {
        Self
    }

    /// Invoke with the agent's configured timeout.
    pub async fn send(&self, agent: &AgentConfig, prompt: &str) -> Result<String, AgentError> {
        self.invoke(agent, prompt, agent.timeout_seconds).await
    }

    /// Invoke with an external cancellation signal. Cancellation behaves
    /// exactly like a timeout: group kill, cleanup, `Cancelled`.
    pub async fn send_cancellable(
        &self,
        agent: &AgentConfig,
        prompt: &str,
        timeout_seconds: u64,
        cancel: oneshot::Receiver<()>,
    ) -> Result<String, AgentError> {
        self.execute(agent, prompt, timeout_seconds, Some(cancel))
            .await
    }

    async fn execute(
        &self,
        agent: &AgentConfig,
        prompt: &str,
        timeout_seconds: u64,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> Result<String, AgentError> {
        if agent.kind == AgentKind::Mock {
            return mock::respond(agent, prompt).await;
        }

        info!(
            agent = %agent.name,
            kind = %agent.kind,
            prompt_len = prompt.len(),
            timeout_seconds,
            "sending prompt to agent"
        );

        // Fresh capture file per call; removed when `capture` drops.
        let capture = tempfile::NamedTempFile::new()?;
        let stdout_file = capture.reopen()?;

        let argv = agent.build_argv(prompt);
        let mut command = Command::new(&agent.cli_path);
        command
            .args(&argv)
            .current_dir(&agent.workspace_path)
            .stdin(if agent.prompt_via_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;
        let pid = child.id();

        if agent.prompt_via_stdin {
            if let Some(mut stdin) = child.stdin.take() {
                debug!(agent = %agent.name, bytes = prompt.len(), "writing prompt to stdin");
                stdin.write_all(prompt.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            // stdin handle dropped here; the child sees EOF
        }

        // Drain stderr concurrently so a chatty child never blocks on a
        // full pipe while we wait for exit.
        let stderr_task = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                use tokio::io::AsyncReadExt;
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });

        let cancel_fut = async {
            match cancel {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => std::future::pending().await,
            }
        };

        // Arms only produce an outcome; the child is touched again after the
        // select!, once the wait future has been dropped.
        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = tokio::time::sleep(Duration::from_secs(timeout_seconds)) => WaitOutcome::TimedOut,
            _ = cancel_fut => WaitOutcome::Cancelled,
        };

        let status = match outcome {
            WaitOutcome::Exited(status) => status?,
            WaitOutcome::TimedOut => {
                warn!(agent = %agent.name, timeout_seconds, "agent timed out, killing process group");
                kill_process_group(pid);
                let _ = child.kill().await;
                return Err(AgentError::Timeout {
                    seconds: timeout_seconds,
                });
            }
            WaitOutcome::Cancelled => {
                warn!(agent = %agent.name, "agent invocation cancelled, killing process group");
                kill_process_group(pid);
                let _ = child.kill().await;
                return Err(AgentError::Cancelled);
            }
        };

        let stderr_bytes = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };
        let stderr = String::from_utf8_lossy(&stderr_bytes);
        if !stderr.trim().is_empty() {
            warn!(agent = %agent.name, stderr = %excerpt(&stderr), "agent wrote to stderr");
        }

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            return Err(AgentError::NonzeroExit {
                code,
                stderr: excerpt(&stderr),
            });
        }

        let stdout = tokio::fs::read_to_string(capture.path()).await?;
        debug!(agent = %agent.name, stdout_len = stdout.len(), "agent process completed");

        if stdout.trim().is_empty() {
            return Err(AgentError::EmptyOutput);
        }

        let text =
            parser::parse_and_extract_hinted(&stdout, agent.kind.content_hint())?;
        info!(agent = %agent.name, response_len = text.len(), "agent response extracted");
        Ok(text)
    }
}

#[async_trait]
impl AgentInvoker for CliRunner {
    async fn invoke(
        &self,
        agent: &AgentConfig,
        prompt: &str,
        timeout_seconds: u64,
    ) -> Result<String, AgentError> {
        self.execute(agent, prompt, timeout_seconds, None).await
    }
}

/// Kill the child's whole process group. The group exists because the child
/// was spawned with `process_group(0)`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // Negative pid addresses the group.
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_EXCERPT_LIMIT {
        trimmed.to_string()
    } else {
        let mut end = STDERR_EXCERPT_LIMIT;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        trimmed[..end].to_string()
    }
}
