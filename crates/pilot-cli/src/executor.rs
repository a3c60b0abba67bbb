use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use pilot::errors::{AgentError, AgentResult};
use pilot::tools::{ToolExecutor, ToolOutput};
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs the `bash` tool on the local machine. Each command gets a fresh shell, so
/// `restart` has nothing to reset. Screen and editor tools need a desktop executor and
/// are reported back to the model as unsupported.
pub struct ShellExecutor {
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn bash(&self, input: &Value) -> AgentResult<ToolOutput> {
        if input.get("restart").and_then(Value::as_bool) == Some(true) {
            return Ok(ToolOutput::default().with_system("tool has been restarted."));
        }
        let command = input
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::InvalidParameters("no command provided.".to_string()))?;

        debug!(command, "running bash command");
        let child = Command::new("bash")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                AgentError::ExecutionError(format!(
                    "timed out: bash has not returned in {} seconds and must be restarted",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        let combined = [stdout, stderr]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if output.status.success() {
            Ok(ToolOutput::output(combined))
        } else {
            let status = match output.status.code() {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            };
            let error = if combined.is_empty() {
                status
            } else {
                format!("{}\n{}", combined, status)
            };
            Ok(ToolOutput::failure(error))
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl ToolExecutor for ShellExecutor {
    async fn execute(&self, name: &str, input: &Value) -> AgentResult<ToolOutput> {
        match name {
            "bash" => self.bash(input).await,
            other => Err(AgentError::ExecutionError(format!(
                "{} is not available in a terminal session, use bash instead",
                other
            ))),
        }
    }
}
