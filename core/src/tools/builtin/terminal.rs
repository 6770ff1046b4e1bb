//! `run_terminal_command` — approval-gated subprocess execution (spec.md
//! §4.5). Static validation happens inline in `call`; the approval prompt
//! itself is the engine's responsibility ([`crate::approval::ApprovalGate`])
//! since it must happen *before* this tool is ever dispatched — by the time
//! `call` runs, approval has already been granted.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::approval::validator;
use crate::domain::ToolDefinition;
use crate::error::AgentError;
use crate::tools::{Tool, ToolCallContext};

/// Subprocess env is a minimal whitelist (spec.md §4.5); everything else the
/// parent process has is not forwarded.
const ENV_WHITELIST: &[&str] = &["PATH", "LANG", "HOME", "TMPDIR"];

/// Output cap past which stdout/stderr are truncated (spec.md §4.5 "output
/// is truncated past a size cap").
pub const MAX_OUTPUT_BYTES: usize = 16 * 1024;

/// Default wall-clock bound (spec.md §4.5 "≤2 min terminal", §5 default
/// "subprocess terminal 30 s").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn sanitized_env() -> Vec<(String, String)> {
    ENV_WHITELIST
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
        .collect()
}

fn truncate(bytes: Vec<u8>) -> String {
    let mut s = String::from_utf8_lossy(&bytes).into_owned();
    if s.len() > MAX_OUTPUT_BYTES {
        s.truncate(MAX_OUTPUT_BYTES);
        s.push_str("\n...[truncated]");
    }
    s
}

pub struct RunTerminalCommand;

#[async_trait]
impl Tool for RunTerminalCommand {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::mutating(
            "run_terminal_command",
            "Runs a single shell command and returns its stdout/stderr/exit code. Destructive or privileged commands are rejected before execution.",
            json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "reason": {"type": "string"}
                },
                "required": ["command"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        if !ctx.permissions.terminal_access {
            return Err(AgentError::PermissionDenied("terminalAccess".into()));
        }
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing command".into()))?;

        if validator::is_blocked(command) {
            return Err(AgentError::PermissionDenied(format!(
                "command rejected by static validation: {command}"
            )));
        }

        let parts = shell_words::split(command)
            .map_err(|e| AgentError::ValidationError(format!("unparsable command: {e}")))?;
        let (program, args) = parts
            .split_first()
            .ok_or_else(|| AgentError::ValidationError("empty command".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .env_clear()
            .envs(sanitized_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .map_err(|e| AgentError::ExternalError(format!("failed to spawn: {e}")))?;

        let output = match tokio::time::timeout(DEFAULT_TIMEOUT, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(AgentError::ExternalError(format!("subprocess error: {e}"))),
            Err(_) => {
                return Err(AgentError::ExternalError(
                    "command timed out after 30s".into(),
                ))
            }
        };

        Ok(json!({
            "exitCode": output.status.code(),
            "stdout": truncate(output.stdout),
            "stderr": truncate(output.stderr),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Permissions;

    fn ctx() -> ToolCallContext {
        ToolCallContext::new("u1", "a1").with_permissions(Permissions {
            terminal_access: true,
            ..Permissions::default()
        })
    }

    #[tokio::test]
    async fn runs_a_benign_command() {
        let result = RunTerminalCommand
            .call(json!({"command": "echo hello"}), &ctx())
            .await
            .unwrap();
        assert_eq!(result["exitCode"], json!(0));
        assert!(result["stdout"].as_str().unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn rejects_destructive_command_without_spawning() {
        let err = RunTerminalCommand
            .call(json!({"command": "rm -rf / --no-preserve-root"}), &ctx())
            .await;
        assert!(matches!(err, Err(AgentError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn without_permission_the_call_is_denied() {
        let err = RunTerminalCommand
            .call(json!({"command": "echo hi"}), &ToolCallContext::new("u1", "a1"))
            .await;
        assert!(matches!(err, Err(AgentError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn nonzero_exit_is_still_a_success_result() {
        let result = RunTerminalCommand
            .call(json!({"command": "false"}), &ctx())
            .await
            .unwrap();
        assert_eq!(result["exitCode"], json!(1));
    }
}
