//! `run_code` — approval-gated code execution (spec.md §4.5): writes the
//! snippet to a crypto-random-named, owner-only temp file, runs it under the
//! requested language's interpreter, and removes the file on completion
//! (success, failure, or timeout) regardless of outcome.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::domain::ToolDefinition;
use crate::error::AgentError;
use crate::tools::{Tool, ToolCallContext};

/// Default wall-clock bound (spec.md §4.5 "≤5 min code", §5 default
/// "subprocess code 60 s").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const ENV_WHITELIST: &[&str] = &["PATH", "LANG", "HOME", "TMPDIR"];

fn sanitized_env() -> Vec<(String, String)> {
    ENV_WHITELIST
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
        .collect()
}

fn interpreter_for(language: &str) -> Result<(&'static str, &'static str), AgentError> {
    match language {
        "python" | "python3" => Ok(("python3", ".py")),
        "javascript" | "node" => Ok(("node", ".js")),
        "bash" | "sh" => Ok(("bash", ".sh")),
        other => Err(AgentError::ValidationError(format!(
            "unsupported language: {other}"
        ))),
    }
}

pub struct RunCode;

#[async_trait]
impl Tool for RunCode {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::mutating(
            "run_code",
            "Executes a code snippet in an isolated temp file under the requested language's interpreter.",
            json!({
                "type": "object",
                "properties": {
                    "language": {"type": "string", "enum": ["python", "javascript", "bash"]},
                    "code": {"type": "string"}
                },
                "required": ["language", "code"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        if !ctx.permissions.code_execution {
            return Err(AgentError::PermissionDenied("codeExecution".into()));
        }
        let language = params
            .get("language")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing language".into()))?;
        let code = params
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing code".into()))?;
        let (interpreter, suffix) = interpreter_for(language)?;

        let mut file = tempfile::Builder::new()
            .prefix("optimaizer-code-")
            .suffix(suffix)
            .tempfile()
            .map_err(|e| AgentError::Internal(format!("failed to create temp file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = file
                .as_file()
                .metadata()
                .map_err(|e| AgentError::Internal(e.to_string()))?
                .permissions();
            perms.set_mode(0o600);
            file.as_file()
                .set_permissions(perms)
                .map_err(|e| AgentError::Internal(e.to_string()))?;
        }

        file.write_all(code.as_bytes())
            .map_err(|e| AgentError::Internal(format!("failed to write temp file: {e}")))?;
        file.flush()
            .map_err(|e| AgentError::Internal(format!("failed to flush temp file: {e}")))?;
        let path = file.path().to_path_buf();

        let mut cmd = Command::new(interpreter);
        cmd.arg(&path)
            .env_clear()
            .envs(sanitized_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .map_err(|e| AgentError::ExternalError(format!("failed to spawn {interpreter}: {e}")));

        // `file` (and with it the temp path) is removed on drop regardless
        // of which branch below returns.
        let result = match child {
            Ok(child) => match tokio::time::timeout(DEFAULT_TIMEOUT, child.wait_with_output()).await {
                Ok(Ok(output)) => Ok(json!({
                    "exitCode": output.status.code(),
                    "stdout": String::from_utf8_lossy(&output.stdout),
                    "stderr": String::from_utf8_lossy(&output.stderr),
                })),
                Ok(Err(e)) => Err(AgentError::ExternalError(format!("subprocess error: {e}"))),
                Err(_) => Err(AgentError::ExternalError("code execution timed out after 60s".into())),
            },
            Err(e) => Err(e),
        };

        drop(file);
        result
    }
}
