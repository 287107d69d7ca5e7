//! Shell tool — execute system commands with an allowlist and timeout.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct ShellTool {
    /// If non-empty, only these base commands are allowed.
    allowed_commands: Vec<String>,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self { allowed_commands }
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }
        let base = command.split_whitespace().next().unwrap_or("").trim();
        self.allowed_commands.iter().any(|a| a == base)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "run_shell_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its exit code, stdout, and stderr. Use for builds, tests, git. Not for reading or writing files."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute"
                }
            },
            "required": ["command"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Exec
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let command = params["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'command'".into()))?;

        if !self.is_command_allowed(command) {
            let base = command.split_whitespace().next().unwrap_or("");
            warn!(command = %command, "command not in allowlist");
            return Ok(Observation::fail(format!(
                "command '{base}' is not in the allowlist"
            )));
        }

        debug!(command = %command, "executing shell command");
        let output = Command::new("sh").args(["-c", command]).output().await;

        match output {
            Ok(output) => {
                let code = output.status.code().unwrap_or(-1);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                let mut report = format!("Exit Code: {code}");
                if !stdout.trim().is_empty() {
                    report.push_str(&format!("\n--- STDOUT ---\n{}", stdout.trim_end()));
                }
                if !stderr.trim().is_empty() {
                    report.push_str(&format!("\n--- STDERR ---\n{}", stderr.trim_end()));
                }

                if output.status.success() {
                    Ok(Observation::text(report))
                } else {
                    Ok(Observation::fail(report))
                }
            }
            Err(e) => Ok(Observation::fail(format!(
                "could not spawn command: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_check() {
        let tool = ShellTool::new(vec!["ls".into(), "git".into()]);
        assert!(tool.is_command_allowed("ls -la"));
        assert!(tool.is_command_allowed("git status"));
        assert!(!tool.is_command_allowed("rm -rf /"));
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let tool = ShellTool::new(vec![]);
        assert!(tool.is_command_allowed("anything goes"));
    }

    #[tokio::test]
    async fn echo_reports_exit_code_and_stdout() {
        let tool = ShellTool::new(vec![]);
        let obs = tool
            .execute(serde_json::json!({"command": "echo hearth"}))
            .await
            .unwrap();
        assert!(obs.ok);
        assert!(obs.summary.contains("Exit Code: 0"));
        assert!(obs.summary.contains("hearth"));
    }

    #[tokio::test]
    async fn failing_command_is_failed_observation() {
        let tool = ShellTool::new(vec![]);
        let obs = tool
            .execute(serde_json::json!({"command": "exit 3"}))
            .await
            .unwrap();
        assert!(!obs.ok);
        assert!(obs.summary.contains("Exit Code: 3"));
    }

    #[tokio::test]
    async fn blocked_command_refused() {
        let tool = ShellTool::new(vec!["ls".into()]);
        let obs = tool
            .execute(serde_json::json!({"command": "rm -rf /"}))
            .await
            .unwrap();
        assert!(!obs.ok);
        assert!(obs.summary.contains("allowlist"));
    }
}
