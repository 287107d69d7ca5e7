//! Directory listing tool.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use serde_json::Value;

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the files and directories at a path, one entry per line."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: current directory)"
                }
            }
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Read
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let path = params["path"].as_str().unwrap_or(".");

        let mut dir = match tokio::fs::read_dir(path).await {
            Ok(d) => d,
            Err(e) => {
                return Ok(Observation::fail(format!(
                    "could not list directory '{path}': {e}"
                )))
            }
        };

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(Observation::text("directory is empty"));
        }
        Ok(Observation::text(entries.join("\n")))
    }
}
