//! File creation and overwrite tools.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use serde_json::Value;
use std::path::Path;

/// Create a new file; refuses to clobber an existing one.
pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create a new text file. Fails if the file already exists. Put the file body in a <CONTENT> block."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to create"
                },
                "content": {
                    "type": "string",
                    "description": "Initial file contents"
                }
            },
            "required": ["file_path"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Write
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let path = params["file_path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'file_path'".into()))?;
        let content = params["content"].as_str().unwrap_or_default();

        if Path::new(path).exists() {
            return Ok(Observation::fail(format!(
                "file '{path}' already exists; use write_file to overwrite or replace_in_file to edit"
            )));
        }

        if let Err(e) = ensure_parent(path).await {
            return Ok(Observation::fail(e));
        }
        match tokio::fs::write(path, content).await {
            Ok(()) => Ok(Observation::text(format!("file created at '{path}'"))),
            Err(e) => Ok(Observation::fail(format!("could not create '{path}': {e}"))),
        }
    }
}

/// Write (create or fully overwrite) a file.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write or fully overwrite a text file. Put the file body in a <CONTENT> block."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "Full file contents"
                }
            },
            "required": ["file_path"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Write
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let path = params["file_path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'file_path'".into()))?;
        let content = params["content"].as_str().unwrap_or_default();

        if let Err(e) = ensure_parent(path).await {
            return Ok(Observation::fail(e));
        }
        match tokio::fs::write(path, content).await {
            Ok(()) => Ok(Observation::text(format!("file written at '{path}'"))),
            Err(e) => Ok(Observation::fail(format!("could not write '{path}': {e}"))),
        }
    }
}

async fn ensure_parent(path: &str) -> Result<(), String> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("could not create parent directories for '{path}': {e}"))?;
        }
    }
    Ok(())
}
