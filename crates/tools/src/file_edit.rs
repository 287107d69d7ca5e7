//! Targeted file edits: string replacement and line-range replacement.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use serde_json::Value;
use std::path::Path;

/// Replace every occurrence of a string in a file.
pub struct ReplaceInFileTool;

#[async_trait]
impl Tool for ReplaceInFileTool {
    fn name(&self) -> &str {
        "replace_in_file"
    }

    fn description(&self) -> &str {
        "Find and replace all occurrences of 'old_string' with 'new_string' in a file. Use for targeted code edits."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path of the file to modify" },
                "old_string": { "type": "string", "description": "String to replace" },
                "new_string": { "type": "string", "description": "Replacement string" }
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Write
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let path = require_str(&params, "file_path")?;
        let old_string = require_str(&params, "old_string")?;
        let new_string = require_str(&params, "new_string")?;

        if !Path::new(path).is_file() {
            return Ok(Observation::fail(format!("file '{path}' not found")));
        }

        let original = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => return Ok(Observation::fail(format!("could not read '{path}': {e}"))),
        };

        if !original.contains(old_string) {
            return Ok(Observation::text(format!(
                "string not found in '{path}'; file unchanged"
            )));
        }

        let occurrences = original.matches(old_string).count();
        let updated = original.replace(old_string, new_string);
        match tokio::fs::write(path, updated).await {
            Ok(()) => Ok(Observation::text(format!(
                "replaced {occurrences} occurrence(s) in '{path}'"
            ))),
            Err(e) => Ok(Observation::fail(format!("could not write '{path}': {e}"))),
        }
    }
}

/// Replace a 1-based inclusive line range with new content.
pub struct EditFileAtLineTool;

#[async_trait]
impl Tool for EditFileAtLineTool {
    fn name(&self) -> &str {
        "edit_file_at_line"
    }

    fn description(&self) -> &str {
        "Replace lines start_line..=end_line (1-based, inclusive) of a file with new content from the <CONTENT> block."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path of the file to edit" },
                "start_line": { "type": "integer", "description": "First line to replace (1-based)" },
                "end_line": { "type": "integer", "description": "Last line to replace (inclusive)" },
                "content": { "type": "string", "description": "Replacement content" }
            },
            "required": ["file_path", "start_line", "end_line"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Write
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let path = require_str(&params, "file_path")?;
        let start_line = params["start_line"]
            .as_u64()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'start_line'".into()))?
            as usize;
        let end_line = params["end_line"]
            .as_u64()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'end_line'".into()))?
            as usize;
        let mut content = params["content"].as_str().unwrap_or_default().to_string();

        let original = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => return Ok(Observation::fail(format!("could not read '{path}': {e}"))),
        };
        let lines: Vec<&str> = original.lines().collect();
        let total = lines.len();

        if start_line < 1 || end_line < 1 {
            return Ok(Observation::fail(format!(
                "line numbers are 1-based; got start={start_line}, end={end_line}"
            )));
        }
        if start_line > end_line {
            return Ok(Observation::fail(format!(
                "start_line ({start_line}) is after end_line ({end_line})"
            )));
        }
        if start_line > total {
            return Ok(Observation::fail(format!(
                "start_line ({start_line}) is beyond the file's {total} lines"
            )));
        }
        let end_line = end_line.min(total);

        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }

        let mut updated = String::new();
        for line in &lines[..start_line - 1] {
            updated.push_str(line);
            updated.push('\n');
        }
        updated.push_str(&content);
        for line in &lines[end_line..] {
            updated.push_str(line);
            updated.push('\n');
        }

        match tokio::fs::write(path, updated).await {
            Ok(()) => Ok(Observation::text(format!(
                "replaced lines {start_line}-{end_line} ({} lines) in '{path}'",
                end_line - start_line + 1
            ))),
            Err(e) => Ok(Observation::fail(format!("could not write '{path}': {e}"))),
        }
    }
}

fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    params[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{key}'")))
}
