//! File read tool.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use serde_json::Value;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read and return the full contents of a LOCAL text file. Not for URLs — use web_fetch or web_search_in_page for web pages."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Local path to the file (not a URL)"
                }
            },
            "required": ["file_path"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Read
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let path = params["file_path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'file_path'".into()))?;

        if let Some(guidance) = url_guidance(path) {
            return Ok(Observation::fail(guidance));
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Observation::text(content)),
            Err(e) => Ok(Observation::fail(format!(
                "could not read file '{path}': {e}"
            ))),
        }
    }
}

/// Guidance returned when a web URL is handed to a local-file tool.
pub(crate) fn url_guidance(path: &str) -> Option<String> {
    let is_url = ["http://", "https://", "ftp://"]
        .iter()
        .any(|p| path.starts_with(p));
    if !is_url {
        return None;
    }
    Some(format!(
        "'{path}' is a URL, and this tool reads only local files. For web pages use: \
web_search_in_page(url, query) to find specific information, web_get_structure(url) \
for an outline, or web_fetch(url) for small pages."
    ))
}
