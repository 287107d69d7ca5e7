//! Static code structure analysis without execution.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use serde_json::Value;

use crate::file_read::url_guidance;

const SUPPORTED_EXTENSIONS: [&str; 2] = [".py", ".rs"];

pub struct AnalyzeCodeTool;

#[async_trait]
impl Tool for AnalyzeCodeTool {
    fn name(&self) -> &str {
        "analyze_code"
    }

    fn description(&self) -> &str {
        "Report the structure of a LOCAL Python or Rust source file without running it: imports, functions, and types with line numbers."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Local path to a .py or .rs file (not a URL)"
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
        if !SUPPORTED_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return Ok(Observation::fail(format!(
                "'{path}' is not a supported source file; analyze_code handles .py and .rs only"
            )));
        }

        let source = match tokio::fs::read_to_string(path).await {
            Ok(s) => s,
            Err(e) => return Ok(Observation::fail(format!("could not read '{path}': {e}"))),
        };

        Ok(Observation::text(analyze(path, &source)))
    }
}

fn analyze(path: &str, source: &str) -> String {
    let mut imports = Vec::new();
    let mut functions = Vec::new();
    let mut types = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let lineno = idx + 1;
        let trimmed = line.trim_start();

        if trimmed.starts_with("import ")
            || trimmed.starts_with("from ")
            || trimmed.starts_with("use ")
            || trimmed.starts_with("pub use ")
        {
            imports.push(format!("  - {} (line {lineno})", trimmed.trim_end()));
        } else if trimmed.starts_with("def ")
            || trimmed.starts_with("async def ")
            || trimmed.starts_with("fn ")
            || trimmed.starts_with("pub fn ")
            || trimmed.starts_with("async fn ")
            || trimmed.starts_with("pub async fn ")
        {
            let signature = trimmed.split('{').next().unwrap_or(trimmed).trim_end();
            let signature = signature.trim_end_matches(':');
            functions.push(format!("  - {signature} (line {lineno})"));
        } else if trimmed.starts_with("class ")
            || trimmed.starts_with("struct ")
            || trimmed.starts_with("pub struct ")
            || trimmed.starts_with("enum ")
            || trimmed.starts_with("pub enum ")
            || trimmed.starts_with("trait ")
            || trimmed.starts_with("pub trait ")
            || trimmed.starts_with("impl ")
        {
            let head = trimmed
                .split(|c| c == '{' || c == '(')
                .next()
                .unwrap_or(trimmed)
                .trim_end()
                .trim_end_matches(':');
            types.push(format!("  - {head} (line {lineno})"));
        }
    }

    let mut report = vec![format!("Structure of {path}:")];
    if !imports.is_empty() {
        report.push(format!("Imports ({}):", imports.len()));
        report.extend(imports.iter().take(15).cloned());
        if imports.len() > 15 {
            report.push(format!("  … and {} more", imports.len() - 15));
        }
    }
    if !types.is_empty() {
        report.push(format!("Types ({}):", types.len()));
        report.extend(types);
    }
    if !functions.is_empty() {
        report.push(format!("Functions ({}):", functions.len()));
        report.extend(functions);
    }
    report.push(format!("Total: {} lines", source.lines().count()));
    report.join("\n")
}
