//! Response parser — raw model text into a structured [`AgentStep`].
//!
//! The primary format is flag-delimited so that regular-expression
//! strings, JSON fragments, and multi-line source code can ride inside
//! `<CONTENT>` without escape games:
//!
//! ```text
//! <THOUGHT>
//! free text
//! <TOOL>
//! tool name
//! <PARAMS>
//! {"param": "value"}
//! <CONTENT>
//! raw multi-line payload
//! <END>
//! ```
//!
//! The parser is tolerant: a missing `<THOUGHT>` is recovered from the
//! text preceding `<TOOL>` (or synthesised empty), `<PARAMS>` defaults to
//! `{}`, `<CONTENT>` is optional. When the flag format cannot be
//! recognised at all, a JSON fallback is attempted: a single top-level
//! object with fields `thought`, `tool`, `params`, `content?`. Only when
//! neither path yields a tool name does parsing fail.

use hearth_core::error::ParseError;
use hearth_core::markers::{CONTENT_TAG, END_TAG, PARAMS_TAG, THOUGHT_TAG, TOOL_TAG};
use hearth_core::step::AgentStep;
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Parse a raw model response, trying the flag format first and the JSON
/// fallback second.
pub fn parse_response(response: &str) -> Result<AgentStep, ParseError> {
    match parse_flagged(response) {
        Ok(step) => {
            debug!(tool = %step.tool, "flag format recognised");
            Ok(step)
        }
        Err(flag_err) => match parse_json_fallback(response) {
            Ok(step) => {
                debug!(tool = %step.tool, "JSON fallback recognised");
                Ok(step)
            }
            Err(_) => {
                let snippet: String = response.chars().take(200).collect();
                warn!(snippet = %snippet, "unparseable response");
                Err(flag_err)
            }
        },
    }
}

/// Parse the flag-delimited primary format.
pub fn parse_flagged(response: &str) -> Result<AgentStep, ParseError> {
    let tool_pos = match response.find(TOOL_TAG) {
        Some(p) => p,
        None => return Err(ParseError::NoToolName),
    };

    // Tool name: text after <TOOL> up to the next tag opener (or end).
    let after_tool = &response[tool_pos + TOOL_TAG.len()..];
    let tool_end = after_tool.find('<').unwrap_or(after_tool.len());
    let tool = after_tool[..tool_end].trim().to_string();
    if tool.is_empty() {
        return Err(ParseError::NoToolName);
    }

    // Thought: the <THOUGHT> block, or whatever precedes <TOOL>.
    let thought = match response.find(THOUGHT_TAG) {
        Some(t_pos) if t_pos < tool_pos => {
            response[t_pos + THOUGHT_TAG.len()..tool_pos].trim().to_string()
        }
        _ => response[..tool_pos].trim().to_string(),
    };

    // Params: a JSON object after <PARAMS>, defaulting to {}.
    let params = match response.find(PARAMS_TAG) {
        Some(p_pos) => {
            let after = &response[p_pos + PARAMS_TAG.len()..];
            match scan_json_object(after) {
                Some(json) => match serde_json::from_str::<Value>(json) {
                    Ok(Value::Object(map)) => map,
                    Ok(_) => return Err(ParseError::BadParams("not a JSON object".into())),
                    Err(e) => return Err(ParseError::BadParams(e.to_string())),
                },
                None => {
                    warn!(tool = %tool, "<PARAMS> block has no JSON object, defaulting to {{}}");
                    Map::new()
                }
            }
        }
        None => {
            warn!(tool = %tool, "<PARAMS> block missing, defaulting to {{}}");
            Map::new()
        }
    };

    // Content: verbatim between <CONTENT> and <END>. A single newline
    // right after the tag is the block separator, not payload; everything
    // else — leading spaces, interior newlines — is preserved.
    let content = response.find(CONTENT_TAG).and_then(|c_pos| {
        let after = &response[c_pos + CONTENT_TAG.len()..];
        let after = after.strip_prefix('\n').unwrap_or(after);
        after.find(END_TAG).map(|end| after[..end].to_string())
    });

    Ok(AgentStep {
        thought,
        tool,
        params,
        content,
    })
}

/// Parse the JSON fallback: a single top-level object with fields
/// `thought`, `tool`, `params`, `content?`. The object may be bare, inside
/// a fenced ```json block, or embedded in surrounding prose (located by
/// brace balance). Legacy field spellings (`tool_name`, `parameters`, a
/// nested `action` object) are accepted.
pub fn parse_json_fallback(response: &str) -> Result<AgentStep, ParseError> {
    let candidates = json_candidates(response);

    for candidate in candidates {
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(&candidate) else {
            continue;
        };
        if let Some(step) = step_from_object(&obj) {
            return Ok(step);
        }
    }

    Err(ParseError::NoToolName)
}

/// Serialise a step back into the canonical flag form, the inverse of
/// [`parse_flagged`]: `parse(emit(s)) ≡ s`.
pub fn emit(step: &AgentStep) -> String {
    let mut out = String::new();
    out.push_str(THOUGHT_TAG);
    out.push('\n');
    out.push_str(&step.thought);
    out.push('\n');
    out.push_str(TOOL_TAG);
    out.push('\n');
    out.push_str(&step.tool);
    out.push('\n');
    out.push_str(PARAMS_TAG);
    out.push('\n');
    out.push_str(&Value::Object(step.params.clone()).to_string());
    out.push('\n');
    if let Some(content) = &step.content {
        out.push_str(CONTENT_TAG);
        out.push('\n');
        out.push_str(content);
    }
    out.push_str(END_TAG);
    out
}

fn json_candidates(response: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    let trimmed = response.trim();
    if trimmed.starts_with('{') {
        candidates.push(trimmed.to_string());
    }

    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"```(?:json)?").unwrap());
    if let Some(m) = fence.find(response) {
        let after = &response[m.end()..];
        if let Some(json) = scan_json_object(after) {
            candidates.push(json.to_string());
        }
    }

    if let Some(json) = scan_json_object(response) {
        candidates.push(json.to_string());
    }

    candidates
}

fn step_from_object(obj: &Map<String, Value>) -> Option<AgentStep> {
    let thought = obj
        .get("thought")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let (tool, params_value) = if let Some(action) = obj.get("action").and_then(|v| v.as_object()) {
        (
            action.get("tool_name").or_else(|| action.get("tool")),
            action.get("parameters").or_else(|| action.get("params")),
        )
    } else {
        (
            obj.get("tool").or_else(|| obj.get("tool_name")),
            obj.get("params").or_else(|| obj.get("parameters")),
        )
    };

    let tool = tool?.as_str()?.trim().to_string();
    if tool.is_empty() {
        return None;
    }

    let params = match params_value {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    let content = obj
        .get("content")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Some(AgentStep {
        thought,
        tool,
        params,
        content,
    })
}

/// Find the first balanced JSON object in `text`, honouring string
/// literals and escapes so nested braces inside values do not confuse the
/// scan.
fn scan_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
