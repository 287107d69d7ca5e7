//! AgentStep and Observation — the structured forms of one ReAct cycle.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One parsed model response: a thought, a chosen tool, its parameters,
/// and an optional raw-text payload for tools that accept free-form bodies
/// (file writes, long strings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub thought: String,

    /// Name of the tool to invoke.
    pub tool: String,

    /// Parameters as a JSON object.
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Raw multi-line payload from a `<CONTENT>` block, preserved verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl AgentStep {
    /// The parameters actually dispatched: `params`, with `content` merged
    /// in under the `"content"` key when present. A `<CONTENT>` block wins
    /// over a `content` entry in `<PARAMS>`.
    pub fn dispatch_params(&self) -> Value {
        let mut params = self.params.clone();
        if let Some(content) = &self.content {
            params.insert("content".into(), Value::String(content.clone()));
        }
        Value::Object(params)
    }
}

/// The structured report of a tool call's outcome. Consumed by the loop
/// and appended to history as a `tool`-role message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Whether the tool succeeded.
    pub ok: bool,

    /// Human/model-readable result summary.
    pub summary: String,

    /// Optional raw payload or machine tag (e.g. `"timeout"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Observation {
    /// A successful observation from a plain result string.
    pub fn text(summary: impl Into<String>) -> Self {
        Self {
            ok: true,
            summary: summary.into(),
            raw: None,
        }
    }

    /// A failed observation.
    pub fn fail(summary: impl Into<String>) -> Self {
        Self {
            ok: false,
            summary: summary.into(),
            raw: None,
        }
    }

    /// A failed observation tagged as a timeout.
    pub fn timeout(tool_name: &str, timeout_secs: u64) -> Self {
        Self {
            ok: false,
            summary: format!("tool '{tool_name}' timed out after {timeout_secs}s"),
            raw: Some("timeout".into()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.raw.as_deref() == Some("timeout")
    }

    /// Render for the model as an observation line.
    pub fn render(&self, tool_name: &str) -> String {
        if self.ok {
            format!("Observation: result of tool '{tool_name}':\n{}", self.summary)
        } else {
            format!("Observation: tool '{tool_name}' FAILED:\n{}", self.summary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_params_merges_content() {
        let mut params = Map::new();
        params.insert("file_path".into(), Value::String("hello.py".into()));
        let step = AgentStep {
            thought: "create the file".into(),
            tool: "create_file".into(),
            params,
            content: Some("def greet():\n    pass\n".into()),
        };
        let merged = step.dispatch_params();
        assert_eq!(merged["file_path"], "hello.py");
        assert!(merged["content"].as_str().unwrap().contains("def greet"));
    }

    #[test]
    fn content_block_wins_over_params_content() {
        let mut params = Map::new();
        params.insert("content".into(), Value::String("from params".into()));
        let step = AgentStep {
            thought: String::new(),
            tool: "create_file".into(),
            params,
            content: Some("from block".into()),
        };
        assert_eq!(step.dispatch_params()["content"], "from block");
    }

    #[test]
    fn timeout_observation_is_tagged() {
        let obs = Observation::timeout("web_fetch", 30);
        assert!(!obs.ok);
        assert!(obs.is_timeout());
        assert!(obs.summary.contains("web_fetch"));
    }

    #[test]
    fn render_marks_failures() {
        let ok = Observation::text("done").render("read_file");
        let bad = Observation::fail("no such file").render("read_file");
        assert!(ok.contains("result of tool 'read_file'"));
        assert!(bad.contains("FAILED"));
    }
}
