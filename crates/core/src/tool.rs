//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world: read and
//! write files, run shell commands, search the web, manage memory. Each
//! tool declares a JSON-schema for its parameters and a side-effect class
//! that drives loop-protection in the agent loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ToolError;
use crate::step::Observation;

/// Default per-tool execution timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Coarse classification of what a tool touches. The loop uses this for
/// duplicate-call protection (`Network`) and termination (`Finish`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectClass {
    Read,
    Write,
    Exec,
    Network,
    Memory,
    Finish,
}

/// A tool definition as presented to the model inside the system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The core Tool trait.
///
/// Handlers either return an [`Observation`] directly or fail with a
/// [`ToolError`]; the registry folds errors into failed observations so
/// that nothing escapes the dispatch boundary. Handlers must wrap their
/// own internal failures — the loop never catches tool panics.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. `read_file`).
    fn name(&self) -> &str;

    /// What this tool does, written for the model.
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Side-effect class for loop-protection rules.
    fn side_effect(&self) -> SideEffectClass;

    /// Per-call timeout. Handlers may block on I/O internally but the
    /// registry cuts them off after this duration.
    fn timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }

    /// Execute the tool with validated parameters.
    async fn execute(&self, params: Value) -> Result<Observation, ToolError>;

    /// Convert this tool into a definition for prompt rendering.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools. Registered once at startup; no hot
/// reload.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// When set, overrides every tool's own timeout.
    timeout_override: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Force one timeout for every tool, regardless of what the tool
    /// declares.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout_override = Some(timeout);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Side-effect class for a registered tool.
    pub fn side_effect(&self, name: &str) -> Option<SideEffectClass> {
        self.tools.get(name).map(|t| t.side_effect())
    }

    /// All registered tool names, sorted for deterministic output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Render the tool list for the system prompt:
    /// `- name({"param": type}): description` per line.
    pub fn descriptions_block(&self) -> String {
        self.definitions()
            .iter()
            .map(|d| {
                let params = render_schema_params(&d.parameters);
                format!("- {}({}): {}", d.name, params, d.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Dispatch a call: validate the params against the tool's schema,
    /// then execute under the tool's timeout. Every failure mode folds
    /// into a failed [`Observation`] — the loop never sees a `ToolError`.
    pub async fn dispatch(&self, name: &str, params: &Value) -> Observation {
        let Some(tool) = self.tools.get(name) else {
            return Observation::fail(format!("unknown tool '{name}'"));
        };

        if let Err(detail) = validate_params(&tool.parameters_schema(), params) {
            return Observation::fail(format!("invalid params: {detail}"));
        }

        let timeout = self.timeout_override.unwrap_or_else(|| tool.timeout());
        match tokio::time::timeout(timeout, tool.execute(params.clone())).await {
            Ok(Ok(observation)) => observation,
            Ok(Err(e)) => Observation::fail(e.to_string()),
            Err(_) => Observation::timeout(name, timeout.as_secs()),
        }
    }
}

/// Validate a JSON params object against a tool schema.
///
/// Covers the subset of JSON Schema the tools actually declare: the
/// top-level `object` type, `required` keys, and primitive `type` tags on
/// properties. Unknown keys pass through untouched — models routinely add
/// harmless extras.
pub fn validate_params(schema: &Value, params: &Value) -> Result<(), String> {
    let Some(obj) = params.as_object() else {
        return Err("parameters must be a JSON object".into());
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !obj.contains_key(key) {
                return Err(format!("missing required parameter '{key}'"));
            }
        }
    }

    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in obj {
            let Some(expected) = props.get(key).and_then(|p| p.get("type")).and_then(|t| t.as_str())
            else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !matches {
                return Err(format!("parameter '{key}' must be of type {expected}"));
            }
        }
    }

    Ok(())
}

fn render_schema_params(schema: &Value) -> String {
    let Some(props) = schema.get("properties").and_then(|p| p.as_object()) else {
        return String::new();
    };
    let mut keys: Vec<(&String, &Value)> = props.iter().collect();
    keys.sort_by_key(|(k, _)| k.as_str());
    keys.iter()
        .map(|(k, v)| {
            let ty = v.get("type").and_then(|t| t.as_str()).unwrap_or("any");
            format!("{k}: {ty}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        fn side_effect(&self) -> SideEffectClass {
            SideEffectClass::Read
        }
        async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
            let text = params["text"].as_str().unwrap_or("").to_string();
            Ok(Observation::text(text))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Sleeps longer than its timeout"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        fn side_effect(&self) -> SideEffectClass {
            SideEffectClass::Exec
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(20)
        }
        async fn execute(&self, _params: Value) -> Result<Observation, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Observation::text("never reached"))
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(Arc::new(EchoTool));
        r
    }

    #[tokio::test]
    async fn dispatch_executes_tool() {
        let r = registry();
        let obs = r
            .dispatch("echo", &serde_json::json!({"text": "hello"}))
            .await;
        assert!(obs.ok);
        assert_eq!(obs.summary, "hello");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_fails() {
        let r = registry();
        let obs = r.dispatch("nope", &serde_json::json!({})).await;
        assert!(!obs.ok);
        assert!(obs.summary.contains("unknown tool"));
    }

    #[tokio::test]
    async fn dispatch_validates_before_executing() {
        let r = registry();
        let obs = r.dispatch("echo", &serde_json::json!({})).await;
        assert!(!obs.ok);
        assert!(obs.summary.contains("invalid params"));
        assert!(obs.summary.contains("text"));
    }

    #[tokio::test]
    async fn dispatch_rejects_wrong_type() {
        let r = registry();
        let obs = r.dispatch("echo", &serde_json::json!({"text": 42})).await;
        assert!(!obs.ok);
        assert!(obs.summary.contains("type string"));
    }

    #[tokio::test]
    async fn dispatch_times_out() {
        let mut r = ToolRegistry::new();
        r.register(Arc::new(SlowTool));
        let obs = r.dispatch("slow", &serde_json::json!({})).await;
        assert!(!obs.ok);
        assert!(obs.is_timeout());
    }

    #[tokio::test]
    async fn registry_timeout_override_wins() {
        struct Sleepy;

        #[async_trait]
        impl Tool for Sleepy {
            fn name(&self) -> &str {
                "sleepy"
            }
            fn description(&self) -> &str {
                "Sleeps briefly"
            }
            fn parameters_schema(&self) -> Value {
                serde_json::json!({"type": "object", "properties": {}})
            }
            fn side_effect(&self) -> SideEffectClass {
                SideEffectClass::Exec
            }
            async fn execute(&self, _params: Value) -> Result<Observation, ToolError> {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(Observation::text("woke up"))
            }
        }

        let mut r = ToolRegistry::new();
        r.register(Arc::new(Sleepy));
        r.set_timeout(Duration::from_millis(10));
        let obs = r.dispatch("sleepy", &serde_json::json!({})).await;
        assert!(obs.is_timeout());
    }

    #[test]
    fn names_are_sorted() {
        let mut r = ToolRegistry::new();
        r.register(Arc::new(SlowTool));
        r.register(Arc::new(EchoTool));
        assert_eq!(r.names(), vec!["echo", "slow"]);
    }

    #[test]
    fn descriptions_block_lists_params() {
        let r = registry();
        let block = r.descriptions_block();
        assert!(block.contains("- echo(text: string): Echoes back the input"));
    }

    #[test]
    fn validate_allows_extra_keys() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "required": ["a"]
        });
        let params = serde_json::json!({"a": "x", "extra": 1});
        assert!(validate_params(&schema, &params).is_ok());
    }
}
