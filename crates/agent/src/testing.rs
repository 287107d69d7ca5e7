//! Test doubles shared by the agent tests.
//!
//! `ScriptedModel` plays back a queue of canned responses and records
//! every request it receives, so tests can assert on both sides of the
//! model boundary without a real inference endpoint.

use async_trait::async_trait;
use hearth_core::error::{ModelError, ToolError};
use hearth_core::model::{GenerateRequest, LanguageModel};
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A model that returns scripted responses in order. Once the script is
/// exhausted it returns a bare `finish` step so runaway loops terminate.
pub struct ScriptedModel {
    responses: Mutex<Vec<String>>,
    requests: Mutex<Vec<GenerateRequest>>,
    window: usize,
    fail: bool,
}

impl ScriptedModel {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            requests: Mutex::new(Vec::new()),
            window: 24_576,
            fail: false,
        }
    }

    /// A model whose every call fails, for fallback-path tests.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            window: 24_576,
            fail: true,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// How many generation calls were made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn context_window(&self) -> usize {
        self.window
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(ModelError::Request("scripted failure".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(
                "<THOUGHT>\nscript exhausted\n<TOOL>\nfinish\n<PARAMS>\n{\"final_answer\": \"script exhausted\"}\n<END>".into(),
            );
        }
        Ok(responses.remove(0))
    }
}

/// A tool that counts its executions and records the params it saw. Used
/// to prove loop protection short-circuits duplicates without running the
/// handler, and to assert on dispatched arguments.
pub struct CountingTool {
    name: String,
    class: SideEffectClass,
    executions: AtomicUsize,
    params_log: Mutex<Vec<Value>>,
    response: String,
}

impl CountingTool {
    pub fn network(name: &str, response: &str) -> Self {
        Self::with_class(name, response, SideEffectClass::Network)
    }

    pub fn read(name: &str, response: &str) -> Self {
        Self::with_class(name, response, SideEffectClass::Read)
    }

    pub fn write(name: &str, response: &str) -> Self {
        Self::with_class(name, response, SideEffectClass::Write)
    }

    fn with_class(name: &str, response: &str, class: SideEffectClass) -> Self {
        Self {
            name: name.to_string(),
            class,
            executions: AtomicUsize::new(0),
            params_log: Mutex::new(Vec::new()),
            response: response.to_string(),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn recorded_params(&self) -> Vec<Value> {
        self.params_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Counting test tool"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" },
                "query": { "type": "string" }
            }
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        self.class
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.params_log.lock().unwrap().push(params);
        Ok(Observation::text(self.response.clone()))
    }
}

/// A tool that always fails, for self-reflection tests.
pub struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Exec
    }

    async fn execute(&self, _params: Value) -> Result<Observation, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason: "deliberate test failure".into(),
        })
    }
}
