//! Memory management tools.
//!
//! These need live agent state — the memory manager and the name of the
//! active chat — so they hold shared handles to both. To the registry and
//! the model they are ordinary tools; `add`/`delete` address the active
//! chat's project scope, `list` shows global and project side by side.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::memory::{MemoryRecord, MemoryScope};
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use hearth_memory::MemoryManager;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to the active chat name, owned by the agent.
pub type ActiveChat = Arc<RwLock<String>>;

async fn chat_scope(active: &ActiveChat) -> MemoryScope {
    MemoryScope::Chat(active.read().await.clone())
}

fn render_records(records: &[MemoryRecord]) -> String {
    if records.is_empty() {
        return "  (empty)".into();
    }
    records
        .iter()
        .map(|r| format!("  {} [importance {:.2}]: {}", r.id, r.importance, r.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ListMemoriesTool {
    memory: Arc<MemoryManager>,
    active: ActiveChat,
}

impl ListMemoriesTool {
    pub fn new(memory: Arc<MemoryManager>, active: ActiveChat) -> Self {
        Self { memory, active }
    }
}

#[async_trait]
impl Tool for ListMemoriesTool {
    fn name(&self) -> &str {
        "list_memories"
    }

    fn description(&self) -> &str {
        "List all long-term memory records: the shared global scope and the current chat's project scope."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Memory
    }

    async fn execute(&self, _params: Value) -> Result<Observation, ToolError> {
        let scope = chat_scope(&self.active).await;
        let global = self
            .memory
            .list(&MemoryScope::Global)
            .await
            .unwrap_or_default();
        let project = self.memory.list(&scope).await.unwrap_or_default();

        Ok(Observation::text(format!(
            "GLOBAL MEMORY:\n{}\n\nPROJECT MEMORY ({scope}):\n{}",
            render_records(&global),
            render_records(&project)
        )))
    }
}

pub struct AddMemoryTool {
    memory: Arc<MemoryManager>,
    active: ActiveChat,
}

impl AddMemoryTool {
    pub fn new(memory: Arc<MemoryManager>, active: ActiveChat) -> Self {
        Self { memory, active }
    }
}

#[async_trait]
impl Tool for AddMemoryTool {
    fn name(&self) -> &str {
        "add_memory"
    }

    fn description(&self) -> &str {
        "Store a text in the current chat's long-term memory. Use for information worth remembering across sessions."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to remember"
                },
                "importance": {
                    "type": "number",
                    "description": "Relevance weight 0..1 (default 0.7)"
                }
            },
            "required": ["text"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Memory
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let text = params["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'text'".into()))?;
        let importance = params["importance"].as_f64().unwrap_or(0.7) as f32;

        let scope = chat_scope(&self.active).await;
        match self.memory.add(&scope, text, importance).await {
            Ok(id) => Ok(Observation::text(format!(
                "stored in project memory '{scope}' with id {id}"
            ))),
            Err(e) => Ok(Observation::fail(format!("could not store memory: {e}"))),
        }
    }
}

pub struct DeleteMemoryTool {
    memory: Arc<MemoryManager>,
    active: ActiveChat,
}

impl DeleteMemoryTool {
    pub fn new(memory: Arc<MemoryManager>, active: ActiveChat) -> Self {
        Self { memory, active }
    }
}

#[async_trait]
impl Tool for DeleteMemoryTool {
    fn name(&self) -> &str {
        "delete_memory"
    }

    fn description(&self) -> &str {
        "Delete a record from the current chat's long-term memory by id (see list_memories)."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Record id to delete"
                }
            },
            "required": ["id"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Memory
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let id = params["id"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'id'".into()))?;

        let scope = chat_scope(&self.active).await;
        match self.memory.delete(&scope, id).await {
            Ok(true) => Ok(Observation::text(format!("record {id} deleted"))),
            Ok(false) => Ok(Observation::fail(format!(
                "no record with id {id} in scope '{scope}'"
            ))),
            Err(e) => Ok(Observation::fail(format!("could not delete: {e}"))),
        }
    }
}
