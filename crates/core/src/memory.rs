//! Memory domain types — records and scopes for the L3 vector store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a memory record lives. Per-chat scopes are fully isolated from
/// each other; a search may union a chat scope with `Global` but never
/// crosses chats.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "chat")]
pub enum MemoryScope {
    /// Shared knowledge base, outlives all chats.
    Global,
    /// Project memory of one chat.
    Chat(String),
}

impl MemoryScope {
    /// Stable textual label, e.g. `global` or `chat:demo`.
    pub fn label(&self) -> String {
        match self {
            MemoryScope::Global => "global".into(),
            MemoryScope::Chat(name) => format!("chat:{name}"),
        }
    }
}

impl std::fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single L3 record. Immutable except for `importance`; deletion is
/// explicit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique per scope.
    pub id: String,

    /// The remembered text.
    pub text: String,

    /// Embedding vector; dimension fixed per index.
    pub embedding: Vec<f32>,

    /// Relevance weight in [0, 1].
    pub importance: f32,

    /// Owning scope.
    pub scope: MemoryScope,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A search hit: a record together with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_labels() {
        assert_eq!(MemoryScope::Global.label(), "global");
        assert_eq!(MemoryScope::Chat("demo".into()).label(), "chat:demo");
    }

    #[test]
    fn scope_serialization_roundtrip() {
        let scope = MemoryScope::Chat("research".into());
        let json = serde_json::to_string(&scope).unwrap();
        let back: MemoryScope = serde_json::from_str(&json).unwrap();
        assert_eq!(scope, back);
    }

    #[test]
    fn record_serialization_roundtrip() {
        let record = MemoryRecord {
            id: "r1".into(),
            text: "Python 3.13 released".into(),
            embedding: vec![0.1, 0.2],
            importance: 0.8,
            scope: MemoryScope::Global,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: MemoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text, record.text);
        assert_eq!(back.embedding, record.embedding);
    }
}
