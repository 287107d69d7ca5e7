//! Error types for the Hearth domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Hearth operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Parser errors ---
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Context assembly errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Chat store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Start-up failures ---
    #[error("Initialization failed: {0}")]
    Init(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Model output could not be turned into an [`crate::AgentStep`].
///
/// Always recovered locally: the loop injects a corrective observation
/// and re-prompts.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("no tool name found: neither flag format nor JSON fallback matched")]
    NoToolName,

    #[error("invalid JSON in <PARAMS>: {0}")]
    BadParams(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Embedding dimension mismatch: index has {found}, embedder produces {expected} — the index must be rebuilt")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Memory scope '{0}' is disabled after a previous failure")]
    ScopeDisabled(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("prompt does not fit: {tokens} tokens against a {window}-token window after {attempts} compression attempts")]
    Overflow {
        tokens: usize,
        window: usize,
        attempts: usize,
    },

    #[error("required sections alone exceed the window: system {system_tokens} + scratchpad {scratchpad_tokens} tokens against {window}")]
    RequiredTooLarge {
        system_tokens: usize,
        scratchpad_tokens: usize,
        window: usize,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Chat not found: {0}")]
    NotFound(String),

    #[error("Chat '{0}' is active and cannot be deleted")]
    ChatActive(String),

    #[error("I/O error for '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("Corrupt chat data in '{path}': {reason}")]
    Corrupt { path: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },

    #[error("Generation produced no choices")]
    EmptyResponse,
}
