//! # Hearth Core
//!
//! Domain types, traits, and error definitions for the Hearth agent runtime.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod markers;
pub mod memory;
pub mod message;
pub mod model;
pub mod persist;
pub mod scratchpad;
pub mod step;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use memory::{MemoryRecord, MemoryScope, ScoredRecord};
pub use message::{History, Message, Role};
pub use model::{Embedder, GenerateRequest, LanguageModel};
pub use scratchpad::Scratchpad;
pub use step::{AgentStep, Observation};
pub use tool::{SideEffectClass, Tool, ToolDefinition, ToolRegistry};
