//! # Hearth Agent
//!
//! The core of the runtime: response parsing (C1), compression (C4),
//! adaptive context assembly (C5), and the ReAct loop with loop
//! protection and self-reflection (C7). Leaf tools, memory storage, and
//! chat persistence live in their own crates; this one orchestrates them
//! against a single injected model handle.

pub mod compress;
pub mod context;
pub mod parser;
pub mod protect;
pub mod runner;
pub mod testing;

pub use compress::{extract_key_facts, CompressionConfig, Compressor};
pub use context::{BuildInput, BuiltPrompt, ContextBuilder, ContextStats, RetrievalLimits};
pub use parser::{emit, parse_response};
pub use protect::{DuplicateGuard, Fingerprint};
pub use runner::{Agent, AgentConfig, TaskOutcome, DEFAULT_CHAT};
