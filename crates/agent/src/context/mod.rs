//! Adaptive context assembly.
//!
//! Builds a token-bounded prompt for every model call from five priority
//! classes (system, scratchpad, retrieved memory, history, completion
//! reserve), with dynamic redistribution between memory and history and
//! in-place compression of oversized blocks.

pub mod budget;
pub mod builder;
pub mod token;

pub use budget::{ContextBudget, DEFAULT_WINDOW};
pub use builder::{BuildInput, BuiltPrompt, ContextBuilder, ContextStats, RetrievalLimits};
