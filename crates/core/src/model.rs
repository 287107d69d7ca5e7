//! Model and embedding traits — the abstraction over local inference.
//!
//! A [`LanguageModel`] knows how to turn a prompt into text and how to
//! count tokens; an [`Embedder`] turns text into a fixed-dimension vector.
//! Both are loaded exactly once per process (GPU memory) and injected as
//! shared handles — they are never re-created mid-session.

use async_trait::async_trait;

use crate::error::{MemoryError, ModelError};
use crate::message::Message;

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// The assembled prompt messages, in order.
    pub messages: Vec<Message>,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Stop sequences.
    pub stop: Vec<String>,
}

impl GenerateRequest {
    pub fn new(messages: Vec<Message>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            messages,
            max_tokens,
            temperature,
            stop: Vec::new(),
        }
    }
}

/// The core language-model trait.
///
/// Only one generation is in flight at a time per handle; the agent loop
/// serialises calls.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name for this model backend.
    fn name(&self) -> &str;

    /// The model's context window in tokens.
    fn context_window(&self) -> usize;

    /// Count tokens in a text.
    ///
    /// The default is the 4-chars-per-token heuristic, accurate within
    /// ~10% for BPE tokenizers on English text. Backends with a real
    /// tokenizer endpoint may override.
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        text.len().div_ceil(4)
    }

    /// Generate a completion for the given prompt.
    async fn generate(&self, request: GenerateRequest) -> Result<String, ModelError>;
}

/// The embedding trait. Dimension is fixed for the life of the process;
/// an index written with one dimension must be rebuilt before use with
/// another.
pub trait Embedder: Send + Sync {
    /// A human-readable name for this embedder.
    fn name(&self) -> &str;

    /// The output vector dimension D.
    fn dimension(&self) -> usize;

    /// Embed a text into a vector of length [`Self::dimension`].
    fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;
}
