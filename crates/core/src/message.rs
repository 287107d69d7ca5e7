//! Message and History domain types.
//!
//! These are the core value objects that flow through the entire system:
//! the user submits a task → the agent loop generates assistant turns and
//! tool observations → the context builder assembles them into prompts →
//! the chat store persists them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::markers;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// System instructions or injected context sections
    System,
    /// Tool execution result (an observation)
    Tool,
}

/// A single message in a chat history.
///
/// Content is plain text that may embed opaque image payload markers
/// (see [`crate::markers`]). Messages are append-only within a chat; the
/// only mutation the system performs is replacing a contiguous span with a
/// compression summary, which preserves chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// True when this message is a compression summary produced from a
    /// span of earlier messages.
    #[serde(default, skip_serializing_if = "is_false")]
    pub compressed: bool,

    /// Lazily computed token count. A cache, never persisted.
    #[serde(skip)]
    tokens: Option<usize>,
}

fn is_false(b: &bool) -> bool {
    !b
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            compressed: false,
            tokens: None,
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a tool observation message.
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Create a compression summary message carrying the timestamp of the
    /// last message of the span it replaces.
    pub fn summary(content: impl Into<String>, span_end: DateTime<Utc>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            timestamp: span_end,
            compressed: true,
            tokens: None,
        }
    }

    /// Number of image payload markers embedded in the content.
    pub fn image_count(&self) -> usize {
        markers::count_images(&self.content)
    }

    /// Token count of this message, computed with `count` on first access
    /// and cached. Image markers are charged at their fixed synthetic cost
    /// instead of their base64 length.
    pub fn tokens(&mut self, count: impl Fn(&str) -> usize) -> usize {
        if let Some(t) = self.tokens {
            return t;
        }
        let t = markers::count_tokens_with_images(&self.content, &count);
        self.tokens = Some(t);
        t
    }

    /// Replace the content, invalidating the token cache.
    pub fn set_content(&mut self, content: String) {
        self.content = content;
        self.tokens = None;
    }
}

/// A chat's chronological message stream (L2).
///
/// Strictly append-only from the outside. Compression replaces a prefix
/// span with a single summary message; surviving messages keep their order
/// and timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Replace `self.messages[..end]` with a single summary message.
    ///
    /// The summary's timestamp must equal the replaced span's last
    /// timestamp so that surviving timestamps remain monotonic. Returns the
    /// number of messages removed.
    pub fn replace_prefix_with_summary(&mut self, end: usize, summary: Message) -> usize {
        let end = end.min(self.messages.len());
        if end == 0 {
            return 0;
        }
        self.messages.splice(..end, std::iter::once(summary));
        end
    }

    /// Remove the messages at the given (ascending) indices. Used by span
    /// compression to drop junk before summarising; relative order of the
    /// survivors is untouched.
    pub fn remove_indices(&mut self, indices: &[usize]) {
        let mut i = 0usize;
        let mut cursor = 0usize;
        self.messages.retain(|_| {
            let drop = cursor < indices.len() && indices[cursor] == i;
            if drop {
                cursor += 1;
            }
            i += 1;
            !drop
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
        assert!(!msg.compressed);
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::tool("Observation: done");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "Observation: done");
        assert_eq!(deserialized.role, Role::Tool);
    }

    #[test]
    fn token_cache_invalidated_on_content_change() {
        let mut msg = Message::user("12345678");
        let count = |s: &str| s.len() / 4;
        assert_eq!(msg.tokens(count), 2);
        msg.set_content("1234".into());
        assert_eq!(msg.tokens(count), 1);
    }

    #[test]
    fn image_markers_use_fixed_cost() {
        let mut msg = Message::tool(format!("see [IMAGE_DATA:{}]", "A".repeat(4000)));
        let count = |s: &str| s.len() / 4;
        let t = msg.tokens(count);
        // The 4000-char payload must not be billed at ~1000 tokens.
        assert!(t < 100, "expected fixed image cost, got {t}");
    }

    #[test]
    fn replace_prefix_keeps_order_and_timestamps() {
        let mut history = History::new();
        for i in 0..5 {
            history.push(Message::user(format!("msg {i}")));
        }
        let span_end = history.messages()[2].timestamp;
        let removed = history.replace_prefix_with_summary(3, Message::summary("recap", span_end));

        assert_eq!(removed, 3);
        assert_eq!(history.len(), 3);
        assert!(history.messages()[0].compressed);
        assert_eq!(history.messages()[0].timestamp, span_end);
        assert_eq!(history.messages()[1].content, "msg 3");

        // Timestamps stay monotonic
        let stamps: Vec<_> = history.iter().map(|m| m.timestamp).collect();
        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(stamps, sorted);
    }

    #[test]
    fn remove_indices_drops_only_listed() {
        let mut history = History::new();
        for i in 0..5 {
            history.push(Message::user(format!("msg {i}")));
        }
        history.remove_indices(&[1, 3]);
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 0", "msg 2", "msg 4"]);
    }

    #[test]
    fn summary_flag_survives_roundtrip() {
        let msg = Message::summary("recap", Utc::now());
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert!(back.compressed);
        assert_eq!(back.role, Role::System);
    }
}
