//! Token estimation utilities for prompt assembly.
//!
//! All counting goes through the model's own tokenizer (or its 4-chars
//! heuristic) via [`count_tokens_with_images`], so image payload markers
//! are billed at their fixed synthetic cost rather than their base64
//! length.

use hearth_core::markers::count_tokens_with_images;
use hearth_core::message::Message;
use hearth_core::model::LanguageModel;

/// Per-message overhead for role name, delimiters, and wire formatting.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Tokens of a plain text under the model's counter, image-aware.
pub fn text_tokens(llm: &dyn LanguageModel, text: &str) -> usize {
    count_tokens_with_images(text, &|t| llm.count_tokens(t))
}

/// Tokens of a message, including per-message overhead. Uses and fills the
/// message's lazy cache.
pub fn message_tokens(llm: &dyn LanguageModel, message: &mut Message) -> usize {
    MESSAGE_OVERHEAD + message.tokens(|t| llm.count_tokens(t))
}

/// Tokens of a message without touching the cache (for borrowed messages).
pub fn message_tokens_uncached(llm: &dyn LanguageModel, message: &Message) -> usize {
    MESSAGE_OVERHEAD + text_tokens(llm, &message.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use hearth_core::markers::IMAGE_TOKEN_COST;

    #[test]
    fn message_includes_overhead() {
        let llm = ScriptedModel::new(vec![]);
        let mut msg = Message::user("test"); // 4 chars → 1 token
        assert_eq!(message_tokens(&llm, &mut msg), 5);
    }

    #[test]
    fn images_counted_at_fixed_cost() {
        let llm = ScriptedModel::new(vec![]);
        let text = format!("shot [IMAGE_DATA:{}]", "Z".repeat(8192));
        let tokens = text_tokens(&llm, &text);
        assert_eq!(tokens, "shot ".len().div_ceil(4) + IMAGE_TOKEN_COST);
    }

    #[test]
    fn cached_and_uncached_agree() {
        let llm = ScriptedModel::new(vec![]);
        let mut msg = Message::tool("Observation: twelve chars plus");
        assert_eq!(
            message_tokens_uncached(&llm, &msg),
            message_tokens(&llm, &mut msg)
        );
    }
}
