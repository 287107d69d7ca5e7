//! Compressor — LLM-assisted summarisation with non-LLM fallbacks.
//!
//! Two jobs:
//!
//! 1. **Span compression**: replace a contiguous prefix of history with a
//!    single summary message that preserves user intents, tool calls and
//!    their outcomes, and extracted facts. Junk (format-error observations,
//!    empty observations, near-duplicates) is dropped first.
//! 2. **Block compression**: shrink a single oversized block in place —
//!    keep at most 3 images (the most recent), leave a visible
//!    `[IMAGES_OMITTED:n]` notice, then summarise the text portion if it
//!    is still over budget.
//!
//! The compressor sits on the critical path of context assembly, so it is
//! itself budget-bounded: the summarisation prompt input is clipped to a
//! fixed size, the output length is a parameter, and every LLM failure
//! falls back to truncation plus regex fact extraction.

use hearth_core::markers;
use hearth_core::message::{History, Message, Role};
use hearth_core::model::{GenerateRequest, LanguageModel};
use regex_lite::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Tuning knobs for the compressor.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Target output length for summaries, in tokens.
    pub summary_max_tokens: u32,

    /// Summarisation prompt input is clipped to this many characters.
    pub input_cap_chars: usize,

    /// Maximum images kept in a compressed block.
    pub max_images_per_block: usize,

    /// Importance assigned to facts fed into L3 during compression.
    pub fact_importance: f32,

    /// Facts shorter than this are discarded as noise.
    pub min_fact_chars: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            summary_max_tokens: 256,
            input_cap_chars: 3000,
            max_images_per_block: 3,
            fact_importance: 0.6,
            min_fact_chars: 20,
        }
    }
}

/// Outcome of a span compression.
#[derive(Debug, Default)]
pub struct SpanOutcome {
    /// Messages removed (junk + summarised span).
    pub removed: usize,

    /// Facts extracted from the span, for L3 insertion and the scratchpad.
    pub facts: Vec<String>,
}

#[derive(Clone)]
pub struct Compressor {
    llm: Arc<dyn LanguageModel>,
    config: CompressionConfig,
}

impl Compressor {
    pub fn new(llm: Arc<dyn LanguageModel>, config: CompressionConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Compress `history[..end]` into one summary message.
    ///
    /// Junk inside the span is dropped, long observations are digested,
    /// and the replacement summary carries the span's last timestamp so
    /// surviving timestamps stay monotonic.
    pub async fn compress_span(&self, history: &mut History, end: usize) -> SpanOutcome {
        let end = end.min(history.len());
        if end == 0 {
            return SpanOutcome::default();
        }

        // Drop junk first so it neither survives nor pollutes the summary.
        let junk: Vec<usize> = history.messages()[..end]
            .iter()
            .enumerate()
            .filter(|(_, m)| is_junk(m))
            .map(|(i, _)| i)
            .collect();
        let mut dropped_dups = dedup_indices(&history.messages()[..end], &junk);
        let mut to_drop = junk;
        to_drop.append(&mut dropped_dups);
        to_drop.sort_unstable();
        to_drop.dedup();
        history.remove_indices(&to_drop);
        let end = end - to_drop.len();

        if end == 0 {
            return SpanOutcome {
                removed: to_drop.len(),
                facts: Vec::new(),
            };
        }

        let span = &history.messages()[..end];
        let span_last = span[end - 1].timestamp;

        // Facts come from observations, before the text is condensed away.
        let facts: Vec<String> = span
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| extract_key_facts(&m.content))
            .filter(|f| f.len() >= self.config.min_fact_chars)
            .collect();

        let digest = self.render_span_digest(span);
        let summary_text = self.summarize(&digest, SPAN_SUMMARY_INSTRUCTION).await;

        let mut content = format!("Earlier conversation (compressed): {summary_text}");
        if !facts.is_empty() {
            content.push_str("\nKey facts: ");
            content.push_str(&facts.join(" | "));
        }

        let removed_span = history.replace_prefix_with_summary(end, Message::summary(content, span_last));
        debug!(
            removed = removed_span + to_drop.len(),
            facts = facts.len(),
            "history span compressed"
        );

        SpanOutcome {
            removed: removed_span + to_drop.len(),
            facts,
        }
    }

    /// Compress a single oversized block to fit `max_tokens`.
    ///
    /// Never fails: when the LLM call errors out the text is truncated and
    /// the extracted facts appended, so a huge observation degrades into a
    /// short one instead of killing the session.
    pub async fn compress_block(&self, content: &str, max_tokens: usize) -> String {
        let (with_capped_images, dropped) =
            markers::keep_last_images(content, self.config.max_images_per_block);
        if dropped > 0 {
            debug!(dropped, "images dropped from oversized block");
        }

        let count = |t: &str| self.llm.count_tokens(t);
        if markers::count_tokens_with_images(&with_capped_images, &count) <= max_tokens {
            return with_capped_images;
        }

        // Separate surviving images from the text, summarise the text only.
        let (text_only, _) = markers::strip_images(&with_capped_images);
        let images = markers::image_markers(&with_capped_images);

        let summary = self.summarize(&text_only, BLOCK_SUMMARY_INSTRUCTION).await;

        let mut out = format!("(compressed) {summary}");
        for marker in images {
            out.push('\n');
            out.push_str(&marker);
        }
        out
    }

    async fn summarize(&self, text: &str, instruction: &str) -> String {
        let clipped = clip_chars(text, self.config.input_cap_chars);
        let prompt = format!("{instruction}\n\nFULL TEXT:\n{clipped}\n\nSUMMARY (2-3 sentences):");

        let request = GenerateRequest::new(
            vec![Message::user(prompt)],
            self.config.summary_max_tokens,
            0.2,
        );

        match self.llm.generate(request).await {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => self.fallback_summary(text),
            Err(e) => {
                warn!(error = %e, "summarisation call failed, using truncation fallback");
                self.fallback_summary(text)
            }
        }
    }

    fn fallback_summary(&self, text: &str) -> String {
        let mut out = clip_chars(text, 500);
        if text.len() > 500 {
            out.push_str("… (truncated)");
        }
        if let Some(facts) = extract_key_facts(text) {
            out.push_str("\nKey facts: ");
            out.push_str(&facts);
        }
        out
    }

    fn render_span_digest(&self, span: &[Message]) -> String {
        span.iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                    Role::Tool => "observation",
                };
                let (text, images) = markers::strip_images(&m.content);
                let mut line = format!("[{role}] {}", clip_chars(text.trim(), 400));
                if images > 0 {
                    line.push_str(&format!(" ({images} images)"));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

const SPAN_SUMMARY_INSTRUCTION: &str = "Condense this conversation span. Preserve: every user \
intent, each tool call and whether it succeeded, and key facts (URLs, file paths, identifiers, \
version numbers, decisions). Answer with the summary only.";

const BLOCK_SUMMARY_INSTRUCTION: &str = "Condense this tool result, keeping only the key facts \
(URLs, file paths, identifiers, version numbers, decisions). Answer with the summary only.";

/// Extract key facts from a text: URLs, file names, version numbers, and
/// dates. Falls back to the first 150 characters when nothing structured
/// is found. Returns `None` for effectively empty input.
pub fn extract_key_facts(text: &str) -> Option<String> {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    static FILE_RE: OnceLock<Regex> = OnceLock::new();
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    static DATE_RE: OnceLock<Regex> = OnceLock::new();

    let url_re = URL_RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).unwrap());
    let file_re = FILE_RE.get_or_init(|| {
        Regex::new(
            r"\b[\w./-]+\.(?:rs|py|txt|md|json|yaml|yml|toml|cfg|ini|sh|bash|js|ts|html|css|sql)\b",
        )
        .unwrap()
    });
    let version_re = VERSION_RE
        .get_or_init(|| Regex::new(r"\b(?:v\.?\s*)?(\d+\.\d+(?:\.\d+)?)\b").unwrap());
    let date_re =
        DATE_RE.get_or_init(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b\d{2}\.\d{2}\.\d{4}\b").unwrap());

    let mut facts = Vec::new();

    let urls = take_unique(url_re.find_iter(text).map(|m| m.as_str()), 3);
    if !urls.is_empty() {
        facts.push(format!("URL: {}", urls.join(", ")));
    }

    let files = take_unique(file_re.find_iter(text).map(|m| m.as_str()), 3);
    if !files.is_empty() {
        facts.push(format!("Files: {}", files.join(", ")));
    }

    let versions = take_unique(
        version_re
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str())),
        2,
    );
    if !versions.is_empty() {
        facts.push(format!("Versions: {}", versions.join(", ")));
    }

    let dates = take_unique(date_re.find_iter(text).map(|m| m.as_str()), 2);
    if !dates.is_empty() {
        facts.push(format!("Dates: {}", dates.join(", ")));
    }

    if facts.is_empty() {
        let clean = text.replace("Observation:", " ");
        let clean = clean.trim();
        if clean.is_empty() {
            return None;
        }
        return Some(clip_chars(clean, 150).trim().to_string());
    }

    Some(facts.join(" | "))
}

fn take_unique<'a>(iter: impl Iterator<Item = &'a str>, max: usize) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for item in iter {
        if !seen.contains(&item) {
            seen.push(item);
            if seen.len() == max {
                break;
            }
        }
    }
    seen
}

fn clip_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Format-error observations and empty observations are junk once the
/// model has recovered: they carry no information the next cycles need.
fn is_junk(message: &Message) -> bool {
    let content = message.content.trim();
    if content == "Observation:" || content.is_empty() {
        return true;
    }
    const FORMAT_ERROR_MARKERS: [&str; 2] = ["FORMAT ERROR", "does not match the required format"];
    FORMAT_ERROR_MARKERS.iter().any(|m| content.contains(m))
}

/// Indices (within the span) of messages whose 200-char prefix duplicates
/// an earlier message, excluding already-condemned indices.
fn dedup_indices(span: &[Message], already: &[usize]) -> Vec<usize> {
    let mut seen: Vec<String> = Vec::new();
    let mut dups = Vec::new();
    for (i, msg) in span.iter().enumerate() {
        if already.contains(&i) {
            continue;
        }
        let prefix: String = msg.content.chars().take(200).collect();
        if seen.contains(&prefix) {
            dups.push(i);
        } else {
            seen.push(prefix);
        }
    }
    dups
}
