//! Wire-level content markers.
//!
//! Both the response parser and the context manager must recognise these
//! bit-exact, so they live in core:
//!
//! - `[IMAGE_DATA:<base64>]` — inline image payload
//! - `[PAGE_<n>_IMAGE_DATA:<base64>]` — per-page PDF payload
//! - `[IMAGES_OMITTED:<n>]` — notice left behind when compression drops images
//! - `<THOUGHT>`, `<TOOL>`, `<PARAMS>`, `<CONTENT>`, `<END>` — response flags

use regex_lite::Regex;
use std::sync::OnceLock;

/// Response format flag tokens. Literal, line-starting markers.
pub const THOUGHT_TAG: &str = "<THOUGHT>";
pub const TOOL_TAG: &str = "<TOOL>";
pub const PARAMS_TAG: &str = "<PARAMS>";
pub const CONTENT_TAG: &str = "<CONTENT>";
pub const END_TAG: &str = "<END>";

/// Fixed synthetic token cost per embedded image, applied after downscaling.
/// Lets images participate in budgeting without pixel counts.
pub const IMAGE_TOKEN_COST: usize = 65;

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(?:PAGE_\d+_)?IMAGE_DATA:[^\]]+\]").unwrap())
}

/// Count image payload markers (plain and per-page) in a text.
pub fn count_images(text: &str) -> usize {
    image_regex().find_iter(text).count()
}

/// Remove every image payload from the text, returning the stripped text
/// and the number of payloads removed.
pub fn strip_images(text: &str) -> (String, usize) {
    let count = count_images(text);
    if count == 0 {
        return (text.to_string(), 0);
    }
    (image_regex().replace_all(text, "").into_owned(), count)
}

/// Keep at most `max` image payloads (the most recent, i.e. the last ones
/// in the text), replacing the dropped span with a visible
/// `[IMAGES_OMITTED:<n>]` notice at the position of the first dropped
/// payload. Returns the rewritten text and how many images were dropped.
pub fn keep_last_images(text: &str, max: usize) -> (String, usize) {
    let spans: Vec<(usize, usize)> = image_regex()
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();
    if spans.len() <= max {
        return (text.to_string(), 0);
    }

    let dropped = spans.len() - max;
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0usize;
    for (i, &(start, end)) in spans.iter().enumerate() {
        out.push_str(&text[last_end..start]);
        if i < dropped {
            // Oldest payloads go; the notice marks where the first one was.
            if i == 0 {
                out.push_str(&omitted_notice(dropped));
            }
        } else {
            out.push_str(&text[start..end]);
        }
        last_end = end;
    }
    out.push_str(&text[last_end..]);
    (out, dropped)
}

/// All image payload markers in order of appearance.
pub fn image_markers(text: &str) -> Vec<String> {
    image_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The notice marker inserted where images were dropped.
pub fn omitted_notice(n: usize) -> String {
    format!("[IMAGES_OMITTED:{n}]")
}

/// Token count of a text under the given counter, charging each image
/// payload its fixed synthetic cost instead of its base64 length.
pub fn count_tokens_with_images(text: &str, count: &impl Fn(&str) -> usize) -> usize {
    let (stripped, images) = strip_images(text);
    count(&stripped) + images * IMAGE_TOKEN_COST
}
