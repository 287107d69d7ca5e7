//! Loop protection — refuse duplicate network calls within one task.
//!
//! The loop fingerprints every network-class call as
//! `(tool, normalised params)`. A repeat is short-circuited with a
//! guidance observation that points the model back at the content it
//! already fetched (or tells it to narrow the query); the handler is never
//! invoked a second time.

use serde_json::Value;
use std::collections::HashMap;

/// Normalised identity of one network call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Build a fingerprint from a tool name and its params.
    ///
    /// URL values are trimmed and stripped of a trailing slash; query
    /// values are lowercased with whitespace collapsed. Everything else
    /// participates verbatim, sorted by key so argument order is
    /// irrelevant.
    pub fn new(tool: &str, params: &Value) -> Self {
        let mut parts = vec![tool.to_string()];

        if let Some(obj) = params.as_object() {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            for key in keys {
                let value = &obj[key.as_str()];
                let normalised = match (key.as_str(), value) {
                    ("url", Value::String(url)) => normalise_url(url),
                    ("query", Value::String(query)) => normalise_query(query),
                    (_, other) => other.to_string(),
                };
                parts.push(format!("{key}={normalised}"));
            }
        }

        Fingerprint(parts.join("\u{1}"))
    }
}

fn normalise_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn normalise_query(query: &str) -> String {
    query
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A recorded prior call, referenced by the guidance observation.
#[derive(Debug, Clone)]
struct PriorCall {
    cycle: usize,
}

/// Tracks network calls made within one task.
#[derive(Debug, Default)]
pub struct DuplicateGuard {
    seen: HashMap<Fingerprint, PriorCall>,
}

impl DuplicateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call, or return guidance text when it duplicates an
    /// earlier one. Only network-class tools are guarded; everything else
    /// passes through.
    pub fn check(&mut self, tool: &str, params: &Value, cycle: usize) -> Option<String> {
        let fingerprint = Fingerprint::new(tool, params);

        if let Some(prior) = self.seen.get(&fingerprint) {
            return Some(guidance(tool, params, prior.cycle));
        }

        self.seen.insert(fingerprint, PriorCall { cycle });
        None
    }

    pub fn calls_recorded(&self) -> usize {
        self.seen.len()
    }
}

fn guidance(tool: &str, params: &Value, prior_cycle: usize) -> String {
    match tool {
        "web_fetch" => {
            let url = params["url"].as_str().unwrap_or("<url>");
            format!(
                "duplicate call refused: '{url}' was already fetched in cycle {prior_cycle}. \
The page content is in the earlier observation. Use \
web_search_in_page(url, query) to extract what you need from it — do not fetch it again."
            )
        }
        "internet_search" => {
            let query = params["query"].as_str().unwrap_or("<query>");
            format!(
                "duplicate call refused: the search '{query}' already ran in cycle {prior_cycle} \
and its results are in the earlier observation. Use the URLs it returned \
(web_fetch, then web_search_in_page), or narrow the query before searching again."
            )
        }
        _ => format!(
            "duplicate call refused: this exact {tool} call already ran in cycle {prior_cycle}. \
Use the result from the earlier observation instead of repeating it."
        ),
    }
}
