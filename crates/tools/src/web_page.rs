//! Page navigation tools: heading outline and in-page semantic search.
//!
//! `web_get_structure` lists h1–h6 headings with anchors so the model can
//! orient itself on a large document. `web_search_in_page` chunks the page
//! text and ranks chunks against the query with the process embedder —
//! the retrieval path for pages too big to fetch whole.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::model::Embedder;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use hearth_memory::cosine_similarity;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::web_fetch::{extract_text, fetch_html};

const CHUNK_SIZE: usize = 1000;
const CHUNK_OVERLAP: usize = 150;
const MIN_CHUNK_CHARS: usize = 100;

fn page_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36")
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// Outline of a page: headings h1–h6 with anchors.
pub struct WebGetStructureTool {
    client: reqwest::Client,
}

impl WebGetStructureTool {
    pub fn new() -> Self {
        Self {
            client: page_client(),
        }
    }
}

impl Default for WebGetStructureTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebGetStructureTool {
    fn name(&self) -> &str {
        "web_get_structure"
    }

    fn description(&self) -> &str {
        "Return the heading outline (h1-h6 with anchors) of a web page. Use first on large documents, then web_search_in_page for the details."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to outline"
                }
            },
            "required": ["url"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Network
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let url = params["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'url'".into()))?;

        let html = match fetch_html(&self.client, url).await {
            Ok(html) => html,
            Err(reason) => return Ok(Observation::fail(reason)),
        };

        let outline = heading_outline(&html);
        if outline.is_empty() {
            return Ok(Observation::text("no headings found on the page"));
        }
        Ok(Observation::text(format!(
            "Document structure of {url}:\n{outline}\nUse web_search_in_page(url, query) to pull specific sections."
        )))
    }
}

pub(crate) fn heading_outline(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse("h1, h2, h3, h4, h5, h6").unwrap();

    document
        .select(&selector)
        .filter_map(|el| {
            let level: usize = el.value().name()[1..].parse().ok()?;
            let text = el.text().collect::<String>().trim().to_string();
            if text.is_empty() {
                return None;
            }
            let anchor = el
                .value()
                .attr("id")
                .or_else(|| el.value().attr("name"))
                .map(|a| format!(" #{a}"))
                .unwrap_or_default();
            let indent = "  ".repeat(level - 1);
            Some(format!("{indent}H{level}: {text}{anchor}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Semantic search inside one page.
pub struct WebSearchInPageTool {
    client: reqwest::Client,
    embedder: Arc<dyn Embedder>,
}

impl WebSearchInPageTool {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            client: page_client(),
            embedder,
        }
    }
}

#[async_trait]
impl Tool for WebSearchInPageTool {
    fn name(&self) -> &str {
        "web_search_in_page"
    }

    fn description(&self) -> &str {
        "Semantic search inside one web page: fetches it, splits it into chunks, and returns the most relevant fragments for a query."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to search within"
                },
                "query": {
                    "type": "string",
                    "description": "What to look for"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Fragments to return (default 3)"
                }
            },
            "required": ["url", "query"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Network
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let url = params["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'url'".into()))?;
        let query = params["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'query'".into()))?;
        let top_k = params["top_k"].as_u64().unwrap_or(3) as usize;

        let html = match fetch_html(&self.client, url).await {
            Ok(html) => html,
            Err(reason) => return Ok(Observation::fail(reason)),
        };
        let text = extract_text(&html);
        let chunks = chunk_text(&text);
        if chunks.is_empty() {
            return Ok(Observation::fail("no content could be extracted from the page"));
        }

        let ranked = match rank_chunks(&*self.embedder, &chunks, query, top_k) {
            Ok(r) => r,
            Err(e) => return Ok(Observation::fail(format!("embedding failed: {e}"))),
        };

        let fragments = ranked
            .iter()
            .enumerate()
            .map(|(i, (score, chunk))| {
                format!("Fragment {} (relevance {:.0}%):\n{chunk}", i + 1, score * 100.0)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(Observation::text(format!(
            "Search results for '{query}' in {url} ({} of {} chunks):\n{fragments}",
            ranked.len(),
            chunks.len()
        )))
    }
}

/// Split text into overlapping chunks, dropping fragments too short to
/// carry meaning.
pub(crate) fn chunk_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let step = CHUNK_SIZE - CHUNK_OVERLAP;
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + CHUNK_SIZE).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if trimmed.len() > MIN_CHUNK_CHARS {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn rank_chunks<'a>(
    embedder: &dyn Embedder,
    chunks: &'a [String],
    query: &str,
    top_k: usize,
) -> Result<Vec<(f32, &'a String)>, hearth_core::error::MemoryError> {
    let query_embedding = embedder.embed(query)?;
    let mut scored: Vec<(f32, &String)> = chunks
        .iter()
        .map(|chunk| {
            let embedding = embedder.embed(chunk)?;
            Ok((cosine_similarity(&embedding, &query_embedding), chunk))
        })
        .collect::<Result<_, hearth_core::error::MemoryError>>()?;

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    Ok(scored)
}
