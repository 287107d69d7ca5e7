//! Web page fetching — clean text extraction with a size guard.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;

/// Pages estimated above this many tokens are refused with guidance
/// towards the structure/RAG tools instead of flooding the context.
const LARGE_PAGE_TOKENS: usize = 10_000;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return its clean text. For large pages use web_get_structure first and web_search_in_page to extract what you need."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
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

        let text = extract_text(&html);
        if text.is_empty() {
            return Ok(Observation::fail("no text content could be extracted"));
        }

        let estimated_tokens = text.len() / 4;
        if estimated_tokens > LARGE_PAGE_TOKENS {
            return Ok(Observation::fail(format!(
                "page is too large (~{estimated_tokens} tokens). Use web_get_structure('{url}') \
for an outline, then web_search_in_page(url, query) to extract the relevant parts."
            )));
        }

        Ok(Observation::text(text))
    }
}

pub(crate) async fn fetch_html(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("could not fetch '{url}': {e}"))?;
    if !response.status().is_success() {
        return Err(format!("'{url}' returned {}", response.status()));
    }
    response
        .text()
        .await
        .map_err(|e| format!("could not read body of '{url}': {e}"))
}

/// Strip scripts, styles, and chrome; return the visible text, one line
/// per block.
pub(crate) fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let noise = Selector::parse("script, style, nav, footer, header, aside, iframe").unwrap();

    let noisy: Vec<String> = document
        .select(&noise)
        .map(|el| el.text().collect::<String>())
        .collect();

    let body_text: String = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join("\n");

    body_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !noisy.iter().any(|n| n.contains(line) && !n.trim().is_empty()))
        .collect::<Vec<_>>()
        .join("\n")
}
