//! Internet search via the Google Custom Search API.
//!
//! Requires `GOOGLE_API_KEY` and `GOOGLE_CSE_ID` in the environment; with
//! them absent the tool reports a configuration failure instead of
//! reaching the network.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Google's API caps a single request at 10 results.
const MAX_RESULTS: u64 = 10;

pub struct InternetSearchTool {
    client: reqwest::Client,
}

impl InternetSearchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for InternetSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl Tool for InternetSearchTool {
    fn name(&self) -> &str {
        "internet_search"
    }

    fn description(&self) -> &str {
        "Search the internet. Returns numbered results with title, URL, and snippet. Follow up with web_fetch or web_search_in_page on the returned URLs."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results (default 5, max 10)"
                }
            },
            "required": ["query"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Network
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let query = params["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'query'".into()))?;
        let num = params["num_results"].as_u64().unwrap_or(5).min(MAX_RESULTS);

        let (api_key, cse_id) = match (
            std::env::var("GOOGLE_API_KEY"),
            std::env::var("GOOGLE_CSE_ID"),
        ) {
            (Ok(key), Ok(id)) => (key, id),
            _ => {
                return Ok(Observation::fail(
                    "GOOGLE_API_KEY and GOOGLE_CSE_ID are not set; internet search is unavailable",
                ))
            }
        };

        debug!(query = %query, num, "google search request");
        let response = self
            .client
            .get("https://www.googleapis.com/customsearch/v1")
            .query(&[
                ("key", api_key.as_str()),
                ("cx", cse_id.as_str()),
                ("q", query),
                ("num", &num.to_string()),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return Ok(Observation::fail(format!("search request failed: {e}"))),
        };
        if !response.status().is_success() {
            return Ok(Observation::fail(format!(
                "search API returned {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => return Ok(Observation::fail(format!("bad search response: {e}"))),
        };

        if parsed.items.is_empty() {
            return Ok(Observation::text("no results for this query"));
        }

        info!(query = %query, results = parsed.items.len(), "search completed");
        Ok(Observation::text(format_results(&parsed.items)))
    }
}

fn format_results(items: &[SearchItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let snippet = item.snippet.replace('\n', " ");
            format!(
                "{}. Title: {}\n   URL: {}\n   Snippet: {}",
                i + 1,
                item.title,
                item.link,
                snippet.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_formatted_numbered() {
        let items = vec![
            SearchItem {
                title: "Python 3.13 Release".into(),
                link: "https://python.org/news".into(),
                snippet: "What's new\nin Python 3.13".into(),
            },
            SearchItem {
                title: "Docs".into(),
                link: "https://docs.python.org".into(),
                snippet: "Documentation".into(),
            },
        ];
        let formatted = format_results(&items);
        assert!(formatted.starts_with("1. Title: Python 3.13 Release"));
        assert!(formatted.contains("2. Title: Docs"));
        assert!(formatted.contains("URL: https://python.org/news"));
        // Snippet newlines flattened
        assert!(formatted.contains("What's new in Python 3.13"));
    }

    #[tokio::test]
    async fn missing_keys_fail_without_network() {
        // Isolate from any ambient configuration
        std::env::remove_var("GOOGLE_API_KEY");
        std::env::remove_var("GOOGLE_CSE_ID");

        let obs = InternetSearchTool::new()
            .execute(serde_json::json!({"query": "anything"}))
            .await
            .unwrap();
        assert!(!obs.ok);
        assert!(obs.summary.contains("GOOGLE_API_KEY"));
    }
}
