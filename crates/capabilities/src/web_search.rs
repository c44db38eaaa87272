use async_trait::async_trait;
use conductor_core::{Error, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::{CallContext, Capability, CapabilitySchema};

/// Knowledge search against a DuckDuckGo-compatible instant-answer endpoint.
/// The endpoint is configurable (`capabilities.search.apiBase`).
pub struct WebSearchCapability;

#[async_trait]
impl Capability for WebSearchCapability {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: "web_search",
            description: "Search the web via an instant-answer API and return an abstract plus related results.",
            default_timeout_ms: 8_000,
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum related results to return (default from config)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    fn validate(&self, input: &Value) -> Result<()> {
        let query = input.get("query").and_then(|v| v.as_str()).unwrap_or("");
        if query.trim().is_empty() {
            return Err(Error::Validation("'query' is required".into()));
        }
        Ok(())
    }

    async fn call(&self, ctx: CallContext, input: Value) -> Result<Value> {
        let query = input
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        let max_results = input
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(ctx.config.capabilities.search.max_results);

        let api_base = ctx.config.capabilities.search.api_base.trim_end_matches('/');
        debug!(query = %query, api_base, "web search");

        let response = Client::new()
            .get(format!("{}/", api_base))
            .query(&[
                ("q", query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::Capability(format!("search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Capability(format!(
                "search endpoint returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Capability(format!("invalid search response: {}", e)))?;

        let abstract_text = body
            .get("AbstractText")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let mut results = Vec::new();
        if let Some(topics) = body.get("RelatedTopics").and_then(|v| v.as_array()) {
            for topic in topics {
                if let (Some(text), Some(url)) = (
                    topic.get("Text").and_then(|v| v.as_str()),
                    topic.get("FirstURL").and_then(|v| v.as_str()),
                ) {
                    results.push(json!({"text": text, "url": url}));
                    if results.len() >= max_results {
                        break;
                    }
                }
            }
        }

        Ok(json!({
            "query": query,
            "abstract": abstract_text,
            "results": results,
            "source": body.get("AbstractSource").cloned().unwrap_or(Value::Null),
        }))
    }
}
