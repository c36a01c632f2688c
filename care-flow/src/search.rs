//! Serper (Google search API) backed [`Retriever`]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::fmt;
use tracing::{info, warn};

use crate::{
    engine::{Retriever, SearchHit},
    error::{FlowError, Result},
};

pub const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
/// Organic results requested per query
const NUM_RESULTS: usize = 5;

#[derive(Clone)]
pub struct SerperSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: SERPER_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl fmt::Debug for SerperSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerperSearch")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Retriever for SerperSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        info!(query = %query, "Searching the web");

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": NUM_RESULTS }))
            .send()
            .await
            .map_err(|e| FlowError::Upstream(format!("web search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Web search returned an error");
            return Err(FlowError::Upstream(format!(
                "web search returned {}: {}",
                status, body
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| FlowError::Upstream(format!("failed to parse web search response: {}", e)))?;

        let mut hits = parse_organic_results(&data);
        hits.truncate(NUM_RESULTS);
        Ok(hits)
    }
}

/// Reads the `organic` array of a Serper response; entries without a title are skipped
pub fn parse_organic_results(data: &Value) -> Vec<SearchHit> {
    data["organic"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let title = entry["title"].as_str()?;
                    Some(SearchHit {
                        title: title.to_string(),
                        link: entry["link"].as_str().unwrap_or_default().to_string(),
                        snippet: entry["snippet"].as_str().unwrap_or_default().to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_organic_entries() {
        let data = json!({
            "searchParameters": { "q": "fever cough" },
            "organic": [
                { "title": "Influenza", "link": "https://a.example", "snippet": "Flu symptoms" },
                { "link": "https://no-title.example" },
                { "title": "Common cold", "link": "https://b.example" }
            ]
        });

        let hits = parse_organic_results(&data);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Influenza");
        assert_eq!(hits[0].snippet, "Flu symptoms");
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn missing_organic_section_yields_no_hits() {
        assert!(parse_organic_results(&json!({ "answerBox": {} })).is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_upstream_error() {
        let search = SerperSearch::new("key").with_endpoint("http://127.0.0.1:9/search");

        let error = search.search("fever").await.unwrap_err();
        assert!(matches!(error, FlowError::Upstream(_)));
    }
}
