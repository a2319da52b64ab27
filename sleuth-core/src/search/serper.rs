//! Live web search through the Serper (Google) API.

use super::{SearchProvider, SourceDocument};
use crate::config::SearchConfig;
use crate::error::SearchError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://google.serper.dev";

/// Serper search client.
pub struct SerperSearch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearch {
    pub fn new(config: &SearchConfig, api_key: String) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SearchError::Unavailable {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            base_url,
            api_key,
            timeout_ms: config.timeout_ms,
        })
    }

    /// Convert a Serper response body into sources, dropping entries without a link.
    fn parse_response(body: &str, max_results: usize) -> Result<Vec<SourceDocument>, SearchError> {
        let response: SerperResponse =
            serde_json::from_str(body).map_err(|e| SearchError::Unavailable {
                message: format!("Invalid search response: {e}"),
            })?;
        Ok(response
            .organic
            .into_iter()
            .filter(|r| !r.link.trim().is_empty())
            .take(max_results)
            .map(|r| SourceDocument::new(r.link, r.title, r.snippet))
            .collect())
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SourceDocument>, SearchError> {
        let url = format!("{}/search", self.base_url);
        debug!(url = %url, query, max_results, "Sending Serper search request");

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": max_results }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    SearchError::Unavailable {
                        message: format!("Request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SearchError::Unavailable {
            message: format!("Failed to read response body: {e}"),
        })?;
        if !status.is_success() {
            return Err(SearchError::Unavailable {
                message: format!("HTTP {status}: {body}"),
            });
        }
        Self::parse_response(&body, max_results)
    }

    fn name(&self) -> &str {
        "serper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "searchParameters": {"q": "heat pumps"},
            "organic": [
                {"title": "Heat pumps", "link": "https://www.energy.gov/heat-pumps", "snippet": "Heat pumps move heat.", "position": 1},
                {"title": "No link", "snippet": "dropped"},
                {"title": "Review", "link": "https://example.org/review", "snippet": "A review."},
                {"title": "Third", "link": "https://example.net/3", "snippet": "Third."}
            ]
        }"#;
        let sources = SerperSearch::parse_response(body, 2).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].url, "https://www.energy.gov/heat-pumps");
        assert_eq!(sources[1].title, "Review");
    }

    #[test]
    fn test_parse_response_without_organic() {
        let sources = SerperSearch::parse_response("{}", 5).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_parse_response_invalid() {
        let err = SerperSearch::parse_response("<html>", 5).unwrap_err();
        assert!(matches!(err, SearchError::Unavailable { .. }));
    }

    #[test]
    fn test_base_url_override() {
        let config = SearchConfig {
            base_url: Some("http://localhost:9000/".into()),
            ..SearchConfig::default()
        };
        let search = SerperSearch::new(&config, "k".repeat(32)).unwrap();
        assert_eq!(search.base_url, "http://localhost:9000");
        assert_eq!(search.name(), "serper");
    }
}
