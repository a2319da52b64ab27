//! Web search capability.
//!
//! Defines the `SearchProvider` trait and the two adapters behind it: a live
//! Serper (Google) client and a deterministic simulated corpus.

pub mod serper;
pub mod simulated;

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use serper::SerperSearch;
pub use simulated::SimulatedSearch;

/// One source returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

impl SourceDocument {
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

/// Trait for web search capabilities, live or simulated.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query and return at most `max_results` sources.
    async fn search(&self, query: &str, max_results: usize)
    -> Result<Vec<SourceDocument>, SearchError>;

    /// Return the provider name.
    fn name(&self) -> &str;

    fn is_simulated(&self) -> bool {
        false
    }
}
