//! Concurrent search execution.
//!
//! The `SearchExecutor` dispatches every sub-query of a plan at once and waits
//! for all of them to settle. One search failing, timing out, or panicking only
//! affects its own `SearchResult`.

use super::decomposition::{ResearchPlan, SubQuery};
use super::run::ResearchObserver;
use crate::error::SearchError;
use crate::search::{SearchProvider, SourceDocument};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Ok,
    Failed,
    TimedOut,
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchStatus::Ok => "ok",
            SearchStatus::Failed => "failed",
            SearchStatus::TimedOut => "timed_out",
        })
    }
}

/// The settled result of searching for one sub-query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub sub_query_id: Uuid,
    pub search_query: String,
    #[serde(default)]
    pub sources: Vec<SourceDocument>,
    pub status: SearchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl SearchResult {
    pub fn ok(sub_query: &SubQuery, sources: Vec<SourceDocument>, elapsed_ms: u64) -> Self {
        Self {
            sub_query_id: sub_query.id,
            search_query: sub_query.search_query.clone(),
            sources,
            status: SearchStatus::Ok,
            error: None,
            elapsed_ms,
        }
    }

    pub fn failed(sub_query: &SubQuery, error: String, elapsed_ms: u64) -> Self {
        Self {
            sub_query_id: sub_query.id,
            search_query: sub_query.search_query.clone(),
            sources: Vec::new(),
            status: SearchStatus::Failed,
            error: Some(error),
            elapsed_ms,
        }
    }

    pub fn timed_out(sub_query: &SubQuery, timeout_ms: u64) -> Self {
        Self {
            sub_query_id: sub_query.id,
            search_query: sub_query.search_query.clone(),
            sources: Vec::new(),
            status: SearchStatus::TimedOut,
            error: Some(SearchError::Timeout { timeout_ms }.to_string()),
            elapsed_ms: timeout_ms,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SearchStatus::Ok
    }
}

/// Runs all searches of a plan concurrently.
pub struct SearchExecutor {
    provider: Arc<dyn SearchProvider>,
    timeout: Duration,
}

impl SearchExecutor {
    pub fn new(provider: Arc<dyn SearchProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Search every sub-query and return one result per sub-query, in plan order.
    pub async fn search_all(&self, plan: &ResearchPlan, sources_per_query: usize) -> Vec<SearchResult> {
        self.search_all_observed(plan, sources_per_query, None).await
    }

    pub(crate) async fn search_all_observed(
        &self,
        plan: &ResearchPlan,
        sources_per_query: usize,
        observer: Option<&dyn ResearchObserver>,
    ) -> Vec<SearchResult> {
        let timeout_ms = self.timeout.as_millis() as u64;
        let mut tasks = JoinSet::new();
        let mut task_owner: HashMap<tokio::task::Id, Uuid> = HashMap::new();

        for sub_query in &plan.sub_queries {
            let provider = Arc::clone(&self.provider);
            let sub_query_owned = sub_query.clone();
            let timeout = self.timeout;
            let handle = tasks.spawn(async move {
                let started = Instant::now();
                let outcome =
                    tokio::time::timeout(timeout, provider.search(&sub_query_owned.search_query, sources_per_query))
                        .await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                match outcome {
                    Ok(Ok(sources)) => SearchResult::ok(&sub_query_owned, sources, elapsed_ms),
                    Ok(Err(SearchError::Timeout { timeout_ms })) => {
                        SearchResult::timed_out(&sub_query_owned, timeout_ms)
                    }
                    Ok(Err(e)) => SearchResult::failed(&sub_query_owned, e.to_string(), elapsed_ms),
                    Err(_) => SearchResult::timed_out(&sub_query_owned, timeout_ms),
                }
            });
            task_owner.insert(handle.id(), sub_query.id);
        }
        debug!(searches = plan.sub_queries.len(), provider = self.provider.name(), "Dispatched searches");

        let mut settled: HashMap<Uuid, SearchResult> = HashMap::with_capacity(plan.sub_queries.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            let result = match joined {
                Ok((_, result)) => result,
                Err(join_error) => {
                    let Some(sub_query) = task_owner
                        .get(&join_error.id())
                        .and_then(|id| plan.sub_query(*id))
                    else {
                        continue;
                    };
                    warn!(sub_query = %sub_query.id, error = %join_error, "Search task did not complete");
                    SearchResult::failed(sub_query, format!("search task aborted: {join_error}"), 0)
                }
            };
            match result.status {
                SearchStatus::Ok => debug!(
                    sub_query = %result.sub_query_id,
                    sources = result.sources.len(),
                    elapsed_ms = result.elapsed_ms,
                    "Search settled"
                ),
                _ => warn!(
                    sub_query = %result.sub_query_id,
                    status = %result.status,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Search did not succeed"
                ),
            }
            if let Some(observer) = observer {
                observer.on_search_settled(&result);
            }
            settled.insert(result.sub_query_id, result);
        }

        let results: Vec<SearchResult> = plan
            .sub_queries
            .iter()
            .map(|sub_query| {
                settled
                    .remove(&sub_query.id)
                    .unwrap_or_else(|| SearchResult::failed(sub_query, "search never settled".into(), 0))
            })
            .collect();
        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!(total = results.len(), failed, "All searches settled");
        results
    }
}
