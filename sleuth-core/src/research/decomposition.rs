//! Question decomposition into sub-queries.
//!
//! The `Planner` breaks a research question into exactly as many sub-questions
//! as the requested depth calls for, each paired with a web search string.

use super::run::Notice;
use crate::brain::{CompletionRequest, LanguageModel, PromptContext, complete_with_retry};
use crate::config::{ResearchDepth, SleuthConfig};
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// A single sub-query derived from the main research question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    /// Unique identifier.
    pub id: Uuid,
    /// The sub-question to answer.
    pub sub_question: String,
    /// The string sent to the search provider.
    pub search_query: String,
}

impl SubQuery {
    pub fn new(sub_question: impl Into<String>, search_query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sub_question: sub_question.into(),
            search_query: search_query.into(),
        }
    }
}

/// Ordered decomposition of one research question. Read-only once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub query: String,
    pub depth: ResearchDepth,
    pub sub_queries: Vec<SubQuery>,
}

impl ResearchPlan {
    pub fn sub_query(&self, id: Uuid) -> Option<&SubQuery> {
        self.sub_queries.iter().find(|q| q.id == id)
    }
}

/// A sub-question/search pair before it is assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedQuestion {
    pub question: String,
    pub search_query: String,
}

/// The fixed decomposition used in simulated mode and as the planning fallback.
///
/// Returns the first `count` of eight templates (all eight when `count` exceeds them).
pub fn template_questions(query: &str, count: usize) -> Vec<PlannedQuestion> {
    let templates = [
        (format!("What are the fundamentals of {query}?"), format!("{query} explained")),
        (format!("What are current trends in {query}?"), format!("{query} latest trends")),
        (format!("What do experts say about {query}?"), format!("{query} expert analysis")),
        (format!("What are the main challenges facing {query}?"), format!("{query} challenges problems")),
        (format!("What is the future outlook for {query}?"), format!("{query} future predictions")),
        (format!("What data and statistics describe {query}?"), format!("{query} statistics data")),
        (format!("How is {query} regulated?"), format!("{query} policy regulation")),
        (format!("What are notable case studies of {query}?"), format!("{query} case studies")),
    ];
    templates
        .into_iter()
        .take(count)
        .map(|(question, search_query)| PlannedQuestion {
            question,
            search_query,
        })
        .collect()
}

/// Parse a live planning answer into exactly `count` questions.
///
/// Extra entries are dropped; too few entries or a blank field is malformed.
fn parse_plan(value: Value, count: usize) -> Result<Vec<PlannedQuestion>, LlmError> {
    let entries = value
        .get("sub_questions")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::MalformedResponse {
            message: "missing field `sub_questions`".into(),
        })?;
    if entries.len() < count {
        return Err(LlmError::MalformedResponse {
            message: format!("expected {count} sub-questions, got {}", entries.len()),
        });
    }

    let text = |entry: &Value, keys: &[&str]| {
        keys.iter()
            .find_map(|k| entry.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    entries
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, entry)| {
            let question = text(entry, &["question", "sub_question"]);
            let search_query = text(entry, &["search_query", "query"]);
            match (question, search_query) {
                (Some(question), Some(search_query)) => Ok(PlannedQuestion {
                    question,
                    search_query,
                }),
                _ => Err(LlmError::MalformedResponse {
                    message: format!("sub-question {} has a blank field", i + 1),
                }),
            }
        })
        .collect()
}

/// Decomposes research questions into plans.
pub struct Planner {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    timeout: Duration,
}

impl Planner {
    pub fn new(model: Arc<dyn LanguageModel>, config: &SleuthConfig) -> Self {
        Self {
            model,
            temperature: config.research.planner_temperature,
            timeout: config.llm.timeout(),
        }
    }

    /// Plan `query` at `depth`. Always returns exactly `depth.sub_query_count()` sub-queries.
    pub async fn plan(&self, query: &str, depth: ResearchDepth) -> ResearchPlan {
        self.plan_with_notice(query, depth).await.0
    }

    pub(crate) async fn plan_with_notice(
        &self,
        query: &str,
        depth: ResearchDepth,
    ) -> (ResearchPlan, Option<Notice>) {
        let count = depth.sub_query_count();
        let request = CompletionRequest::new(
            PromptContext::Plan {
                query: query.to_string(),
                count,
            },
            self.temperature,
        );

        let (questions, notice) = match complete_with_retry(
            self.model.as_ref(),
            &request,
            self.timeout,
            |value| parse_plan(value, count),
        )
        .await
        {
            Ok(questions) => (questions, None),
            Err(e) => {
                warn!(error = %e, "Planning failed, using template decomposition");
                (
                    template_questions(query, count),
                    Some(Notice::PlanningFallback {
                        reason: e.to_string(),
                    }),
                )
            }
        };

        let sub_queries: Vec<SubQuery> = questions
            .into_iter()
            .map(|q| SubQuery::new(q.question, q.search_query))
            .collect();
        info!(query, %depth, sub_queries = sub_queries.len(), "Research plan ready");

        (
            ResearchPlan {
                query: query.to_string(),
                depth,
                sub_queries,
            },
            notice,
        )
    }
}
