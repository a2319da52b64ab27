//! Finding extraction.
//!
//! The `Analyzer` turns each successful search result into a bounded list of
//! confidence-rated findings, then applies corroboration across the whole set.

use super::confidence::Confidence;
use super::corroboration::CorroborationPolicy;
use super::decomposition::{ResearchPlan, SubQuery};
use super::run::Notice;
use super::search::SearchResult;
use super::sources::SourceType;
use crate::brain::{CompletionRequest, LanguageModel, PromptContext, complete_with_retry};
use crate::config::SleuthConfig;
use crate::error::LlmError;
use crate::search::SourceDocument;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A single confidence-rated statement taken from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub sub_query_id: Uuid,
    pub source_url: String,
    pub source_type: SourceType,
    pub statement: String,
    pub confidence: Confidence,
    /// Whether an independent finding backed this one up.
    #[serde(default)]
    pub corroborated: bool,
}

/// A statement as extracted by the model, before source checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedStatement {
    pub statement: String,
    /// 1-based index into the result's sources.
    pub source: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl ExtractedStatement {
    /// Resolve against the cited source and cap confidence by its type.
    ///
    /// Returns `None` for blank statements or citations of unknown sources.
    pub fn into_finding(self, sub_query_id: Uuid, sources: &[SourceDocument]) -> Option<Finding> {
        let statement = self.statement.trim();
        if statement.is_empty() || self.source == 0 {
            return None;
        }
        let source = sources.get(self.source - 1)?;
        let source_type = SourceType::classify(&source.url);
        let ceiling = source_type.ceiling();
        Some(Finding {
            sub_query_id,
            source_url: source.url.clone(),
            source_type,
            statement: statement.to_string(),
            confidence: self.confidence.map_or(ceiling, |rated| rated.min(ceiling)),
            corroborated: false,
        })
    }
}

/// Deterministic extraction: the leading sentence of each source snippet.
pub fn snippet_statements(sources: &[SourceDocument], max: usize) -> Vec<ExtractedStatement> {
    sources
        .iter()
        .enumerate()
        .filter_map(|(i, source)| {
            let text = if source.snippet.trim().is_empty() {
                source.title.trim()
            } else {
                source.snippet.trim()
            };
            let sentence = leading_sentence(text)?;
            Some(ExtractedStatement {
                statement: sentence,
                source: i + 1,
                confidence: None,
            })
        })
        .take(max)
        .collect()
}

fn leading_sentence(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let end = text
        .match_indices(". ")
        .next()
        .map_or(text.len(), |(idx, _)| idx + 1);
    let mut sentence = text[..end].trim().to_string();
    if !sentence.ends_with(['.', '!', '?']) {
        sentence.push('.');
    }
    Some(sentence)
}

/// Lenient parse of the model's `{"findings": [...]}` answer.
///
/// Entries that do not cite one of the `source_count` sources are dropped. An
/// answer with nothing usable left is malformed.
fn parse_extraction(value: Value, source_count: usize) -> Result<Vec<ExtractedStatement>, LlmError> {
    let entries = value
        .get("findings")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::MalformedResponse {
            message: "missing field `findings`".into(),
        })?;
    let statements: Vec<ExtractedStatement> = entries
        .iter()
        .filter_map(|entry| {
            let statement = entry.get("statement")?.as_str()?.to_string();
            let source = match entry.get("source")? {
                Value::Number(n) => usize::try_from(n.as_u64()?).ok()?,
                Value::String(s) => s.trim_matches(|c: char| !c.is_ascii_digit()).parse().ok()?,
                _ => return None,
            };
            let confidence = entry
                .get("confidence")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok());
            Some(ExtractedStatement {
                statement,
                source,
                confidence,
            })
        })
        .filter(|s| !s.statement.trim().is_empty() && (1..=source_count).contains(&s.source))
        .collect();
    if statements.is_empty() {
        return Err(LlmError::MalformedResponse {
            message: format!("no findings cite one of the {source_count} sources"),
        });
    }
    Ok(statements)
}

/// Extracts findings from search results.
pub struct Analyzer {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    timeout: Duration,
    max_findings: usize,
    corroboration_threshold: f64,
}

impl Analyzer {
    pub fn new(model: Arc<dyn LanguageModel>, config: &SleuthConfig) -> Self {
        Self {
            model,
            temperature: config.research.analyzer_temperature,
            timeout: config.llm.timeout(),
            max_findings: config.research.max_findings_per_source,
            corroboration_threshold: config.research.corroboration_threshold,
        }
    }

    /// Findings for one search result, before corroboration.
    pub async fn analyze(&self, query: &str, sub_query: &SubQuery, result: &SearchResult) -> Vec<Finding> {
        self.analyze_one(query, sub_query, result).await.0
    }

    async fn analyze_one(
        &self,
        query: &str,
        sub_query: &SubQuery,
        result: &SearchResult,
    ) -> (Vec<Finding>, Option<Notice>) {
        if !result.is_ok() || result.sources.is_empty() {
            debug!(sub_query = %sub_query.id, status = %result.status, "Nothing to analyze");
            return (Vec::new(), None);
        }

        let request = CompletionRequest::new(
            PromptContext::Extract {
                query: query.to_string(),
                sub_question: sub_query.sub_question.clone(),
                sources: result.sources.clone(),
                max_findings: self.max_findings,
            },
            self.temperature,
        );

        let (statements, notice) =
            match complete_with_retry(self.model.as_ref(), &request, self.timeout, |value| {
                parse_extraction(value, result.sources.len())
            })
            .await
            {
                Ok(statements) => (statements, None),
                Err(e) => {
                    warn!(sub_query = %sub_query.id, error = %e, "Extraction failed, using source snippets");
                    (
                        snippet_statements(&result.sources, self.max_findings),
                        Some(Notice::AnalysisFallback {
                            sub_query_id: sub_query.id,
                            reason: e.to_string(),
                        }),
                    )
                }
            };

        let findings: Vec<Finding> = statements
            .into_iter()
            .filter_map(|s| s.into_finding(sub_query.id, &result.sources))
            .take(self.max_findings)
            .collect();
        debug!(sub_query = %sub_query.id, findings = findings.len(), "Analyzed search result");
        (findings, notice)
    }

    /// Analyze every result concurrently, then apply corroboration.
    ///
    /// `results` must be in plan order. Findings come back grouped by sub-query
    /// in plan order.
    pub async fn analyze_all(
        &self,
        plan: &ResearchPlan,
        results: &[SearchResult],
    ) -> (Vec<Finding>, Vec<Notice>) {
        let analyses = join_all(
            plan.sub_queries
                .iter()
                .zip(results)
                .map(|(sub_query, result)| self.analyze_one(&plan.query, sub_query, result)),
        )
        .await;

        let mut findings = Vec::new();
        let mut notices = Vec::new();
        for (mut batch, notice) in analyses {
            findings.append(&mut batch);
            notices.extend(notice);
        }

        let policy = CorroborationPolicy::new(self.corroboration_threshold, &plan.query);
        let corroborated = policy.apply(&mut findings);
        info!(
            findings = findings.len(),
            corroborated,
            fallbacks = notices.len(),
            "Analysis complete"
        );
        (findings, notices)
    }
}
