//! Report synthesis.
//!
//! The `Synthesizer` turns the full finding set into a `ResearchReport`. Every
//! sub-query that was not well covered is named under `limitations`, whether the
//! report came from the model or from the template.

use super::analysis::Finding;
use super::confidence::{Confidence, ConfidenceSummary};
use super::decomposition::ResearchPlan;
use super::output::{Insight, ResearchReport};
use super::run::Notice;
use super::search::{SearchResult, SearchStatus};
use crate::brain::{
    CompletionRequest, FindingDigest, LanguageModel, PromptContext, SectionDigest,
    complete_with_retry,
};
use crate::config::SleuthConfig;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const SUMMARY_STATEMENTS: usize = 3;
const MAX_CONCLUSIONS: usize = 5;

/// Why a sub-query counts as poorly covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapReason {
    SearchFailed,
    SearchTimedOut,
    NoSources,
    NoFindings,
    LowConfidenceOnly,
}

impl GapReason {
    pub fn describe(self) -> &'static str {
        match self {
            GapReason::SearchFailed => "the search failed",
            GapReason::SearchTimedOut => "the search timed out",
            GapReason::NoSources => "the search returned no sources",
            GapReason::NoFindings => "no findings could be extracted",
            GapReason::LowConfidenceOnly => "only low-confidence findings were found",
        }
    }
}

/// A sub-query the report must disclose as poorly covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub sub_query_id: Uuid,
    pub sub_question: String,
    pub reason: GapReason,
}

impl CoverageGap {
    /// The limitation line naming this gap.
    pub fn limitation(&self) -> String {
        format!(
            "Coverage gap for \"{}\": {}.",
            self.sub_question,
            self.reason.describe()
        )
    }
}

/// Find every poorly covered sub-query, in plan order.
pub fn coverage_gaps(
    plan: &ResearchPlan,
    search_results: &[SearchResult],
    findings: &[Finding],
) -> Vec<CoverageGap> {
    plan.sub_queries
        .iter()
        .filter_map(|sub_query| {
            let result = search_results.iter().find(|r| r.sub_query_id == sub_query.id);
            let own: Vec<&Finding> = findings
                .iter()
                .filter(|f| f.sub_query_id == sub_query.id)
                .collect();
            let reason = match result {
                None => GapReason::SearchFailed,
                Some(r) if r.status == SearchStatus::Failed => GapReason::SearchFailed,
                Some(r) if r.status == SearchStatus::TimedOut => GapReason::SearchTimedOut,
                Some(r) if r.sources.is_empty() => GapReason::NoSources,
                Some(_) if own.is_empty() => GapReason::NoFindings,
                Some(_) if own.iter().all(|f| f.confidence == Confidence::Low) => {
                    GapReason::LowConfidenceOnly
                }
                Some(_) => return None,
            };
            Some(CoverageGap {
                sub_query_id: sub_query.id,
                sub_question: sub_query.sub_question.clone(),
                reason,
            })
        })
        .collect()
}

/// Group findings by sub-question in plan order, strongest first within a group.
pub fn sections(plan: &ResearchPlan, findings: &[Finding]) -> Vec<SectionDigest> {
    plan.sub_queries
        .iter()
        .map(|sub_query| {
            let mut digests: Vec<FindingDigest> = findings
                .iter()
                .filter(|f| f.sub_query_id == sub_query.id)
                .map(|f| FindingDigest {
                    statement: f.statement.clone(),
                    confidence: f.confidence,
                    corroborated: f.corroborated,
                })
                .collect();
            // Stable sort keeps extraction order among equals.
            digests.sort_by(|a, b| b.confidence.cmp(&a.confidence));
            SectionDigest {
                sub_question: sub_query.sub_question.clone(),
                findings: digests,
            }
        })
        .collect()
}

/// Deterministic report used in simulated mode and as the synthesis fallback.
///
/// The confidence summary is left at its default; the caller attaches it.
pub fn template_report(query: &str, sections: &[SectionDigest], gaps: &[CoverageGap]) -> ResearchReport {
    let all: Vec<&FindingDigest> = sections.iter().flat_map(|s| &s.findings).collect();
    let strongest = all.iter().map(|f| f.confidence).max();
    let covered = sections.iter().filter(|s| !s.findings.is_empty()).count();

    let executive_summary = match strongest {
        None => format!(
            "No findings could be established for \"{query}\": none of the {} sub-questions produced usable sources.",
            sections.len()
        ),
        Some(level) => {
            let lead: Vec<&str> = all
                .iter()
                .filter(|f| f.confidence == level)
                .take(SUMMARY_STATEMENTS)
                .map(|f| f.statement.as_str())
                .collect();
            format!(
                "Research on \"{query}\" produced {} findings covering {covered} of {} sub-questions. {}",
                all.len(),
                sections.len(),
                lead.join(" ")
            )
        }
    };

    let insights = sections
        .iter()
        .filter_map(|section| {
            let best = section.findings.first()?;
            let mut explanation = best.statement.clone();
            if best.corroborated {
                explanation.push_str(" Corroborated by an independent source.");
            }
            Some(Insight {
                title: section.sub_question.clone(),
                explanation,
            })
        })
        .collect();

    let mut conclusions: Vec<String> = all
        .iter()
        .filter(|f| f.confidence == Confidence::High)
        .take(MAX_CONCLUSIONS)
        .map(|f| f.statement.clone())
        .collect();
    if conclusions.is_empty() {
        conclusions.push(format!(
            "The available evidence on \"{query}\" is tentative: no finding reached high confidence."
        ));
    }

    let limitations = gaps.iter().map(CoverageGap::limitation).collect();

    let mut recommendations: Vec<String> = gaps
        .iter()
        .map(|gap| {
            format!(
                "Investigate \"{}\" further with additional or more authoritative sources.",
                gap.sub_question
            )
        })
        .collect();
    recommendations.push("Verify key statements against primary sources before relying on them.".into());

    ResearchReport {
        executive_summary,
        insights,
        conclusions,
        limitations,
        recommendations,
        confidence_summary: ConfidenceSummary::default(),
    }
}

/// Make sure every gap is named in `limitations`.
fn disclose_gaps(report: &mut ResearchReport, gaps: &[CoverageGap]) {
    for gap in gaps {
        let named = report
            .limitations
            .iter()
            .any(|l| l.contains(&gap.sub_question));
        if !named {
            report.limitations.push(gap.limitation());
        }
    }
}

fn parse_report(value: serde_json::Value) -> Result<ResearchReport, LlmError> {
    let report: ResearchReport =
        serde_json::from_value(value).map_err(|e| LlmError::MalformedResponse {
            message: format!("report does not match schema: {e}"),
        })?;
    if report.executive_summary.trim().is_empty() {
        return Err(LlmError::MalformedResponse {
            message: "empty executive_summary".into(),
        });
    }
    Ok(report)
}

/// Writes the final report of a run.
pub struct Synthesizer {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, config: &SleuthConfig) -> Self {
        Self {
            model,
            temperature: config.research.synthesizer_temperature,
            timeout: config.llm.timeout(),
        }
    }

    pub async fn synthesize(
        &self,
        query: &str,
        plan: &ResearchPlan,
        search_results: &[SearchResult],
        findings: &[Finding],
        summary: ConfidenceSummary,
    ) -> ResearchReport {
        self.synthesize_with_notice(query, plan, search_results, findings, summary)
            .await
            .0
    }

    pub(crate) async fn synthesize_with_notice(
        &self,
        query: &str,
        plan: &ResearchPlan,
        search_results: &[SearchResult],
        findings: &[Finding],
        summary: ConfidenceSummary,
    ) -> (ResearchReport, Option<Notice>) {
        let gaps = coverage_gaps(plan, search_results, findings);
        let sections = sections(plan, findings);
        let request = CompletionRequest::new(
            PromptContext::Synthesize {
                query: query.to_string(),
                overall_score: summary.overall_score,
                sections: sections.clone(),
                coverage_gaps: gaps.clone(),
            },
            self.temperature,
        );

        let (mut report, notice) =
            match complete_with_retry(self.model.as_ref(), &request, self.timeout, parse_report).await {
                Ok(report) => (report, None),
                Err(e) => {
                    warn!(error = %e, "Synthesis failed, using template report");
                    (
                        template_report(query, &sections, &gaps),
                        Some(Notice::SynthesisFallback {
                            reason: e.to_string(),
                        }),
                    )
                }
            };
        disclose_gaps(&mut report, &gaps);
        report.confidence_summary = summary;
        info!(
            insights = report.insights.len(),
            gaps = gaps.len(),
            score = summary.overall_score,
            "Report synthesized"
        );
        (report, notice)
    }
}
