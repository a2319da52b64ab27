//! Research report data and markdown rendering.

use super::confidence::ConfidenceSummary;
use super::run::ResearchRun;
use super::search::SearchStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One key insight of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(alias = "insight")]
    pub title: String,
    #[serde(default)]
    pub explanation: String,
}

/// The terminal artifact of a research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub executive_summary: String,
    #[serde(default, alias = "key_insights")]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub conclusions: Vec<String>,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub confidence_summary: ConfidenceSummary,
}

/// Output format for rendering a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Summary, confidence and limitations only.
    Summary,
    /// Every report section plus sources and notices.
    #[default]
    DetailedReport,
}

/// Renders research runs as markdown.
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn render(run: &ResearchRun, format: OutputFormat) -> String {
        match format {
            OutputFormat::Summary => Self::render_summary(run),
            OutputFormat::DetailedReport => Self::render_detailed(run),
        }
    }

    fn header(run: &ResearchRun) -> String {
        format!(
            "# Research Report: {}\n\n_Depth: {} | Mode: {} | Run: {}_\n\n",
            run.query, run.depth, run.mode, run.id
        )
    }

    fn render_summary(run: &ResearchRun) -> String {
        let mut out = Self::header(run);
        let Some(report) = &run.report else {
            out.push_str(&format!("Run did not complete (phase: {}).\n", run.phase));
            if let Some(error) = &run.error {
                out.push_str(&format!("\nError: {error}\n"));
            }
            return out;
        };
        out.push_str(&report.executive_summary);
        out.push_str("\n\n");
        out.push_str(&Self::confidence_line(&report.confidence_summary));
        if !report.limitations.is_empty() {
            out.push_str("\n## Limitations\n\n");
            for limitation in &report.limitations {
                out.push_str(&format!("- {limitation}\n"));
            }
        }
        out
    }

    fn render_detailed(run: &ResearchRun) -> String {
        let mut out = Self::render_summary(run);
        let Some(report) = &run.report else {
            return out;
        };

        if !report.insights.is_empty() {
            out.push_str("\n## Key Insights\n\n");
            for (i, insight) in report.insights.iter().enumerate() {
                out.push_str(&format!("{}. **{}**", i + 1, insight.title));
                if !insight.explanation.is_empty() {
                    out.push_str(&format!(": {}", insight.explanation));
                }
                out.push('\n');
            }
        }

        if !report.conclusions.is_empty() {
            out.push_str("\n## Conclusions\n\n");
            for conclusion in &report.conclusions {
                out.push_str(&format!("- {conclusion}\n"));
            }
        }

        if !report.recommendations.is_empty() {
            out.push_str("\n## Recommendations\n\n");
            for recommendation in &report.recommendations {
                out.push_str(&format!("- {recommendation}\n"));
            }
        }

        out.push_str("\n## Searches\n\n");
        for result in &run.search_results {
            let mark = match result.status {
                SearchStatus::Ok => format!("{} sources", result.sources.len()),
                status => status.to_string(),
            };
            out.push_str(&format!("- `{}` ({mark})\n", result.search_query));
        }

        let mut seen = BTreeSet::new();
        let sources: Vec<_> = run
            .search_results
            .iter()
            .flat_map(|r| &r.sources)
            .filter(|s| seen.insert(s.url.as_str()))
            .collect();
        if !sources.is_empty() {
            out.push_str("\n## Sources\n\n");
            for source in sources {
                out.push_str(&format!("- [{}]({})\n", source.title, source.url));
            }
        }

        if !run.notices.is_empty() {
            out.push_str("\n## Notices\n\n");
            for notice in &run.notices {
                out.push_str(&format!("- {notice}\n"));
            }
        }
        out
    }

    fn confidence_line(summary: &ConfidenceSummary) -> String {
        format!(
            "**Confidence:** {:.0}% ({}) | **Findings:** {} high, {} medium, {} low\n",
            summary.overall_score * 100.0,
            summary.label(),
            summary.high,
            summary.medium,
            summary.low,
        )
    }
}
