//! Research run state machine.
//!
//! A `ResearchRun` is the aggregate root of one pipeline execution. It moves
//! strictly forward through its phases and is frozen (shared as
//! `Arc<ResearchRun>`) once it reaches `Done`.

use super::analysis::Finding;
use super::decomposition::ResearchPlan;
use super::output::ResearchReport;
use super::search::SearchResult;
use crate::config::ResearchDepth;
use crate::error::PipelineError;
use crate::mode::ExecutionMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Current phase of a research run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    /// Decomposing the question.
    Planning,
    /// Waiting for all searches to settle.
    Searching,
    /// Extracting findings.
    Analyzing,
    /// Writing the report.
    Synthesizing,
    /// Report produced.
    Done,
    /// Aborted by a defect.
    Failed,
}

impl ResearchPhase {
    /// The only phase this one may move to, other than `Failed`.
    pub fn next(self) -> Option<ResearchPhase> {
        match self {
            ResearchPhase::Planning => Some(ResearchPhase::Searching),
            ResearchPhase::Searching => Some(ResearchPhase::Analyzing),
            ResearchPhase::Analyzing => Some(ResearchPhase::Synthesizing),
            ResearchPhase::Synthesizing => Some(ResearchPhase::Done),
            ResearchPhase::Done | ResearchPhase::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ResearchPhase::Done | ResearchPhase::Failed)
    }

    /// Rough completion fraction for progress display.
    pub fn progress(self) -> f32 {
        match self {
            ResearchPhase::Planning => 0.1,
            ResearchPhase::Searching => 0.3,
            ResearchPhase::Analyzing => 0.6,
            ResearchPhase::Synthesizing => 0.85,
            ResearchPhase::Done | ResearchPhase::Failed => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResearchPhase::Planning => "planning",
            ResearchPhase::Searching => "searching",
            ResearchPhase::Analyzing => "analyzing",
            ResearchPhase::Synthesizing => "synthesizing",
            ResearchPhase::Done => "done",
            ResearchPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A degradation that was absorbed by a fallback. Never fails the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// A live capability could not be used; the simulated one ran instead.
    CapabilityUnavailable { capability: String, reason: String },
    /// Planning failed twice; the template decomposition was used.
    PlanningFallback { reason: String },
    /// Extraction failed twice for one result; snippets were used.
    AnalysisFallback { sub_query_id: Uuid, reason: String },
    /// Some searches failed or timed out.
    PartialCoverage {
        failed: usize,
        timed_out: usize,
        total: usize,
    },
    /// Synthesis failed twice; the template report was used.
    SynthesisFallback { reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::CapabilityUnavailable { capability, reason } => {
                write!(f, "{capability} ran in simulated mode: {reason}")
            }
            Notice::PlanningFallback { reason } => {
                write!(f, "planning used the template decomposition: {reason}")
            }
            Notice::AnalysisFallback {
                sub_query_id,
                reason,
            } => write!(
                f,
                "findings for sub-query {sub_query_id} were taken from snippets: {reason}"
            ),
            Notice::PartialCoverage {
                failed,
                timed_out,
                total,
            } => write!(
                f,
                "{} of {total} searches did not succeed ({failed} failed, {timed_out} timed out)",
                failed + timed_out
            ),
            Notice::SynthesisFallback { reason } => {
                write!(f, "report was written from the template: {reason}")
            }
        }
    }
}

/// One execution of the research pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRun {
    pub id: Uuid,
    pub query: String,
    pub depth: ResearchDepth,
    pub mode: ExecutionMode,
    pub phase: ResearchPhase,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ResearchPlan>,
    #[serde(default)]
    pub search_results: Vec<SearchResult>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ResearchReport>,
    #[serde(default)]
    pub notices: Vec<Notice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResearchRun {
    /// Start a run in the `Planning` phase.
    pub fn new(query: impl Into<String>, depth: ResearchDepth, mode: ExecutionMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            depth,
            mode,
            phase: ResearchPhase::Planning,
            started_at: Utc::now(),
            completed_at: None,
            plan: None,
            search_results: Vec::new(),
            findings: Vec::new(),
            report: None,
            notices: Vec::new(),
            error: None,
        }
    }

    /// Move to the next phase. Skipping or re-entering a phase is rejected.
    pub fn transition(&mut self, to: ResearchPhase) -> Result<(), PipelineError> {
        if self.phase.next() != Some(to) {
            return Err(PipelineError::InvalidTransition {
                from: self.phase.to_string(),
                to: to.to_string(),
            });
        }
        self.phase = to;
        if to == ResearchPhase::Done {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Mark the run as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.phase = ResearchPhase::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn is_complete(&self) -> bool {
        self.phase == ResearchPhase::Done
    }

    /// Wall-clock duration in milliseconds, once finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// Number of searches that returned sources successfully.
    pub fn successful_searches(&self) -> usize {
        self.search_results.iter().filter(|r| r.is_ok()).count()
    }
}

/// Receives progress events from a running pipeline.
pub trait ResearchObserver: Send + Sync {
    /// Called when the run enters a new phase.
    fn on_phase_change(&self, run_id: Uuid, phase: ResearchPhase);
    /// Called as each search settles, in completion order.
    fn on_search_settled(&self, result: &SearchResult);
}

/// No-op observer.
pub struct NoOpObserver;

impl ResearchObserver for NoOpObserver {
    fn on_phase_change(&self, _run_id: Uuid, _phase: ResearchPhase) {}
    fn on_search_settled(&self, _result: &SearchResult) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::CapabilityMode;

    fn run() -> ResearchRun {
        ResearchRun::new("q", ResearchDepth::Quick, ExecutionMode::simulated())
    }

    #[test]
    fn test_forward_transitions() {
        let mut run = run();
        assert_eq!(run.phase, ResearchPhase::Planning);
        for phase in [
            ResearchPhase::Searching,
            ResearchPhase::Analyzing,
            ResearchPhase::Synthesizing,
            ResearchPhase::Done,
        ] {
            run.transition(phase).unwrap();
        }
        assert!(run.is_complete());
        assert!(run.completed_at.is_some());
        assert!(run.duration_ms().unwrap() >= 0);
        assert_eq!(run.mode.language_model, CapabilityMode::Simulated);
    }

    #[test]
    fn test_skipping_is_rejected() {
        let mut run = run();
        let err = run.transition(ResearchPhase::Analyzing).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidTransition {
                from: "planning".into(),
                to: "analyzing".into()
            }
        );
        assert_eq!(run.phase, ResearchPhase::Planning);
    }

    #[test]
    fn test_reentering_is_rejected() {
        let mut run = run();
        run.transition(ResearchPhase::Searching).unwrap();
        assert!(run.transition(ResearchPhase::Searching).is_err());
        assert!(run.transition(ResearchPhase::Planning).is_err());
    }

    #[test]
    fn test_done_is_terminal() {
        let mut run = run();
        run.phase = ResearchPhase::Done;
        assert!(run.transition(ResearchPhase::Failed).is_err());
        assert!(ResearchPhase::Done.is_terminal());
        assert_eq!(ResearchPhase::Done.next(), None);
    }

    #[test]
    fn test_fail() {
        let mut run = run();
        run.fail("invalid transition");
        assert_eq!(run.phase, ResearchPhase::Failed);
        assert_eq!(run.error.as_deref(), Some("invalid transition"));
    }

    #[test]
    fn test_notice_display() {
        let notice = Notice::PartialCoverage {
            failed: 1,
            timed_out: 1,
            total: 5,
        };
        assert_eq!(
            notice.to_string(),
            "2 of 5 searches did not succeed (1 failed, 1 timed out)"
        );
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["kind"], "partial_coverage");
    }
}
