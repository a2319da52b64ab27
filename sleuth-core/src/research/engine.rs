//! Research engine: orchestrates the research pipeline.
//!
//! One call to [`ResearchEngine::run_research`] runs Planning → Searching →
//! Analyzing → Synthesizing → Done for a single request and returns the frozen
//! run. Runs share no mutable state; the engine can serve many concurrently.

use super::analysis::Analyzer;
use super::confidence::ConfidenceSummary;
use super::decomposition::Planner;
use super::run::{NoOpObserver, Notice, ResearchObserver, ResearchPhase, ResearchRun};
use super::search::{SearchExecutor, SearchStatus};
use super::synthesis::Synthesizer;
use crate::config::{ResearchDepth, SleuthConfig};
use crate::error::{RequestError, SleuthError};
use crate::history::ResearchHistory;
use crate::mode::{Capabilities, CapabilityMode, Credentials};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// A research question and how deep to go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    /// Falls back to the configured default depth when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<ResearchDepth>,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: ResearchDepth) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Build a request from untyped input, such as CLI arguments or a JSON body.
    pub fn parse(query: &str, depth: Option<&str>) -> Result<Self, RequestError> {
        let depth = depth.map(str::parse::<ResearchDepth>).transpose()?;
        Ok(Self {
            query: query.to_string(),
            depth,
        })
    }
}

/// Per-capability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityStatus {
    pub language_model: CapabilityMode,
    pub search: CapabilityMode,
}

/// Which pipeline features run against live services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureStatus {
    pub ai_planning: bool,
    pub web_search: bool,
    pub synthesis: bool,
}

/// Health snapshot of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    /// True when any capability would run simulated.
    pub simulated: bool,
    pub capabilities: CapabilityStatus,
    pub features: FeatureStatus,
    pub runs_in_history: usize,
}

enum CapabilitySource {
    /// Read credentials from the environment at the start of every run.
    Environment,
    /// Use these credentials for every run.
    Credentials(Credentials),
    /// Use these adapters as-is.
    Fixed(Capabilities),
}

/// The main research engine.
pub struct ResearchEngine {
    config: SleuthConfig,
    capabilities: CapabilitySource,
    history: ResearchHistory,
    observer: Arc<dyn ResearchObserver>,
}

impl ResearchEngine {
    /// An engine with in-memory history that reads credentials from the environment.
    pub fn new(config: SleuthConfig) -> Self {
        let history = ResearchHistory::in_memory(config.history.capacity);
        Self {
            config,
            capabilities: CapabilitySource::Environment,
            history,
            observer: Arc::new(NoOpObserver),
        }
    }

    /// Like [`ResearchEngine::new`], but persists history when `history.dir` is configured.
    pub fn open(config: SleuthConfig) -> Result<Self, SleuthError> {
        let history = match &config.history.dir {
            Some(dir) => ResearchHistory::open(dir, config.history.capacity)?,
            None => ResearchHistory::in_memory(config.history.capacity),
        };
        Ok(Self::new(config).with_history(history))
    }

    pub fn with_history(mut self, history: ResearchHistory) -> Self {
        self.history = history;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.capabilities = CapabilitySource::Credentials(credentials);
        self
    }

    /// Use fixed capability adapters instead of selecting them per run.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = CapabilitySource::Fixed(capabilities);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ResearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SleuthConfig {
        &self.config
    }

    fn credentials(&self) -> Credentials {
        match &self.capabilities {
            CapabilitySource::Credentials(credentials) => credentials.clone(),
            _ => Credentials::from_env(&self.config),
        }
    }

    fn resolve_capabilities(&self) -> (Capabilities, Vec<Notice>) {
        match &self.capabilities {
            CapabilitySource::Fixed(capabilities) => (capabilities.clone(), Vec::new()),
            _ => Capabilities::select(&self.credentials(), &self.config),
        }
    }

    /// Run the full pipeline for one request.
    ///
    /// Only an invalid request is an error; every capability failure is absorbed
    /// and recorded as a notice on the returned run.
    pub async fn run_research(&self, request: ResearchRequest) -> Result<Arc<ResearchRun>, SleuthError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(RequestError::EmptyQuery.into());
        }
        let depth = request.depth.unwrap_or(self.config.research.default_depth);

        let (capabilities, notices) = self.resolve_capabilities();
        let mut run = ResearchRun::new(query, depth, capabilities.mode);
        run.notices = notices;
        info!(run_id = %run.id, query, %depth, mode = %run.mode, "Research run started");
        self.observer.on_phase_change(run.id, run.phase);

        // Planning
        let planner = Planner::new(Arc::clone(&capabilities.model), &self.config);
        let (plan, notice) = planner.plan_with_notice(query, depth).await;
        run.notices.extend(notice);

        // Searching
        self.advance(&mut run, ResearchPhase::Searching)?;
        let executor = SearchExecutor::new(Arc::clone(&capabilities.search), self.config.search.timeout());
        let results = executor
            .search_all_observed(&plan, self.config.search.sources_per_query, Some(self.observer.as_ref()))
            .await;
        let failed = results.iter().filter(|r| r.status == SearchStatus::Failed).count();
        let timed_out = results.iter().filter(|r| r.status == SearchStatus::TimedOut).count();
        if failed + timed_out > 0 {
            run.notice(Notice::PartialCoverage {
                failed,
                timed_out,
                total: results.len(),
            });
        }

        // Analyzing
        self.advance(&mut run, ResearchPhase::Analyzing)?;
        let analyzer = Analyzer::new(Arc::clone(&capabilities.model), &self.config);
        let (findings, notices) = analyzer.analyze_all(&plan, &results).await;
        run.notices.extend(notices);

        // Synthesizing
        self.advance(&mut run, ResearchPhase::Synthesizing)?;
        let summary = ConfidenceSummary::aggregate(findings.iter().map(|f| f.confidence));
        let synthesizer = Synthesizer::new(Arc::clone(&capabilities.model), &self.config);
        let (report, notice) = synthesizer
            .synthesize_with_notice(query, &plan, &results, &findings, summary)
            .await;
        run.notices.extend(notice);

        run.plan = Some(plan);
        run.search_results = results;
        run.findings = findings;
        run.report = Some(report);
        self.advance(&mut run, ResearchPhase::Done)?;

        info!(
            run_id = %run.id,
            findings = run.findings.len(),
            score = summary.overall_score,
            notices = run.notices.len(),
            duration_ms = run.duration_ms().unwrap_or_default(),
            "Research run complete"
        );
        let run = Arc::new(run);
        self.history.record(Arc::clone(&run));
        Ok(run)
    }

    fn advance(&self, run: &mut ResearchRun, to: ResearchPhase) -> Result<(), SleuthError> {
        if let Err(e) = run.transition(to) {
            error!(run_id = %run.id, error = %e, "Research run aborted");
            run.fail(e.to_string());
            self.observer.on_phase_change(run.id, run.phase);
            self.history.record(Arc::new(run.clone()));
            return Err(e.into());
        }
        self.observer.on_phase_change(run.id, to);
        Ok(())
    }

    /// Which capabilities a run started now would use.
    pub fn status(&self) -> ServiceStatus {
        let mode = self.resolve_capabilities().0.mode;
        let model_live = mode.language_model == CapabilityMode::Live;
        ServiceStatus {
            status: "operational".to_string(),
            simulated: mode.is_simulated(),
            capabilities: CapabilityStatus {
                language_model: mode.language_model,
                search: mode.search,
            },
            features: FeatureStatus {
                ai_planning: model_live,
                web_search: mode.search == CapabilityMode::Live,
                synthesis: model_live,
            },
            runs_in_history: self.history.len(),
        }
    }

    /// Up to `limit` past runs, most recent first.
    pub fn history(&self, limit: usize) -> Vec<Arc<ResearchRun>> {
        self.history.recent(limit)
    }

    pub fn get_run(&self, id: Uuid) -> Option<Arc<ResearchRun>> {
        self.history.get(id)
    }

    /// Look up a run by full id or unambiguous id prefix.
    pub fn find_run(&self, id_or_prefix: &str) -> Option<Arc<ResearchRun>> {
        self.history.find(id_or_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ExecutionMode;

    fn engine() -> ResearchEngine {
        ResearchEngine::new(SleuthConfig::default()).with_capabilities(Capabilities::simulated())
    }

    #[test]
    fn test_request_parse() {
        let request = ResearchRequest::parse("q", Some("deep")).unwrap();
        assert_eq!(request.depth, Some(ResearchDepth::Deep));
        assert_eq!(ResearchRequest::parse("q", None).unwrap().depth, None);
        assert!(matches!(
            ResearchRequest::parse("q", Some("ultra")),
            Err(RequestError::UnknownDepth { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let engine = engine();
        let err = engine.run_research(ResearchRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, SleuthError::InvalidRequest(RequestError::EmptyQuery)));
        assert!(engine.history(10).is_empty());
    }

    #[tokio::test]
    async fn test_default_depth_from_config() {
        let mut config = SleuthConfig::default();
        config.research.default_depth = ResearchDepth::Quick;
        let engine = ResearchEngine::new(config).with_capabilities(Capabilities::simulated());
        let run = engine.run_research(ResearchRequest::new("soil health")).await.unwrap();
        assert_eq!(run.depth, ResearchDepth::Quick);
        assert_eq!(run.search_results.len(), 3);
    }

    #[tokio::test]
    async fn test_run_is_recorded() {
        let engine = engine();
        let run = engine
            .run_research(ResearchRequest::new("heat pumps").with_depth(ResearchDepth::Quick))
            .await
            .unwrap();
        assert_eq!(run.phase, ResearchPhase::Done);
        assert_eq!(engine.get_run(run.id).map(|r| r.id), Some(run.id));
        assert_eq!(engine.history(10).len(), 1);
        assert_eq!(engine.status().runs_in_history, 1);
    }

    #[test]
    fn test_status_without_credentials() {
        let engine = ResearchEngine::new(SleuthConfig::default()).with_credentials(Credentials::default());
        let status = engine.status();
        assert_eq!(status.status, "operational");
        assert!(status.simulated);
        assert_eq!(
            status.features,
            FeatureStatus {
                ai_planning: false,
                web_search: false,
                synthesis: false
            }
        );
    }

    #[test]
    fn test_status_with_search_credential_only() {
        let engine = ResearchEngine::new(SleuthConfig::default()).with_credentials(Credentials {
            language_model: None,
            search: Some("b7e1c2d9a04f4e6f9a1b".into()),
        });
        let status = engine.status();
        assert!(status.simulated);
        assert!(status.features.web_search);
        assert!(!status.features.ai_planning);
        assert_eq!(status.capabilities.search, CapabilityMode::Live);
    }

    #[tokio::test]
    async fn test_status_matches_run_for_unsupported_provider() {
        let mut config = SleuthConfig::default();
        config.llm.provider = "anthropic".into();
        let engine = ResearchEngine::new(config).with_credentials(Credentials {
            language_model: Some("sk-ant-REDACTED".into()),
            search: None,
        });

        let status = engine.status();
        assert_eq!(status.capabilities.language_model, CapabilityMode::Simulated);
        assert!(!status.features.ai_planning);
        assert!(!status.features.synthesis);

        let run = engine
            .run_research(ResearchRequest::new("tidal energy").with_depth(ResearchDepth::Quick))
            .await
            .unwrap();
        assert_eq!(run.mode.language_model, status.capabilities.language_model);
        assert_eq!(run.mode.search, status.capabilities.search);
    }

    #[test]
    fn test_status_serializes_like_a_health_endpoint() {
        let status = engine().status();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "operational");
        assert_eq!(json["capabilities"]["language_model"], "simulated");
        assert_eq!(json["features"]["web_search"], false);
        assert_eq!(engine().status().simulated, ExecutionMode::simulated().is_simulated());
    }
}
