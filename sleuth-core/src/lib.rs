//! # Sleuth Core
//!
//! Core library for the Sleuth research agent.
//! Provides the research pipeline (planning, concurrent search, confidence-rated
//! analysis, synthesis), the language-model and search capability traits with
//! their live and simulated adapters, configuration, and run history.

pub mod brain;
pub mod config;
pub mod error;
pub mod history;
pub mod mode;
pub mod persistence;
pub mod providers;
pub mod research;
pub mod search;

// Re-export commonly used types at the crate root.
pub use brain::{CompletionRequest, LanguageModel, MockLanguageModel, PromptContext};
pub use config::{ResearchDepth, SleuthConfig, load_config};
pub use error::{Result, SleuthError};
pub use history::ResearchHistory;
pub use mode::{Capabilities, CapabilityMode, Credentials, ExecutionMode, ModeSelector};
pub use research::{
    Confidence, ConfidenceSummary, Finding, Notice, OutputFormat, ReportGenerator,
    ResearchEngine, ResearchObserver, ResearchPhase, ResearchReport, ResearchRequest,
    ResearchRun, SearchResult, SearchStatus, ServiceStatus,
};
pub use search::{SearchProvider, SourceDocument};
