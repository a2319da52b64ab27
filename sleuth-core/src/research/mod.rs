//! Research pipeline.
//!
//! Runs four stages for every research question:
//! 1. **Plan**: decompose the question into sub-queries
//! 2. **Search**: run every sub-query's search concurrently
//! 3. **Analyze**: extract confidence-rated findings and corroborate them
//! 4. **Synthesize**: write the report, disclosing coverage gaps
//!
//! Each stage works against the `LanguageModel` / `SearchProvider` traits, so the
//! same pipeline runs live or simulated.

pub mod analysis;
pub mod confidence;
pub mod corroboration;
pub mod decomposition;
pub mod engine;
pub mod output;
pub mod run;
pub mod search;
pub mod sources;
pub mod synthesis;

pub use analysis::{Analyzer, Finding};
pub use confidence::{Confidence, ConfidenceSummary};
pub use decomposition::{Planner, ResearchPlan, SubQuery};
pub use engine::{ResearchEngine, ResearchRequest, ServiceStatus};
pub use output::{Insight, OutputFormat, ReportGenerator, ResearchReport};
pub use run::{NoOpObserver, Notice, ResearchObserver, ResearchPhase, ResearchRun};
pub use search::{SearchExecutor, SearchResult, SearchStatus};
pub use sources::SourceType;
pub use synthesis::{CoverageGap, GapReason, Synthesizer};
