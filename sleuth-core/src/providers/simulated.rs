//! Deterministic simulated language model.
//!
//! Answers from the structured prompt context alone, using the same template
//! builders the pipeline stages fall back to. Identical requests always get
//! identical answers.

use crate::brain::{CompletionRequest, LanguageModel, PromptContext};
use crate::error::LlmError;
use crate::research::analysis::snippet_statements;
use crate::research::decomposition::template_questions;
use crate::research::synthesis::template_report;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::trace;

#[derive(Debug, Default, Clone)]
pub struct SimulatedModel;

impl SimulatedModel {
    pub fn new() -> Self {
        Self
    }

    fn answer(context: &PromptContext) -> Result<Value, LlmError> {
        match context {
            PromptContext::Plan { query, count } => {
                Ok(json!({ "sub_questions": template_questions(query, *count) }))
            }
            PromptContext::Extract {
                sources,
                max_findings,
                ..
            } => Ok(json!({ "findings": snippet_statements(sources, *max_findings) })),
            PromptContext::Synthesize {
                query,
                sections,
                coverage_gaps,
                ..
            } => serde_json::to_value(template_report(query, sections, coverage_gaps)).map_err(|e| {
                LlmError::MalformedResponse {
                    message: e.to_string(),
                }
            }),
        }
    }
}

#[async_trait]
impl LanguageModel for SimulatedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, LlmError> {
        trace!(schema = ?request.expected_schema(), "Simulated completion");
        Self::answer(&request.context)
    }

    fn name(&self) -> &str {
        "simulated"
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
