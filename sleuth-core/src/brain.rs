//! Brain module: language-model abstraction.
//!
//! Defines the `LanguageModel` trait every pipeline stage talks to, the structured
//! [`PromptContext`] each stage sends, and the retry/timeout wrapper that gives
//! each stage at most two attempts before it falls back.

use crate::error::LlmError;
use crate::research::confidence::Confidence;
use crate::research::synthesis::CoverageGap;
use crate::search::SourceDocument;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Number of attempts a stage makes against the model before falling back.
pub const MAX_ATTEMPTS: usize = 2;

/// Trait for language-model capabilities, live or simulated.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion and return the parsed JSON object the model produced.
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, LlmError>;

    /// Return the model name.
    fn name(&self) -> &str;

    /// Whether this model produces deterministic simulated output.
    fn is_simulated(&self) -> bool {
        false
    }
}

/// One finding as shown to the synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingDigest {
    pub statement: String,
    pub confidence: Confidence,
    pub corroborated: bool,
}

/// All findings for one sub-question, in plan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDigest {
    pub sub_question: String,
    pub findings: Vec<FindingDigest>,
}

/// Structured input of a completion, one variant per pipeline stage.
///
/// The live adapter only sees the rendered prompt; the simulated adapter builds
/// its answer from these fields directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PromptContext {
    Plan {
        query: String,
        count: usize,
    },
    Extract {
        query: String,
        sub_question: String,
        sources: Vec<SourceDocument>,
        max_findings: usize,
    },
    Synthesize {
        query: String,
        overall_score: f64,
        sections: Vec<SectionDigest>,
        coverage_gaps: Vec<CoverageGap>,
    },
}

impl PromptContext {
    pub fn schema(&self) -> ResponseSchema {
        match self {
            PromptContext::Plan { .. } => ResponseSchema::ResearchPlan,
            PromptContext::Extract { .. } => ResponseSchema::Findings,
            PromptContext::Synthesize { .. } => ResponseSchema::Report,
        }
    }

    /// Render the user prompt for a live model.
    pub fn render(&self) -> String {
        match self {
            PromptContext::Plan { query, count } => format!(
                "Break the research question below into exactly {count} distinct sub-questions \
                 that together cover it. For each, give a concise web search query.\n\n\
                 Research question: {query}"
            ),
            PromptContext::Extract {
                query,
                sub_question,
                sources,
                max_findings,
            } => {
                let mut prompt = format!(
                    "Research question: {query}\nSub-question: {sub_question}\n\n\
                     Extract at most {max_findings} factual statements from the sources below \
                     that help answer the sub-question. Only use what the sources say. Rate \
                     each statement's confidence as high, medium or low, and cite the number \
                     of the source it came from.\n\nSources:\n"
                );
                for (i, source) in sources.iter().enumerate() {
                    prompt.push_str(&format!(
                        "[{}] {} ({})\n{}\n\n",
                        i + 1,
                        source.title,
                        source.url,
                        source.snippet
                    ));
                }
                prompt
            }
            PromptContext::Synthesize {
                query,
                overall_score,
                sections,
                coverage_gaps,
            } => {
                let mut prompt = format!(
                    "Write a research report answering: {query}\n\
                     Overall confidence score: {overall_score:.2}\n\nFindings by sub-question:\n"
                );
                for section in sections {
                    prompt.push_str(&format!("\n## {}\n", section.sub_question));
                    if section.findings.is_empty() {
                        prompt.push_str("- (no findings)\n");
                    }
                    for finding in &section.findings {
                        prompt.push_str(&format!(
                            "- [{}] {}\n",
                            finding.confidence, finding.statement
                        ));
                    }
                }
                if !coverage_gaps.is_empty() {
                    prompt.push_str("\nCoverage gaps (must be listed under limitations):\n");
                    for gap in coverage_gaps {
                        prompt.push_str(&format!("- {}\n", gap.limitation()));
                    }
                }
                prompt
            }
        }
    }
}

/// The JSON shape a stage expects back from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSchema {
    ResearchPlan,
    Findings,
    Report,
}

impl ResponseSchema {
    /// Output-format instructions appended to the system prompt.
    pub fn instructions(self) -> &'static str {
        match self {
            ResponseSchema::ResearchPlan => {
                r#"Respond with a JSON object only: {"sub_questions": [{"question": "...", "search_query": "..."}]}"#
            }
            ResponseSchema::Findings => {
                r#"Respond with a JSON object only: {"findings": [{"statement": "...", "confidence": "high|medium|low", "source": 1}]}"#
            }
            ResponseSchema::Report => {
                r#"Respond with a JSON object only: {"executive_summary": "...", "insights": [{"title": "...", "explanation": "..."}], "conclusions": ["..."], "limitations": ["..."], "recommendations": ["..."]}"#
            }
        }
    }

    /// Check the top-level shape of a model response.
    pub fn validate(self, value: &Value) -> Result<(), LlmError> {
        let object = value.as_object().ok_or_else(|| LlmError::MalformedResponse {
            message: "response is not a JSON object".into(),
        })?;
        let key = match self {
            ResponseSchema::ResearchPlan => "sub_questions",
            ResponseSchema::Findings => "findings",
            ResponseSchema::Report => "executive_summary",
        };
        let field = object
            .get(key)
            .ok_or_else(|| LlmError::MalformedResponse {
                message: format!("missing field `{key}`"),
            })?;
        let well_typed = match self {
            ResponseSchema::ResearchPlan | ResponseSchema::Findings => field.is_array(),
            ResponseSchema::Report => field.as_str().is_some_and(|s| !s.trim().is_empty()),
        };
        if !well_typed {
            return Err(LlmError::MalformedResponse {
                message: format!("field `{key}` has the wrong type or is empty"),
            });
        }
        Ok(())
    }
}

/// A completion request sent to a [`LanguageModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub context: PromptContext,
}

impl CompletionRequest {
    pub fn new(context: PromptContext, temperature: f32) -> Self {
        Self {
            prompt: context.render(),
            temperature,
            context,
        }
    }

    pub fn expected_schema(&self) -> ResponseSchema {
        self.context.schema()
    }
}

/// Run a completion with a per-attempt timeout, retrying once.
///
/// `parse` turns the schema-checked JSON into the stage's typed output; a parse
/// error counts as a failed attempt.
pub async fn complete_with_retry<T, F>(
    model: &dyn LanguageModel,
    request: &CompletionRequest,
    timeout: Duration,
    mut parse: F,
) -> Result<T, LlmError>
where
    F: FnMut(Value) -> Result<T, LlmError>,
{
    let mut attempt = 1;
    loop {
        let outcome = match tokio::time::timeout(timeout, model.complete(request)).await {
            Ok(Ok(value)) => request
                .expected_schema()
                .validate(&value)
                .and_then(|()| parse(value)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LlmError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        };
        match outcome {
            Ok(parsed) => {
                debug!(model = model.name(), attempt, "Model call succeeded");
                return Ok(parsed);
            }
            Err(e) if attempt < MAX_ATTEMPTS => {
                warn!(model = model.name(), attempt, error = %e, "Model call failed, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Parse model output text as a JSON object, tolerating code fences and chatter.
pub fn parse_json_text(text: &str) -> Result<Value, LlmError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed)
        && value.is_object()
    {
        return Ok(value);
    }
    let candidate = extract_json_object(trimmed).ok_or_else(|| LlmError::MalformedResponse {
        message: "no JSON object in model output".into(),
    })?;
    serde_json::from_str(candidate).map_err(|e| LlmError::MalformedResponse {
        message: format!("Invalid JSON: {e}"),
    })
}

/// Return the first balanced `{...}` span in `text`, skipping braces inside strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// A scripted language model for tests and development.
///
/// Returns queued results in order; once the queue is empty every call fails
/// with `ModelUnavailable`.
pub struct MockLanguageModel {
    responses: Mutex<VecDeque<Result<Value, LlmError>>>,
    calls: AtomicUsize,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock that answers every call with `value`.
    pub fn with_response(value: Value) -> Self {
        let model = Self::new();
        for _ in 0..32 {
            model.queue(Ok(value.clone()));
        }
        model
    }

    pub fn queue(&self, response: Result<Value, LlmError>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Value, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::ModelUnavailable {
                    message: "no queued responses".into(),
                })
            })
    }

    fn name(&self) -> &str {
        "mock-model"
    }
}
