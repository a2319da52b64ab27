//! Error types for the Sleuth research core.
//!
//! Uses `thiserror` for public API error types. Only [`RequestError`] ever fails
//! a research run; language-model and search errors are absorbed by the stage
//! that hit them and recorded as notices on the run instead.

use std::path::PathBuf;

/// Top-level error type for the Sleuth core library.
#[derive(Debug, thiserror::Error)]
pub enum SleuthError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A research request rejected before any stage runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("unknown depth '{value}' (expected quick, standard or deep)")]
    UnknownDepth { value: String },
}

/// Errors from language-model calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("Model unavailable: {message}")]
    ModelUnavailable { message: String },

    #[error("Malformed model response: {message}")]
    MalformedResponse { message: String },

    #[error("Model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Errors from a single search query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("Search unavailable: {message}")]
    Unavailable { message: String },

    #[error("Search timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the run state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// A type alias for results using the top-level `SleuthError`.
pub type Result<T> = std::result::Result<T, SleuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_request() {
        let err = SleuthError::InvalidRequest(RequestError::UnknownDepth {
            value: "extreme".into(),
        });
        assert_eq!(
            err.to_string(),
            "Invalid request: unknown depth 'extreme' (expected quick, standard or deep)"
        );
    }

    #[test]
    fn test_error_display_llm() {
        let err = LlmError::MalformedResponse {
            message: "missing field `sub_questions`".into(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed model response: missing field `sub_questions`"
        );
    }

    #[test]
    fn test_error_display_search_timeout() {
        let err = SearchError::Timeout { timeout_ms: 1500 };
        assert_eq!(err.to_string(), "Search timed out after 1500ms");
    }

    #[test]
    fn test_error_from_pipeline() {
        let err: SleuthError = PipelineError::InvalidTransition {
            from: "done".into(),
            to: "planning".into(),
        }
        .into();
        assert!(matches!(err, SleuthError::Pipeline(_)));
        assert_eq!(
            err.to_string(),
            "Pipeline error: Invalid state transition: done -> planning"
        );
    }
}
