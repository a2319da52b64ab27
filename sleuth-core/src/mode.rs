//! Live/simulated capability selection.
//!
//! Once per run, each external capability (language model, web search) is
//! decided to run live or simulated based on whether a plausible credential is
//! available. Selection never fails: anything missing degrades to simulated.

use crate::brain::LanguageModel;
use crate::config::SleuthConfig;
use crate::providers::{OpenAiCompatibleModel, SimulatedModel};
use crate::research::run::Notice;
use crate::search::{SearchProvider, SerperSearch, SimulatedSearch};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

const MIN_KEY_LEN: usize = 16;
const PLACEHOLDERS: &[&str] = &["changeme", "placeholder", "replace", "dummy", "example", "xxxx"];

/// How one capability runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityMode {
    Live,
    Simulated,
}

impl fmt::Display for CapabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CapabilityMode::Live => "live",
            CapabilityMode::Simulated => "simulated",
        })
    }
}

/// The per-capability modes of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMode {
    pub language_model: CapabilityMode,
    pub search: CapabilityMode,
}

impl ExecutionMode {
    pub fn live() -> Self {
        Self {
            language_model: CapabilityMode::Live,
            search: CapabilityMode::Live,
        }
    }

    pub fn simulated() -> Self {
        Self {
            language_model: CapabilityMode::Simulated,
            search: CapabilityMode::Simulated,
        }
    }

    /// True when at least one capability is simulated.
    pub fn is_simulated(&self) -> bool {
        self.language_model == CapabilityMode::Simulated || self.search == CapabilityMode::Simulated
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.language_model == self.search {
            write!(f, "{}", self.language_model)
        } else {
            write!(f, "mixed (model: {}, search: {})", self.language_model, self.search)
        }
    }
}

/// Raw credentials as found in the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub language_model: Option<String>,
    pub search: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credentials")
            .field("language_model", &redact(&self.language_model))
            .field("search", &redact(&self.search))
            .finish()
    }
}

impl Credentials {
    /// Read the environment variables named in the configuration.
    pub fn from_env(config: &SleuthConfig) -> Self {
        Self {
            language_model: std::env::var(&config.llm.api_key_env).ok(),
            search: std::env::var(&config.search.api_key_env).ok(),
        }
    }
}

/// Whether a credential is present and plausibly real.
pub fn looks_valid(key: &str) -> bool {
    plausible_key(key, MIN_KEY_LEN)
}

/// Self-hosted endpoints (Ollama, vLLM) accept short tokens such as `ollama`.
pub fn looks_valid_for_custom_endpoint(key: &str) -> bool {
    plausible_key(key, 1)
}

fn plausible_key(key: &str, min_len: usize) -> bool {
    let key = key.trim();
    if key.chars().count() < min_len || key.chars().any(char::is_whitespace) {
        return false;
    }
    let lower = key.to_ascii_lowercase();
    if lower.starts_with("your") || PLACEHOLDERS.iter().any(|p| lower.contains(p)) {
        return false;
    }
    if min_len < MIN_KEY_LEN {
        return true;
    }
    // A single repeated character ("aaaaaaaaaaaaaaaa") is not a key.
    let mut chars = key.chars();
    let first = chars.next();
    !chars.all(|c| Some(c) == first)
}

/// Decides the execution mode of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeSelector {
    force_simulated: bool,
    custom_model_endpoint: bool,
}

impl ModeSelector {
    pub fn new(force_simulated: bool) -> Self {
        Self {
            force_simulated,
            custom_model_endpoint: false,
        }
    }

    /// The selector a run with `config` uses.
    pub fn from_config(config: &SleuthConfig) -> Self {
        Self {
            force_simulated: config.research.force_simulated,
            custom_model_endpoint: config.llm.base_url.as_deref().is_some_and(|u| !u.trim().is_empty()),
        }
    }

    pub fn select_mode(&self, credentials: &Credentials) -> ExecutionMode {
        if self.force_simulated {
            return ExecutionMode::simulated();
        }
        let mode_for = |key: &Option<String>, valid: fn(&str) -> bool| match key.as_deref() {
            Some(k) if valid(k) => CapabilityMode::Live,
            _ => CapabilityMode::Simulated,
        };
        let model_key_valid = if self.custom_model_endpoint {
            looks_valid_for_custom_endpoint
        } else {
            looks_valid
        };
        ExecutionMode {
            language_model: mode_for(&credentials.language_model, model_key_valid),
            search: mode_for(&credentials.search, looks_valid),
        }
    }
}

/// The capability implementations one run uses.
#[derive(Clone)]
pub struct Capabilities {
    pub model: Arc<dyn LanguageModel>,
    pub search: Arc<dyn SearchProvider>,
    pub mode: ExecutionMode,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("model", &self.model.name())
            .field("search", &self.search.name())
            .field("mode", &self.mode)
            .finish()
    }
}

impl Capabilities {
    /// Use the given implementations; the mode follows what they report.
    pub fn new(model: Arc<dyn LanguageModel>, search: Arc<dyn SearchProvider>) -> Self {
        let mode_of = |simulated: bool| {
            if simulated {
                CapabilityMode::Simulated
            } else {
                CapabilityMode::Live
            }
        };
        let mode = ExecutionMode {
            language_model: mode_of(model.is_simulated()),
            search: mode_of(search.is_simulated()),
        };
        Self {
            model,
            search,
            mode,
        }
    }

    pub fn simulated() -> Self {
        Self::new(Arc::new(SimulatedModel::new()), Arc::new(SimulatedSearch::new()))
    }

    /// Select a mode from `credentials` and build matching adapters.
    ///
    /// A capability whose credential is unusable, or whose live adapter cannot
    /// be built, runs simulated and is reported as a notice.
    pub fn select(credentials: &Credentials, config: &SleuthConfig) -> (Self, Vec<Notice>) {
        let selector = ModeSelector::from_config(config);
        let requested = selector.select_mode(credentials);
        let mut notices = Vec::new();

        if !config.research.force_simulated {
            if requested.language_model == CapabilityMode::Simulated {
                notices.push(Notice::CapabilityUnavailable {
                    capability: "language model".into(),
                    reason: format!("no usable credential in {}", config.llm.api_key_env),
                });
            }
            if requested.search == CapabilityMode::Simulated {
                notices.push(Notice::CapabilityUnavailable {
                    capability: "search".into(),
                    reason: format!("no usable credential in {}", config.search.api_key_env),
                });
            }
        }

        let model: Arc<dyn LanguageModel> = match (requested.language_model, &credentials.language_model) {
            (CapabilityMode::Live, Some(key)) => match build_model(config, key.trim()) {
                Ok(model) => model,
                Err(reason) => {
                    warn!(reason = %reason, "Language model unavailable, using simulated model");
                    notices.push(Notice::CapabilityUnavailable {
                        capability: "language model".into(),
                        reason,
                    });
                    Arc::new(SimulatedModel::new())
                }
            },
            _ => Arc::new(SimulatedModel::new()),
        };

        let search: Arc<dyn SearchProvider> = match (requested.search, &credentials.search) {
            (CapabilityMode::Live, Some(key)) => match build_search(config, key.trim()) {
                Ok(search) => search,
                Err(reason) => {
                    warn!(reason = %reason, "Search unavailable, using simulated search");
                    notices.push(Notice::CapabilityUnavailable {
                        capability: "search".into(),
                        reason,
                    });
                    Arc::new(SimulatedSearch::new())
                }
            },
            _ => Arc::new(SimulatedSearch::new()),
        };

        let capabilities = Self::new(model, search);
        info!(mode = %capabilities.mode, "Execution mode selected");
        (capabilities, notices)
    }
}

fn build_model(config: &SleuthConfig, key: &str) -> Result<Arc<dyn LanguageModel>, String> {
    match config.llm.provider.as_str() {
        "openai" | "openai_compat" | "openai-compatible" => {
            OpenAiCompatibleModel::new(&config.llm, key.to_string())
                .map(|m| Arc::new(m) as Arc<dyn LanguageModel>)
                .map_err(|e| e.to_string())
        }
        other => Err(format!("unsupported language model provider '{other}'")),
    }
}

fn build_search(config: &SleuthConfig, key: &str) -> Result<Arc<dyn SearchProvider>, String> {
    match config.search.provider.as_str() {
        "serper" => SerperSearch::new(&config.search, key.to_string())
            .map(|s| Arc::new(s) as Arc<dyn SearchProvider>)
            .map_err(|e| e.to_string()),
        other => Err(format!("unsupported search provider '{other}'")),
    }
}
