//! Configuration system for Sleuth.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/sleuth/config.toml` and/or `.sleuth/config.toml`
//! in the workspace directory.

use crate::error::{ConfigError, RequestError};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration for Sleuth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleuthConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Language-model capability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name. Only OpenAI-compatible endpoints are supported.
    pub provider: String,
    /// Model identifier (e.g., "gpt-4o-mini").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Timeout for a single model call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            max_tokens: 2048,
            timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Web search capability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Provider name. Only "serper" is supported for live search.
    pub provider: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the search endpoint.
    pub base_url: Option<String>,
    /// Maximum number of sources kept per search query.
    pub sources_per_query: usize,
    /// Timeout for a single search, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "serper".to_string(),
            api_key_env: "SERPER_API_KEY".to_string(),
            base_url: None,
            sources_per_query: 5,
            timeout_ms: 15_000,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How many sub-queries a research run performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    Quick,
    #[default]
    Standard,
    Deep,
}

impl ResearchDepth {
    /// Number of sub-queries planned for this depth.
    pub fn sub_query_count(self) -> usize {
        match self {
            ResearchDepth::Quick => 3,
            ResearchDepth::Standard => 5,
            ResearchDepth::Deep => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResearchDepth::Quick => "quick",
            ResearchDepth::Standard => "standard",
            ResearchDepth::Deep => "deep",
        }
    }
}

impl fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResearchDepth {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(ResearchDepth::Quick),
            "standard" => Ok(ResearchDepth::Standard),
            "deep" => Ok(ResearchDepth::Deep),
            _ => Err(RequestError::UnknownDepth {
                value: s.to_string(),
            }),
        }
    }
}

/// Research pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Depth used when a request does not name one.
    pub default_depth: ResearchDepth,
    /// Sampling temperature for planning (favors diverse decompositions).
    pub planner_temperature: f32,
    /// Sampling temperature for finding extraction (favors literal extraction).
    pub analyzer_temperature: f32,
    /// Sampling temperature for report synthesis.
    pub synthesizer_temperature: f32,
    /// Upper bound on findings extracted from one search result.
    pub max_findings_per_source: usize,
    /// Minimum keyword Jaccard similarity for two findings to corroborate each other.
    pub corroboration_threshold: f64,
    /// Run both capabilities in simulated mode regardless of credentials.
    pub force_simulated: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            default_depth: ResearchDepth::Standard,
            planner_temperature: 0.7,
            analyzer_temperature: 0.3,
            synthesizer_temperature: 0.5,
            max_findings_per_source: 3,
            corroboration_threshold: 0.5,
            force_simulated: false,
        }
    }
}

/// Research history retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of completed runs kept in memory.
    pub capacity: usize,
    /// Directory where completed runs are persisted as JSON. In-memory only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            dir: None,
        }
    }
}

impl SleuthConfig {
    /// Reject values the pipeline cannot run with.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.search.sources_per_query == 0 {
            return Err(ConfigError::Invalid {
                message: "search.sources_per_query must be at least 1".into(),
            });
        }
        if self.research.max_findings_per_source == 0 {
            return Err(ConfigError::Invalid {
                message: "research.max_findings_per_source must be at least 1".into(),
            });
        }
        let threshold = self.research.corroboration_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "research.corroboration_threshold ({threshold}) must be in (0, 1]"
                ),
            });
        }
        if self.history.capacity == 0 {
            return Err(ConfigError::Invalid {
                message: "history.capacity must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Return human-readable warnings for values that work but are probably unintended.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let temperatures = [
            ("planner", self.research.planner_temperature),
            ("analyzer", self.research.analyzer_temperature),
            ("synthesizer", self.research.synthesizer_temperature),
        ];
        for (stage, temperature) in temperatures {
            if !(0.0..=2.0).contains(&temperature) {
                warnings.push(format!(
                    "{stage} temperature ({temperature}) is outside the typical range 0.0–2.0"
                ));
            }
        }
        if self.research.analyzer_temperature > self.research.planner_temperature {
            warnings.push(
                "analyzer temperature is higher than planner temperature; extraction may paraphrase sources"
                    .to_string(),
            );
        }
        if self.search.sources_per_query > 10 {
            warnings.push(format!(
                "search.sources_per_query ({}) exceeds 10; most search APIs cap results per page",
                self.search.sources_per_query
            ));
        }
        if self.search.timeout_ms < 1_000 {
            warnings.push(format!(
                "search.timeout_ms ({}) is under one second; most live searches will time out",
                self.search.timeout_ms
            ));
        }
        warnings
    }
}

/// Platform directories for Sleuth (config, data, logs).
pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "sleuth", "sleuth")
}

/// Default directory for persisted research history.
pub fn default_history_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().join("history"))
        .unwrap_or_else(|| PathBuf::from(".sleuth").join("history"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `SLEUTH_`)
/// 3. An explicit config file, when given
/// 4. Workspace-local config (`.sleuth/config.toml`)
/// 5. User config (`~/.config/sleuth/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&SleuthConfig>,
) -> Result<SleuthConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(SleuthConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".sleuth").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // SLEUTH_SEARCH__TIMEOUT_MS, SLEUTH_RESEARCH__FORCE_SIMULATED, etc.
    figment = figment.merge(Env::prefixed("SLEUTH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: SleuthConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    config.check()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_counts() {
        assert_eq!(ResearchDepth::Quick.sub_query_count(), 3);
        assert_eq!(ResearchDepth::Standard.sub_query_count(), 5);
        assert_eq!(ResearchDepth::Deep.sub_query_count(), 8);
    }

    #[test]
    fn test_depth_parse() {
        assert_eq!("quick".parse::<ResearchDepth>(), Ok(ResearchDepth::Quick));
        assert_eq!(" Deep ".parse::<ResearchDepth>(), Ok(ResearchDepth::Deep));
        assert_eq!(
            "exhaustive".parse::<ResearchDepth>(),
            Err(RequestError::UnknownDepth {
                value: "exhaustive".into()
            })
        );
    }

    #[test]
    fn test_depth_serde_lowercase() {
        let json = serde_json::to_string(&ResearchDepth::Standard).unwrap();
        assert_eq!(json, "\"standard\"");
        let parsed: ResearchDepth = serde_json::from_str("\"deep\"").unwrap();
        assert_eq!(parsed, ResearchDepth::Deep);
        assert!(serde_json::from_str::<ResearchDepth>("\"medium\"").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = SleuthConfig::default();
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.search.api_key_env, "SERPER_API_KEY");
        assert_eq!(config.search.sources_per_query, 5);
        assert_eq!(config.research.default_depth, ResearchDepth::Standard);
        assert!((config.research.planner_temperature - 0.7).abs() < f32::EPSILON);
        assert!((config.research.analyzer_temperature - 0.3).abs() < f32::EPSILON);
        assert!((config.research.synthesizer_temperature - 0.5).abs() < f32::EPSILON);
        assert!(config.check().is_ok());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_check_rejects_zero_sources() {
        let mut config = SleuthConfig::default();
        config.search.sources_per_query = 0;
        assert!(matches!(config.check(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_check_rejects_threshold_out_of_range() {
        let mut config = SleuthConfig::default();
        config.research.corroboration_threshold = 0.0;
        assert!(config.check().is_err());
        config.research.corroboration_threshold = 1.5;
        assert!(config.check().is_err());
        config.research.corroboration_threshold = 1.0;
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = SleuthConfig::default();
        config.research.planner_temperature = 2.5;
        config.search.timeout_ms = 200;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("planner temperature"));
        assert!(warnings[1].contains("under one second"));
    }

    #[test]
    fn test_load_config_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        let sleuth_dir = dir.path().join(".sleuth");
        std::fs::create_dir_all(&sleuth_dir).unwrap();
        std::fs::write(
            sleuth_dir.join("config.toml"),
            "[search]\nsources_per_query = 3\n\n[research]\ndefault_depth = \"deep\"\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.search.sources_per_query, 3);
        assert_eq!(config.research.default_depth, ResearchDepth::Deep);
        // Untouched sections keep their defaults.
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(None, Some(&missing), None).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_config_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let mut overrides = SleuthConfig::default();
        overrides.research.force_simulated = true;
        let config = load_config(Some(dir.path()), None, Some(&overrides)).unwrap();
        assert!(config.research.force_simulated);
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("custom.toml");
        std::fs::write(&file, "[history]\ncapacity = 0\n").unwrap();
        let err = load_config(None, Some(&file), None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
