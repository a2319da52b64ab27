//! Language-model provider implementations.
//!
//! Provides concrete implementations of the `LanguageModel` trait:
//! - OpenAI-compatible APIs (OpenAI, Azure, Ollama, vLLM, LM Studio)
//! - A deterministic simulated model for offline runs

pub mod openai_compat;
pub mod simulated;

pub use openai_compat::OpenAiCompatibleModel;
pub use simulated::SimulatedModel;
