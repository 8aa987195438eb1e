//! The LLM-backed [`ReasoningService`] implementation.
//!
//! The runner does not care which model is behind the API: it renders a
//! prompt, sends it over HTTP, and expects a text response containing
//! JSON. Calls go through a bounded worker pool with a per-call timeout;
//! any failure surfaces as a [`ReasonerFailure`] and the engine falls back
//! to role defaults.
//!
//! [`ReasoningService`]: aicity_core::ReasoningService
//! [`ReasonerFailure`]: aicity_justice::ReasonerFailure

pub mod llm;
pub mod parse;
pub mod pool;
pub mod prompt;

pub use llm::{AnthropicBackend, LlmBackend, OpenAiBackend};
pub use pool::LlmReasoner;
pub use prompt::RenderedPrompt;

/// Errors internal to the runner. They never cross into the engine:
/// everything converts to a [`aicity_justice::ReasonerFailure`] at the
/// service boundary.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The HTTP call failed or returned a non-success status.
    #[error("llm backend error: {0}")]
    Backend(String),

    /// The response could not be parsed after every recovery strategy.
    #[error("parse error: {0}")]
    Parse(String),

    /// The per-call timeout elapsed.
    #[error("llm call timed out after {0}ms")]
    Timeout(u64),

    /// Prompt template rendering failed.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl From<RunnerError> for aicity_justice::ReasonerFailure {
    fn from(err: RunnerError) -> Self {
        Self(err.to_string())
    }
}
