//! The bounded reasoning pool.
//!
//! [`LlmReasoner`] implements the engine's [`ReasoningService`] on top of
//! an HTTP backend. Calls acquire a semaphore permit (bounding in-flight
//! requests), run under a per-call timeout, and surface every failure as
//! a [`ReasonerFailure`] so the tick falls back and keeps moving. The
//! tick loop is synchronous; each call blocks on the shared runtime
//! handle from outside the async context.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::debug;

use aicity_core::config::LlmConfig;
use aicity_core::reasoning::{
    GraduationRequest, InvestigationContext, JudgeRuling, NarrativeRequest, ReasonerFailure,
    ReasoningService, TrialBrief, VerdictNote,
};
use aicity_types::{Decision, DecisionRequest, Role};

use crate::RunnerError;
use crate::llm::LlmBackend;
use crate::parse;
use crate::prompt::{PromptEnvironment, RenderedPrompt};

/// The production reasoning service.
pub struct LlmReasoner {
    runtime: tokio::runtime::Handle,
    backend: Arc<LlmBackend>,
    permits: Arc<Semaphore>,
    call_timeout: Duration,
    timeout_ms: u64,
    prompts: PromptEnvironment,
}

impl LlmReasoner {
    /// Build the reasoner from configuration and the runtime handle the
    /// calls will execute on.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Template`] if prompt compilation fails.
    pub fn new(config: &LlmConfig, runtime: tokio::runtime::Handle) -> Result<Self, RunnerError> {
        Ok(Self {
            runtime,
            backend: Arc::new(LlmBackend::from_config(config)),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            call_timeout: Duration::from_millis(config.timeout_ms),
            timeout_ms: config.timeout_ms,
            prompts: PromptEnvironment::new()?,
        })
    }

    /// One bounded, timed call: permit, HTTP round-trip, raw text back.
    fn complete(&self, prompt: &RenderedPrompt) -> Result<String, RunnerError> {
        let backend = Arc::clone(&self.backend);
        let permits = Arc::clone(&self.permits);
        let call_timeout = self.call_timeout;
        let timeout_ms = self.timeout_ms;
        let prompt = prompt.clone();

        self.runtime.block_on(async move {
            let _permit = permits
                .acquire()
                .await
                .map_err(|e| RunnerError::Backend(format!("pool closed: {e}")))?;
            debug!(backend = backend.name(), "reasoning call");
            timeout(call_timeout, backend.complete(&prompt))
                .await
                .map_err(|_| RunnerError::Timeout(timeout_ms))?
        })
    }
}

impl ReasoningService for LlmReasoner {
    fn decide(&mut self, request: &DecisionRequest) -> Result<Decision, ReasonerFailure> {
        let prompt = self.prompts.decide(request)?;
        let raw = self.complete(&prompt)?;
        Ok(parse::parse_decision(&raw)?)
    }

    fn choose_role(
        &mut self,
        request: &GraduationRequest,
    ) -> Result<(Role, String), ReasonerFailure> {
        let prompt = self.prompts.graduate(request)?;
        let raw = self.complete(&prompt)?;
        Ok(parse::parse_graduation(&raw)?)
    }

    fn investigate(
        &mut self,
        ctx: &InvestigationContext,
    ) -> Result<VerdictNote, ReasonerFailure> {
        let prompt = self.prompts.investigate(ctx)?;
        let raw = self.complete(&prompt)?;
        Ok(parse::parse_verdict_note(&raw)?)
    }

    fn closing_narrative(
        &mut self,
        ctx: &InvestigationContext,
        disposition: &str,
    ) -> Result<String, ReasonerFailure> {
        // The closing report reuses the investigation prompt with a
        // prose instruction appended.
        let mut prompt = self.prompts.investigate(ctx)?;
        prompt.user.push_str(&format!(
            "\n\nThe case is being closed as {disposition}. Write the closing report in \
             your own voice, prose only, from the evidence above."
        ));
        Ok(self.complete(&prompt)?)
    }

    fn judge(&mut self, brief: &TrialBrief) -> Result<JudgeRuling, ReasonerFailure> {
        let prompt = self.prompts.judge(brief)?;
        let raw = self.complete(&prompt)?;
        Ok(parse::parse_ruling(&raw)?)
    }

    fn write_narrative(
        &mut self,
        request: &NarrativeRequest,
    ) -> Result<String, ReasonerFailure> {
        let prompt = self.prompts.narrate(request)?;
        Ok(self.complete(&prompt)?)
    }
}
