//! LLM backend abstraction and implementations.
//!
//! Enum-based dispatch for LLM backends, avoiding the dyn-compatibility
//! issues with async trait methods. Concrete implementations exist for
//! OpenAI-compatible APIs and the Anthropic Messages API; both speak HTTP
//! via `reqwest`.

use aicity_core::config::LlmConfig;

use crate::RunnerError;
use crate::prompt::RenderedPrompt;

/// An LLM backend that can process a prompt and return a response.
///
/// Uses enum dispatch instead of trait objects because async methods are
/// not dyn-compatible.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Build the backend named by the configuration.
    pub fn from_config(config: &LlmConfig) -> Self {
        match config.backend.as_str() {
            "openai" => Self::OpenAi(OpenAiBackend::new(config)),
            _ => Self::Anthropic(AnthropicBackend::new(config)),
        }
    }

    /// Send a prompt to the LLM and return the response text.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Backend`] if the HTTP call fails or the
    /// response cannot be extracted.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, RunnerError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt).await,
            Self::Anthropic(backend) => backend.complete(prompt).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs. Works with
/// OpenAI, DeepSeek, and Ollama endpoints; requests go to
/// `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, RunnerError> {
        let url = format!("{}/chat/completions", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": 0.7,
            "max_tokens": 512,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RunnerError::Backend(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(RunnerError::Backend(format!(
                "OpenAI returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RunnerError::Backend(format!("OpenAI response parse failed: {e}")))?;

        extract_openai_content(&json)
    }
}

/// Extract the text content from an OpenAI chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, RunnerError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RunnerError::Backend("OpenAI response missing choices[0].message.content".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Differences from the OpenAI shape: the `x-api-key` header instead of
/// a bearer token, system as a top-level field, and content under
/// `content[0].text`.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, RunnerError> {
        let url = format!("{}/messages", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 512,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RunnerError::Backend(format!("Anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(RunnerError::Backend(format!(
                "Anthropic returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RunnerError::Backend(format!("Anthropic response parse failed: {e}")))?;

        extract_anthropic_content(&json)
    }
}

/// Extract the text content from an Anthropic Messages response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, RunnerError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RunnerError::Backend("Anthropic response missing content[0].text".to_owned())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_selection_follows_config() {
        let mut config = LlmConfig::default();
        config.backend = String::from("openai");
        assert_eq!(LlmBackend::from_config(&config).name(), "openai-compatible");
        config.backend = String::from("anthropic");
        assert_eq!(LlmBackend::from_config(&config).name(), "anthropic");
    }

    #[test]
    fn openai_content_extraction() {
        let json = serde_json::json!({
            "choices": [{"message": {"content": "{\"action\": \"work\"}"}}]
        });
        assert_eq!(
            extract_openai_content(&json).ok().as_deref(),
            Some("{\"action\": \"work\"}")
        );
        assert!(extract_openai_content(&serde_json::json!({})).is_err());
    }

    #[test]
    fn anthropic_content_extraction() {
        let json = serde_json::json!({
            "content": [{"type": "text", "text": "{\"guilty\": true}"}]
        });
        assert_eq!(
            extract_anthropic_content(&json).ok().as_deref(),
            Some("{\"guilty\": true}")
        );
        assert!(extract_anthropic_content(&serde_json::json!({"content": []})).is_err());
    }
}
