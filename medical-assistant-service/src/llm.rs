use async_trait::async_trait;
use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::error::GenerationError;

const MEDICAL_PREAMBLE: &str = "You are a medical AI assistant. Answer clearly, use section \
headers when asked for a structured response, and always recommend consulting a qualified \
doctor for diagnosis.";

/// A single request/response call to a text-generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}

/// OpenRouter-backed generator. Wrap it in a [`GuardedGenerator`] to bound call time.
#[derive(Clone)]
pub struct OpenRouterGenerator {
    api_key: Option<String>,
    model: String,
}

impl OpenRouterGenerator {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
        }
    }

    /// Reads `OPENROUTER_API_KEY`; a missing key surfaces on the first call.
    pub fn from_env(model: impl Into<String>) -> Self {
        Self::new(std::env::var("OPENROUTER_API_KEY").ok(), model)
    }

    fn agent(&self) -> Result<Agent<openrouter::CompletionModel>, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey)?;
        let client = openrouter::Client::new(api_key);
        Ok(client.agent(&self.model).preamble(MEDICAL_PREAMBLE).build())
    }
}

#[async_trait]
impl TextGenerator for OpenRouterGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let agent = self.agent()?;
        info!(model = %self.model, prompt_len = prompt.len(), "Calling LLM");

        agent.prompt(prompt).await.map_err(|e| {
            error!(model = %self.model, error = %e, "LLM request failed");
            GenerationError::Provider(e.to_string())
        })
    }
}

/// Bounds every call to the inner generator by `timeout` and rejects blank replies.
pub struct GuardedGenerator<G> {
    inner: G,
    timeout: Duration,
}

impl<G: TextGenerator> GuardedGenerator<G> {
    pub fn new(inner: G, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for GuardedGenerator<G> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = tokio::time::timeout(self.timeout, self.inner.generate(prompt))
            .await
            .map_err(|_| {
                error!(timeout_secs = self.timeout.as_secs(), "LLM request timed out");
                GenerationError::Timeout(self.timeout.as_secs())
            })??;

        let response = response.trim();
        if response.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(response.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::testing::ScriptedGenerator;

    /// Answers only after `delay`.
    struct SlowGenerator {
        delay: Duration,
    }

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(self.delay).await;
            Ok("late answer".to_string())
        }
    }

    #[tokio::test]
    async fn missing_api_key_is_reported_without_a_request() {
        let generator = OpenRouterGenerator::new(None, "openai/gpt-4o-mini");
        let result = generator.generate("hello").await;
        assert_eq!(result, Err(GenerationError::MissingApiKey));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out() {
        let generator = GuardedGenerator::new(
            SlowGenerator {
                delay: Duration::from_secs(120),
            },
            Duration::from_secs(60),
        );
        assert_eq!(
            generator.generate("advice for fever").await,
            Err(GenerationError::Timeout(60))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn generation_within_the_timeout_passes_through() {
        let generator = GuardedGenerator::new(
            SlowGenerator {
                delay: Duration::from_secs(5),
            },
            Duration::from_secs(60),
        );
        assert_eq!(
            generator.generate("advice for fever").await.as_deref(),
            Ok("late answer")
        );
    }

    #[tokio::test]
    async fn blank_reply_is_an_empty_response_error() {
        let generator =
            GuardedGenerator::new(ScriptedGenerator::replying("  \n "), Duration::from_secs(5));
        assert_eq!(
            generator.generate("hello").await,
            Err(GenerationError::EmptyResponse)
        );
    }

    #[tokio::test]
    async fn replies_are_trimmed() {
        let generator =
            GuardedGenerator::new(ScriptedGenerator::replying(" Rest. \n"), Duration::from_secs(5));
        assert_eq!(generator.generate("hello").await.as_deref(), Ok("Rest."));
    }

    #[test]
    fn errors_render_as_text() {
        assert_eq!(
            GenerationError::Timeout(60).to_string(),
            "LLM request timed out after 60s"
        );
        assert_eq!(
            GenerationError::Provider("quota exceeded".into()).to_string(),
            "LLM request failed: quota exceeded"
        );
    }
}
