//! Completion service client
//!
//! The model's answer is untrusted text. This module only moves bytes: it
//! sends one prompt and returns the first completion, nothing is parsed or
//! executed here.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::PipelineError;

/// `complete(prompt) -> text` over the network
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// OpenAI-compatible chat completions (DeepSeek by default)
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiCompletion {
    pub fn new(api_key: &str, config: &LlmConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.base_url);

        // One request per call; upstream failures surface to the caller
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(openai_config).with_backoff(no_retry),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn upstream_error(e: OpenAIError) -> PipelineError {
    match e {
        OpenAIError::JSONDeserialize(e) => PipelineError::UpstreamMalformed(e.to_string()),
        other => PipelineError::UpstreamUnavailable(other.to_string()),
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(upstream_error)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestMessage::User(message)])
            .temperature(0.0) // Deterministic output
            .build()
            .map_err(upstream_error)?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                PipelineError::UpstreamUnavailable(format!(
                    "no response within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(upstream_error)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::UpstreamMalformed("response contained no completion".to_string())
            })?;

        tracing::debug!(model = %self.model, chars = content.len(), "Completion received");
        Ok(content)
    }
}
