use reqwest::Client;

use super::anthropic_types::{AnthropicRequest, AnthropicResponse};
use crate::{
    config::Config,
    error::{AppError, AppResult},
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Answer returned by the model
#[derive(Debug, Clone)]
pub struct LlmCompletion {
    pub text: String,
    pub tokens_used: Option<u32>,
    pub model: String,
}

/// Anthropic Messages API client configured from `Config`
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.anthropic_key().map(str::to_string),
            base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
            model: config.llm_model.clone(),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
        }
    }

    pub async fn complete(&self, system: &str, prompt: &str) -> AppResult<LlmCompletion> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Anthropic API key not configured".into()))?;

        let request = AnthropicRequest::new(
            &self.model,
            self.max_tokens,
            Some(system.to_string()),
            prompt,
        )
        .with_temperature(self.temperature);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Anthropic API error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Anthropic API error {}: {}",
                status, error_text
            )));
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse response: {}", e)))?;

        let text = body
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| AppError::ExternalService("Empty response from Anthropic".into()))?;

        Ok(LlmCompletion {
            tokens_used: body.total_tokens(),
            model: body.model.unwrap_or_else(|| self.model.clone()),
            text,
        })
    }
}

/// Answer used in place of the model's when the call fails
pub fn fallback_answer(error: &AppError) -> String {
    format!(
        "I apologize, but I encountered an issue analyzing your request: {}. \
         Please try rephrasing your question or contact support.",
        error
    )
}
