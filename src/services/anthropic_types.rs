//! Wire types for the Anthropic Messages API used by the analysis LLM client.

use serde::{Deserialize, Serialize};

/// Request body for Anthropic Messages API.
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub messages: Vec<AnthropicMessage>,
}

/// A single message in the Anthropic conversation.
#[derive(Debug, Serialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

/// Response from Anthropic Messages API.
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// The model that generated the response.
    #[serde(default)]
    pub model: Option<String>,
    pub content: Vec<AnthropicContent>,
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Content block in Anthropic response.
#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    pub text: String,
}

/// Token usage statistics from Anthropic API.
#[derive(Debug, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl AnthropicRequest {
    /// Create a new request with a system prompt and user message.
    pub fn new(model: &str, max_tokens: u32, system: Option<String>, user_message: &str) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            system,
            temperature: None,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl AnthropicResponse {
    /// Extract the first text content from the response.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|c| c.text.as_str())
    }

    pub fn total_tokens(&self) -> Option<u32> {
        self.usage.as_ref().map(|u| u.input_tokens + u.output_tokens)
    }
}
