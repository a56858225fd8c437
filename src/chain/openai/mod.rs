
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::ChatModel;
use crate::config::{Config, OpenAiConfig};
use crate::embeddings::OpenAiClient;

const SYSTEM_PROMPT: &str = "You answer questions about Kenyan business news using only the \
    extracted parts of articles you are given. If the articles do not contain the answer, say \
    that you don't know. Never make up sources.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Hosted chat model behind the `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: OpenAiClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChat {
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: String) -> Result<Self> {
        let client = OpenAiClient::new(
            config,
            api_key,
            Duration::from_secs(config.chat_timeout_seconds),
        )?;

        Ok(Self::with_client(config, client))
    }

    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = Config::api_key()?;
        Self::new(&config.openai, api_key)
    }

    #[inline]
    pub fn with_client(config: &OpenAiConfig, client: OpenAiClient) -> Self {
        Self {
            client,
            model: config.chat_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl ChatModel for OpenAiChat {
    #[inline]
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        debug!("Requesting completion from {}", self.model);
        let response: ChatResponse = self.client.post_json("chat/completions", &request)?;

        response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("Chat model returned no content"))
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }
}
