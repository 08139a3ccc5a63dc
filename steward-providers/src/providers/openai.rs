use crate::error::ProviderError;
use crate::models::{estimate_tokens, ChatRequest, ChatResponse, Choice, Message, Usage};
use crate::providers::{Provider, ProviderConfig};
use serde::{Deserialize, Serialize};

use super::http_client::HttpProviderClient;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Adapter for the OpenAI chat-completions API.
pub struct OpenAiProvider {
    http: HttpProviderClient,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = HttpProviderClient::new(
            config.timeout,
            config.base_url.clone(),
            DEFAULT_BASE_URL,
            &config.api_key,
        )?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL).to_string();
        let body = ChatBody::from_request(&model, &request);
        let wire: WireChatResponse = self.http.post_json("/chat/completions", &body).await?;
        wire.normalize(&request)
    }
}

/// OpenAI-style request body. DeepSeek speaks the same schema, so its
/// adapter reuses these types.
#[derive(Debug, Serialize)]
pub(super) struct ChatBody<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl<'a> ChatBody<'a> {
    pub fn from_request(model: &'a str, request: &'a ChatRequest) -> Self {
        Self {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireChatResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<WireChoice>,
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireChoice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl WireChatResponse {
    /// Collapse the wire reply into the normalized contract. When the
    /// upstream omitted its usage block, token counts are estimated from
    /// character lengths and the response is flagged accordingly.
    pub fn normalize(self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        if self.choices.is_empty() {
            return Err(ProviderError::InvalidResponse {
                message: "response carried no choices".to_string(),
            });
        }

        let (usage, tokens_estimated) = match self.usage {
            Some(u) => (Usage::new(u.prompt_tokens, u.completion_tokens), false),
            None => {
                let prompt_tokens = estimate_tokens(&request.flattened_prompt());
                let completion_tokens: u32 = self
                    .choices
                    .iter()
                    .map(|c| estimate_tokens(&c.message.content))
                    .sum();
                (Usage::new(prompt_tokens, completion_tokens), true)
            }
        };

        Ok(ChatResponse {
            id: self.id,
            model: self.model,
            choices: self
                .choices
                .into_iter()
                .map(|c| Choice {
                    index: c.index,
                    message: c.message,
                    finish_reason: c.finish_reason,
                })
                .collect(),
            usage,
            tokens_estimated,
        })
    }
}
